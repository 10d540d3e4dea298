//! 档案草稿
//!
//! 表单编辑中的档案。数值字段保存用户输入的原始文本，解析失败不会阻止编辑。
//! 每次字段更新只替换一个叶子值。

use crate::coerce::{format_number, parse_float_prefix, parse_int_prefix};
use crate::error::{MatcherError, Result};
use crate::models::{dedup_ordered, Demographics, Lifestyle, MedicalHistory, Physical, Profile};
use crate::vocabulary::{
    Athleticism, Continent, Diet, Medication, PreexistingCondition, PriorCondition, Race, Sex,
    Surgery,
};
use serde::{Deserialize, Serialize};

/// 身体特征草稿
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalDraft {
    pub age: String,
    pub weight: String,
    pub height: String,
    pub sex: Sex,
}

impl Default for PhysicalDraft {
    fn default() -> Self {
        Self {
            age: String::new(),
            weight: String::new(),
            height: String::new(),
            sex: Sex::Male,
        }
    }
}

/// 档案草稿
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub physical: PhysicalDraft,
    pub demographics: Demographics,
    pub medical_history: MedicalHistory,
    pub lifestyle: Lifestyle,
}

/// 单个字段的更新
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Age(String),
    Weight(String),
    Height(String),
    Sex(Sex),
    Race(Race),
    Location(Continent),
    PreexistingConditions(Vec<PreexistingCondition>),
    PriorConditions(Vec<PriorCondition>),
    Surgeries(Vec<Surgery>),
    ActiveMedications(Vec<Medication>),
    Athleticism(Athleticism),
    Diet(Diet),
}

impl FieldUpdate {
    /// 字段路径，形如 "physical.age"
    pub fn path(&self) -> &'static str {
        match self {
            FieldUpdate::Age(_) => "physical.age",
            FieldUpdate::Weight(_) => "physical.weight",
            FieldUpdate::Height(_) => "physical.height",
            FieldUpdate::Sex(_) => "physical.sex",
            FieldUpdate::Race(_) => "demographics.race",
            FieldUpdate::Location(_) => "demographics.location",
            FieldUpdate::PreexistingConditions(_) => "medical_history.preexisting_conditions",
            FieldUpdate::PriorConditions(_) => "medical_history.prior_conditions",
            FieldUpdate::Surgeries(_) => "medical_history.surgeries",
            FieldUpdate::ActiveMedications(_) => "medical_history.active_medications",
            FieldUpdate::Athleticism(_) => "lifestyle.athleticism",
            FieldUpdate::Diet(_) => "lifestyle.diet",
        }
    }

    /// 按字段路径和文本值构造更新。
    ///
    /// 枚举字段的值必须属于对应词表；集合字段使用逗号分隔，空串表示清空。
    pub fn parse(path: &str, value: &str) -> Result<Self> {
        fn list<T>(value: &str) -> Result<Vec<T>>
        where
            T: for<'a> TryFrom<&'a str, Error = MatcherError>,
        {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(T::try_from)
                .collect()
        }

        let update = match path {
            "physical.age" => FieldUpdate::Age(value.to_string()),
            "physical.weight" => FieldUpdate::Weight(value.to_string()),
            "physical.height" => FieldUpdate::Height(value.to_string()),
            "physical.sex" => FieldUpdate::Sex(Sex::try_from(value)?),
            "demographics.race" => FieldUpdate::Race(Race::try_from(value)?),
            "demographics.location" => FieldUpdate::Location(Continent::try_from(value)?),
            "medical_history.preexisting_conditions" => {
                FieldUpdate::PreexistingConditions(list(value)?)
            }
            "medical_history.prior_conditions" => FieldUpdate::PriorConditions(list(value)?),
            "medical_history.surgeries" => FieldUpdate::Surgeries(list(value)?),
            "medical_history.active_medications" => FieldUpdate::ActiveMedications(list(value)?),
            "lifestyle.athleticism" => FieldUpdate::Athleticism(Athleticism::try_from(value)?),
            "lifestyle.diet" => FieldUpdate::Diet(Diet::try_from(value)?),
            _ => {
                return Err(MatcherError::Validation(format!(
                    "unknown profile field: {}",
                    path
                )))
            }
        };
        Ok(update)
    }
}

impl ProfileDraft {
    /// 应用一次字段更新，只修改该字段本身
    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Age(value) => self.physical.age = value,
            FieldUpdate::Weight(value) => self.physical.weight = value,
            FieldUpdate::Height(value) => self.physical.height = value,
            FieldUpdate::Sex(value) => self.physical.sex = value,
            FieldUpdate::Race(value) => self.demographics.race = value,
            FieldUpdate::Location(value) => self.demographics.location = value,
            FieldUpdate::PreexistingConditions(values) => {
                self.medical_history.preexisting_conditions = dedup_ordered(values)
            }
            FieldUpdate::PriorConditions(values) => {
                self.medical_history.prior_conditions = dedup_ordered(values)
            }
            FieldUpdate::Surgeries(values) => {
                self.medical_history.surgeries = dedup_ordered(values)
            }
            FieldUpdate::ActiveMedications(values) => {
                self.medical_history.active_medications = dedup_ordered(values)
            }
            FieldUpdate::Athleticism(value) => self.lifestyle.athleticism = value,
            FieldUpdate::Diet(value) => self.lifestyle.diet = value,
        }
    }

    /// 转换为提交用的档案。数值字段宽松解析，失败得到 NaN
    pub fn coerce(&self) -> Profile {
        Profile {
            physical: Physical {
                age: parse_int_prefix(&self.physical.age),
                weight: parse_float_prefix(&self.physical.weight),
                height: parse_float_prefix(&self.physical.height),
                sex: self.physical.sex,
            },
            demographics: self.demographics,
            medical_history: self.medical_history.clone(),
            lifestyle: self.lifestyle,
        }
    }
}

impl From<&Profile> for ProfileDraft {
    fn from(profile: &Profile) -> Self {
        Self {
            physical: PhysicalDraft {
                age: format_number(profile.physical.age),
                weight: format_number(profile.physical.weight),
                height: format_number(profile.physical.height),
                sex: profile.physical.sex,
            },
            demographics: profile.demographics,
            medical_history: profile.medical_history.clone(),
            lifestyle: profile.lifestyle,
        }
    }
}
