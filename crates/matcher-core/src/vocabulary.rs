//! 封闭词表
//!
//! 档案中所有枚举字段的取值都来自匹配服务约定的固定词表。
//! 每个词表由 `vocabulary!` 宏从一张常量表生成，线上字符串只在这里出现一次。

use crate::error::{MatcherError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 展示标签的风格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    /// 每个单词首字母大写："north_america" -> "North America"
    Title,
    /// 仅把下划线替换为空格："cardiovascular_diseases" -> "cardiovascular diseases"
    Spaced,
}

/// 把线上字符串转换为展示标签
pub fn humanize(wire: &str, style: LabelStyle) -> String {
    let words = wire.split('_');
    match style {
        LabelStyle::Spaced => words.collect::<Vec<_>>().join(" "),
        LabelStyle::Title => words
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" "),
    }
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal, $style:ident) {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// 词表中全部取值，顺序与服务端约定一致
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// 线上字符串表
            pub const WIRE: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            pub fn label(&self) -> String {
                humanize(self.as_str(), LabelStyle::$style)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<&str> for $name {
            type Error = MatcherError;

            fn try_from(value: &str) -> Result<Self> {
                match value {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(MatcherError::Validation(format!(
                        "'{}' is not a valid {} value",
                        value, $kind
                    ))),
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = MatcherError;

            fn from_str(value: &str) -> Result<Self> {
                Self::try_from(value)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Self::try_from(value.as_str()).map_err(serde::de::Error::custom)
            }
        }
    };
}

vocabulary! {
    /// 性别
    Sex ("sex", Title) {
        Male => "male",
        Female => "female",
    }
}

vocabulary! {
    /// 种族
    Race ("race", Title) {
        Asian => "asian",
        Black => "black",
        Hispanic => "hispanic",
        White => "white",
        Other => "other",
    }
}

vocabulary! {
    /// 所在大洲
    Continent ("location", Title) {
        NorthAmerica => "north_america",
        SouthAmerica => "south_america",
        Europe => "europe",
        Asia => "asia",
        Africa => "africa",
        Oceania => "oceania",
        Antarctica => "antarctica",
    }
}

vocabulary! {
    /// 运动水平
    Athleticism ("athleticism", Spaced) {
        Sedentary => "sedentary",
        Light => "light",
        Moderate => "moderate",
        VeryActive => "very_active",
        Athlete => "athlete",
    }
}

vocabulary! {
    /// 饮食习惯
    Diet ("diet", Title) {
        Omnivore => "omnivore",
        Vegetarian => "vegetarian",
        Vegan => "vegan",
        Pescatarian => "pescatarian",
        Keto => "keto",
        Other => "other",
    }
}

vocabulary! {
    /// 既往慢性病
    PreexistingCondition ("preexisting condition", Spaced) {
        Cancer => "cancer",
        CardiovascularDiseases => "cardiovascular_diseases",
        Diabetes => "diabetes",
        ObesityMetabolicSyndrome => "obesity_metabolic_syndrome",
        NeurologicalDisorders => "neurological_disorders",
        AutoimmuneConditions => "autoimmune_conditions",
        RespiratoryDiseases => "respiratory_diseases",
        ChronicKidneyDisease => "chronic_kidney_disease",
        GastrointestinalDisorders => "gastrointestinal_disorders",
        MentalHealthDisorders => "mental_health_disorders",
        SubstanceDependency => "substance_dependency",
    }
}

vocabulary! {
    /// 已痊愈的疾病
    PriorCondition ("prior condition", Spaced) {
        CancerRemission => "cancer_remission",
        CardiovascularResolved => "cardiovascular_resolved",
        DiabetesResolved => "diabetes_resolved",
        NeurologicalResolved => "neurological_resolved",
        RespiratoryResolved => "respiratory_resolved",
        MentalHealthResolved => "mental_health_resolved",
        InfectiousResolved => "infectious_resolved",
    }
}

vocabulary! {
    /// 手术史
    Surgery ("surgery", Spaced) {
        CancerRelated => "cancer_related",
        Cardiac => "cardiac",
        Orthopedic => "orthopedic",
        Neurological => "neurological",
        Bariatric => "bariatric",
        Gynecological => "gynecological",
        Transplantation => "transplantation",
    }
}

vocabulary! {
    /// 在用药物
    Medication ("medication", Spaced) {
        CancerTherapies => "cancer_therapies",
        CardiacDrugs => "cardiac_drugs",
        Antihypertensives => "antihypertensives",
        DiabetesMedication => "diabetes_medication",
        NeurologicalDrugs => "neurological_drugs",
        PsychiatricMedications => "psychiatric_medications",
        PainManagement => "pain_management",
        NutritionalSupplements => "nutritional_supplements",
    }
}

/// 词表种类，用于按名称查表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabularyKind {
    Sex,
    Race,
    Continent,
    Athleticism,
    Diet,
    PreexistingCondition,
    PriorCondition,
    Surgery,
    Medication,
}

impl VocabularyKind {
    pub const ALL: &'static [VocabularyKind] = &[
        VocabularyKind::Sex,
        VocabularyKind::Race,
        VocabularyKind::Continent,
        VocabularyKind::Athleticism,
        VocabularyKind::Diet,
        VocabularyKind::PreexistingCondition,
        VocabularyKind::PriorCondition,
        VocabularyKind::Surgery,
        VocabularyKind::Medication,
    ];

    /// 对应的线上字符串表
    pub fn table(&self) -> &'static [&'static str] {
        match self {
            VocabularyKind::Sex => Sex::WIRE,
            VocabularyKind::Race => Race::WIRE,
            VocabularyKind::Continent => Continent::WIRE,
            VocabularyKind::Athleticism => Athleticism::WIRE,
            VocabularyKind::Diet => Diet::WIRE,
            VocabularyKind::PreexistingCondition => PreexistingCondition::WIRE,
            VocabularyKind::PriorCondition => PriorCondition::WIRE,
            VocabularyKind::Surgery => Surgery::WIRE,
            VocabularyKind::Medication => Medication::WIRE,
        }
    }

    /// 档案中使用该词表的字段路径
    pub fn field_path(&self) -> &'static str {
        match self {
            VocabularyKind::Sex => "physical.sex",
            VocabularyKind::Race => "demographics.race",
            VocabularyKind::Continent => "demographics.location",
            VocabularyKind::Athleticism => "lifestyle.athleticism",
            VocabularyKind::Diet => "lifestyle.diet",
            VocabularyKind::PreexistingCondition => "medical_history.preexisting_conditions",
            VocabularyKind::PriorCondition => "medical_history.prior_conditions",
            VocabularyKind::Surgery => "medical_history.surgeries",
            VocabularyKind::Medication => "medical_history.active_medications",
        }
    }

    /// 检查取值是否属于该词表
    pub fn contains(&self, value: &str) -> bool {
        self.table().contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_sizes() {
        assert_eq!(Sex::ALL.len(), 2);
        assert_eq!(Race::ALL.len(), 5);
        assert_eq!(Continent::ALL.len(), 7);
        assert_eq!(Athleticism::ALL.len(), 5);
        assert_eq!(Diet::ALL.len(), 6);
        for kind in [
            VocabularyKind::PreexistingCondition,
            VocabularyKind::PriorCondition,
            VocabularyKind::Surgery,
            VocabularyKind::Medication,
        ] {
            let size = kind.table().len();
            assert!((7..=11).contains(&size), "{:?} has {} entries", kind, size);
        }
    }

    #[test]
    fn test_unknown_value_is_validation_error() {
        let err = Continent::try_from("atlantis").unwrap_err();
        assert!(matches!(err, MatcherError::Validation(_)));
        assert!(Continent::try_from("North_America").is_err());
    }

    #[test]
    fn test_serde_uses_wire_strings() {
        let json = serde_json::to_string(&Athleticism::VeryActive).unwrap();
        assert_eq!(json, "\"very_active\"");

        let parsed: Medication = serde_json::from_str("\"pain_management\"").unwrap();
        assert_eq!(parsed, Medication::PainManagement);

        assert!(serde_json::from_str::<Diet>("\"carnivore\"").is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Continent::NorthAmerica.label(), "North America");
        assert_eq!(Sex::Female.label(), "Female");
        assert_eq!(PreexistingCondition::CardiovascularDiseases.label(), "cardiovascular diseases");
        assert_eq!(Athleticism::VeryActive.label(), "very active");
    }

    #[test]
    fn test_every_table_round_trips_through_enum() {
        for wire in Surgery::WIRE {
            assert_eq!(Surgery::try_from(*wire).unwrap().as_str(), *wire);
        }
        assert!(VocabularyKind::Race.contains("hispanic"));
        assert!(!VocabularyKind::Race.contains("martian"));
    }
}
