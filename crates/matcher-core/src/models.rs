//! 核心数据模型定义

use crate::coerce::{serialize_measure, serialize_whole};
use crate::error::{MatcherError, Result};
use crate::vocabulary::{
    Athleticism, Continent, Diet, Medication, PreexistingCondition, PriorCondition, Race, Sex,
    Surgery,
};
use serde::{Deserialize, Serialize};

/// 年龄上限（岁）
pub const MAX_AGE: f64 = 120.0;
/// 体重上限（磅）
pub const MAX_WEIGHT: f64 = 1000.0;
/// 身高上限（英寸）
pub const MAX_HEIGHT: f64 = 120.0;

/// 患者档案，提交给匹配服务的结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub physical: Physical,
    pub demographics: Demographics,
    pub medical_history: MedicalHistory,
    pub lifestyle: Lifestyle,
}

/// 身体特征
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Physical {
    #[serde(serialize_with = "serialize_whole")]
    pub age: f64,
    #[serde(serialize_with = "serialize_measure")]
    pub weight: f64, // 磅
    #[serde(serialize_with = "serialize_measure")]
    pub height: f64, // 英寸
    pub sex: Sex,
}

/// 人口统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub race: Race,
    pub location: Continent,
}

impl Default for Demographics {
    fn default() -> Self {
        Self {
            race: Race::White,
            location: Continent::NorthAmerica,
        }
    }
}

/// 病史，每个集合保持插入顺序且不含重复项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalHistory {
    #[serde(default)]
    pub preexisting_conditions: Vec<PreexistingCondition>,
    #[serde(default)]
    pub prior_conditions: Vec<PriorCondition>,
    #[serde(default)]
    pub surgeries: Vec<Surgery>,
    #[serde(default)]
    pub active_medications: Vec<Medication>,
}

/// 生活方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifestyle {
    pub athleticism: Athleticism,
    pub diet: Diet,
}

impl Default for Lifestyle {
    fn default() -> Self {
        Self {
            athleticism: Athleticism::Moderate,
            diet: Diet::Omnivore,
        }
    }
}

/// 去重并保持首次出现的顺序
pub fn dedup_ordered<T: PartialEq + Copy>(values: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

impl Profile {
    /// 检查数值字段是否为有限值且在允许范围内，返回所有问题
    pub fn numeric_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let p = &self.physical;

        if !p.age.is_finite() {
            issues.push("age must be a number".to_string());
        } else if p.age.fract() != 0.0 || !(0.0..=MAX_AGE).contains(&p.age) {
            issues.push(format!("age must be a whole number between 0 and {}", MAX_AGE));
        }
        if !p.weight.is_finite() {
            issues.push("weight must be a number".to_string());
        } else if !(0.0..=MAX_WEIGHT).contains(&p.weight) {
            issues.push(format!("weight must be between 0 and {}", MAX_WEIGHT));
        }
        if !p.height.is_finite() {
            issues.push("height must be a number".to_string());
        } else if !(0.0..=MAX_HEIGHT).contains(&p.height) {
            issues.push(format!("height must be between 0 and {}", MAX_HEIGHT));
        }

        issues
    }

    /// 校验档案，失败时返回 `Validation`
    pub fn validate(&self) -> Result<()> {
        let issues = self.numeric_issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(MatcherError::Validation(issues.join("; ")))
        }
    }
}

/// 服务端保存的档案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProfile {
    pub username: String,
    pub profile: Profile,
}

/// 加载档案接口的响应体
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEnvelope {
    pub profile: Profile,
}

/// 上传接口返回的单个文件结果（线上格式）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// 单个文件的上传结果，`success` 由 `paper_id` 是否存在推导
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    pub title: String,
    pub message: String,
    pub paper_id: Option<String>,
    pub success: bool,
}

impl UploadResult {
    /// 整批请求失败时的合成结果
    pub fn upload_error(message: impl Into<String>) -> Self {
        Self {
            title: "Upload Error".to_string(),
            message: message.into(),
            paper_id: None,
            success: false,
        }
    }

    /// 服务端未给出结果的文件
    pub fn missing(file_name: &str) -> Self {
        Self {
            title: file_name.to_string(),
            message: "No result returned for this file".to_string(),
            paper_id: None,
            success: false,
        }
    }
}

impl From<UploadOutcome> for UploadResult {
    fn from(outcome: UploadOutcome) -> Self {
        let paper_id = outcome.paper_id.filter(|id| !id.is_empty());
        Self {
            success: paper_id.is_some(),
            title: outcome.title,
            message: outcome.message,
            paper_id,
        }
    }
}

/// 待上传的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// 创建PDF文件
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/pdf".to_string(),
            bytes,
        }
    }
}

/// 论文（只读模型）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub processed_data: ProcessedData,
}

/// 服务端对论文的分析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub ideal_profile: serde_json::Value,
    #[serde(default)]
    pub conditions: serde_json::Value,
}

/// 论文详情视图的文本内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperDetails {
    pub title: String,
    pub summary: String,
    pub ideal_profile: String,
    pub conditions: String,
}

impl Paper {
    /// 生成详情文本，理想档案和条件以缩进JSON展示
    pub fn details(&self) -> PaperDetails {
        let pretty = |value: &serde_json::Value| match value {
            serde_json::Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };

        PaperDetails {
            title: self.title.clone(),
            summary: self.processed_data.summary.clone(),
            ideal_profile: pretty(&self.processed_data.ideal_profile),
            conditions: pretty(&self.processed_data.conditions),
        }
    }
}

/// 查看论文接口的响应体
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaperView {
    #[serde(default)]
    pub pdf_content: Option<String>,
}

/// 匹配结果中的一篇论文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMatch {
    pub paper_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
}

/// 匹配接口的响应体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub matches: Vec<PaperMatch>,
    #[serde(default)]
    pub total_matches: Option<usize>,
}
