//! 匹配服务接口定义
//!
//! 控制器只依赖 `MatcherApi` trait，HTTP实现见 [`crate::http`]。

use async_trait::async_trait;
use matcher_core::{
    MatchResponse, Paper, PaperView, Profile, Result, StoredProfile, UploadFile, UploadOutcome,
};
use serde::Deserialize;
use std::collections::BTreeMap;

/// 上传接口的响应体。
///
/// 服务端可能返回按提交顺序排列的列表、按文件名索引的对象，
/// 或者（单文件接口）一个结果对象。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    List(Vec<UploadOutcome>),
    Keyed(BTreeMap<String, UploadOutcome>),
    Single(UploadOutcome),
}

/// 健康检查结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}

/// 匹配服务接口
#[async_trait]
pub trait MatcherApi: Send + Sync {
    /// 一次请求上传一批文件
    async fn upload_papers(&self, files: &[UploadFile]) -> Result<UploadResponse>;

    /// 列出全部论文
    async fn list_papers(&self) -> Result<Vec<Paper>>;

    /// 获取论文PDF（base64）
    async fn view_paper(&self, paper_id: &str) -> Result<PaperView>;

    /// 删除论文
    async fn delete_paper(&self, paper_id: &str) -> Result<()>;

    /// 提交档案进行匹配
    async fn submit_match(&self, profile: &Profile) -> Result<MatchResponse>;

    /// 按用户名加载档案，不存在时返回 `NotFound`
    async fn load_profile(&self, username: &str) -> Result<Profile>;

    /// 保存档案
    async fn save_profile(&self, stored: &StoredProfile) -> Result<()>;

    /// 删除档案，不存在时返回 `NotFound`
    async fn delete_profile(&self, username: &str) -> Result<()>;

    /// 服务健康检查
    async fn health(&self) -> Result<HealthStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upload_response_shapes() {
        let list: UploadResponse = serde_json::from_value(json!([
            {"title": "A", "message": "ok", "paper_id": "p1"},
            {"title": "B", "message": "corrupt file"}
        ]))
        .unwrap();
        assert!(matches!(list, UploadResponse::List(ref items) if items.len() == 2));

        let keyed: UploadResponse = serde_json::from_value(json!({
            "a.pdf": {"title": "A", "message": "ok", "paper_id": "p1"}
        }))
        .unwrap();
        assert!(matches!(keyed, UploadResponse::Keyed(ref map) if map.contains_key("a.pdf")));

        let single: UploadResponse = serde_json::from_value(json!({
            "paper_id": "p9", "title": "Solo", "message": "Paper successfully processed"
        }))
        .unwrap();
        assert!(matches!(single, UploadResponse::Single(ref o) if o.paper_id.as_deref() == Some("p9")));
    }

    #[test]
    fn test_health_status() {
        assert!(HealthStatus { status: "healthy".into() }.is_healthy());
        assert!(!HealthStatus { status: "degraded".into() }.is_healthy());
    }
}
