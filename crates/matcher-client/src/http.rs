//! 基于 reqwest 的匹配服务连接器

use crate::api::{HealthStatus, MatcherApi, UploadResponse};
use async_trait::async_trait;
use matcher_core::{
    MatchResponse, MatcherError, Paper, PaperView, Profile, ProfileEnvelope, Result,
    StoredProfile, UploadFile,
};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 连接器设置
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// 匹配服务根地址
    pub base_url: String,
    /// 档案接口根地址，为空时与 `base_url` 相同
    pub profiles_base_url: Option<String>,
    /// 单个请求超时
    pub request_timeout: Duration,
    /// 上传时每个文件使用的表单字段名
    pub upload_field: String,
    pub user_agent: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            profiles_base_url: None,
            request_timeout: Duration::from_secs(30),
            upload_field: "files[]".to_string(),
            user_agent: concat!("paper-matcher/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP连接器
#[derive(Debug, Clone)]
pub struct HttpMatcherApi {
    client: reqwest::Client,
    base_url: Url,
    profiles_base_url: Url,
    upload_field: String,
}

impl HttpMatcherApi {
    /// 创建连接器
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let base_url = parse_base(&settings.base_url)?;
        let profiles_base_url = match settings.profiles_base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => parse_base(url)?,
            _ => base_url.clone(),
        };

        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| MatcherError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("Matcher API connector targeting {}", base_url);

        Ok(Self {
            client,
            base_url,
            profiles_base_url,
            upload_field: settings.upload_field,
        })
    }

    /// 拼接接口地址，路径段会被正确转义
    fn endpoint(base: &Url, segments: &[&str], trailing_slash: bool) -> Result<Url> {
        let mut url = base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| MatcherError::Config(format!("Invalid base URL: {}", base)))?;
            path.pop_if_empty().extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url)
    }

    fn papers_url(&self, segments: &[&str], trailing_slash: bool) -> Result<Url> {
        Self::endpoint(&self.base_url, segments, trailing_slash)
    }

    fn profiles_url(&self, segments: &[&str]) -> Result<Url> {
        Self::endpoint(&self.profiles_base_url, segments, false)
    }

    /// 发送请求并把网络层错误映射为 `Transport`
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(map_reqwest_error)
    }
}

fn parse_base(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| MatcherError::Config(format!("Invalid base URL '{}': {}", url, e)))?;
    if parsed.cannot_be_a_base() {
        return Err(MatcherError::Config(format!("Invalid base URL: {}", url)));
    }
    Ok(parsed)
}

fn map_reqwest_error(err: reqwest::Error) -> MatcherError {
    if err.is_decode() {
        MatcherError::Decode(err.to_string())
    } else {
        MatcherError::Transport(err.to_string())
    }
}

/// 从错误响应体中提取 `detail` 字段
fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// 2xx 原样返回，404 映射为 `NotFound`，其余映射为 `Http`
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(status, &body);
    warn!("Request to {} failed with {}: {}", url, status, detail);

    if status == StatusCode::NOT_FOUND {
        Err(MatcherError::NotFound(detail))
    } else {
        Err(MatcherError::Http {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl MatcherApi for HttpMatcherApi {
    async fn upload_papers(&self, files: &[UploadFile]) -> Result<UploadResponse> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| MatcherError::Validation(format!("Invalid content type: {}", e)))?;
            form = form.part(self.upload_field.clone(), part);
        }

        let url = self.papers_url(&["papers", "upload"], true)?;
        debug!("Uploading {} file(s) to {}", files.len(), url);
        self.send_json(self.client.post(url).multipart(form)).await
    }

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        let url = self.papers_url(&["papers"], false)?;
        self.send_json(self.client.get(url)).await
    }

    async fn view_paper(&self, paper_id: &str) -> Result<PaperView> {
        let url = self.papers_url(&["papers", paper_id, "view"], false)?;
        self.send_json(self.client.get(url)).await
    }

    async fn delete_paper(&self, paper_id: &str) -> Result<()> {
        let url = self.papers_url(&["papers", paper_id], false)?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn submit_match(&self, profile: &Profile) -> Result<MatchResponse> {
        let url = self.papers_url(&["match"], true)?;
        self.send_json(self.client.post(url).json(profile)).await
    }

    async fn load_profile(&self, username: &str) -> Result<Profile> {
        let url = self.profiles_url(&["profiles", username])?;
        let envelope: ProfileEnvelope = self.send_json(self.client.get(url)).await?;
        Ok(envelope.profile)
    }

    async fn save_profile(&self, stored: &StoredProfile) -> Result<()> {
        let url = self.profiles_url(&["profiles", "save"])?;
        self.send(self.client.post(url).json(stored)).await?;
        Ok(())
    }

    async fn delete_profile(&self, username: &str) -> Result<()> {
        let url = self.profiles_url(&["profiles", username])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn health(&self) -> Result<HealthStatus> {
        let url = self.papers_url(&["health"], false)?;
        self.send_json(self.client.get(url)).await
    }
}
