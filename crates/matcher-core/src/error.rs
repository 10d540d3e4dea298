//! 错误定义模块

use thiserror::Error;

/// 论文匹配客户端统一错误类型
#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// 网络层失败，没有任何结构化的响应
    #[error("{0}")]
    Transport(String),

    /// 服务端返回非2xx状态
    #[error("Request failed with status {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Failed to save profile: {0}")]
    Save(String),

    #[error("Failed to delete: {0}")]
    Delete(String),

    /// 已被更新的请求取代的响应，不向用户展示
    #[error("Stale response ignored for {slot} (token {token}, current {current})")]
    StaleResponseIgnored {
        slot: &'static str,
        token: u64,
        current: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatcherError {
    /// 是否为资源不存在错误
    pub fn is_not_found(&self) -> bool {
        matches!(self, MatcherError::NotFound(_))
    }

    /// 是否为过期响应
    pub fn is_stale(&self) -> bool {
        matches!(self, MatcherError::StaleResponseIgnored { .. })
    }

    /// 服务端状态码（如有）
    pub fn status(&self) -> Option<u16> {
        match self {
            MatcherError::Http { status, .. } => Some(*status),
            MatcherError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// 不带分类前缀的说明文本，用于界面提示
    pub fn detail(&self) -> String {
        match self {
            MatcherError::NotFound(m)
            | MatcherError::Validation(m)
            | MatcherError::Transport(m)
            | MatcherError::Decode(m)
            | MatcherError::Save(m)
            | MatcherError::Delete(m)
            | MatcherError::Config(m)
            | MatcherError::Internal(m) => m.clone(),
            MatcherError::Http { status, detail } if detail.is_empty() => {
                format!("status {}", status)
            }
            MatcherError::Http { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, MatcherError>;
