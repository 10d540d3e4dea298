//! 按操作配置的行为策略

use serde::{Deserialize, Serialize};

/// 操作失败时如何呈现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSurfacing {
    /// 在触发操作的控件旁显示提示
    Surfaced,
    /// 只写日志，界面不变
    LoggedOnly,
}

impl ErrorSurfacing {
    pub fn is_surfaced(&self) -> bool {
        matches!(self, ErrorSurfacing::Surfaced)
    }
}

/// 数值字段无法解析时的提交策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPolicy {
    /// 按原样提交（非有限值序列化为 null）
    SubmitAsIs,
    /// 阻止提交并提示
    Block,
}
