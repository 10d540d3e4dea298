//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、TOML配置文件（可选）、
//! 以 `MATCHER__` 为前缀的环境变量（例如 `MATCHER__API__BASE_URL`）。

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use matcher_core::{ErrorSurfacing, NumericPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 生效的配置
    config: MatcherConfig,
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 客户端完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// 匹配服务接口
    pub api: ApiConfig,
    /// 工作流行为
    pub workflow: WorkflowConfig,
    /// 文档查看器
    pub viewer: ViewerConfig,
    /// 日志
    pub logging: LoggingConfig,
}

/// 匹配服务接口配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 服务根地址
    pub base_url: String,
    /// 档案接口根地址，未设置时使用 `base_url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles_base_url: Option<String>,
    /// 请求超时（秒）
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// 上传表单中文件字段的名称
    pub upload_field: String,
}

/// 工作流配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// 匹配提交失败的呈现方式
    pub match_errors: ErrorSurfacing,
    /// 档案加载、保存、删除失败的呈现方式
    pub profile_errors: ErrorSurfacing,
    /// 论文列表、删除、查看失败的呈现方式
    pub catalog_errors: ErrorSurfacing,
    /// 数值字段无法解析时的提交策略
    pub numeric_policy: NumericPolicy,
}

/// 文档查看器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// base64负载的最大长度（字节）
    pub max_payload_bytes: usize,
    /// 是否要求PDF文件头
    pub require_pdf_signature: bool,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令，例如 `info` 或 `matcher_workflow=debug`
    pub level: String,
    /// 日志格式：full、compact、pretty
    pub format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            profiles_base_url: None,
            request_timeout_secs: 30,
            user_agent: format!("paper-matcher/{}", env!("CARGO_PKG_VERSION")),
            upload_field: "files[]".to_string(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            match_errors: ErrorSurfacing::LoggedOnly,
            profile_errors: ErrorSurfacing::Surfaced,
            catalog_errors: ErrorSurfacing::Surfaced,
            numeric_policy: NumericPolicy::SubmitAsIs,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024 * 1024,
            require_pdf_signature: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl ConfigManager {
    /// 加载配置。`config_path` 指定的文件必须存在
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
            validator,
        })
    }

    /// 使用给定配置创建管理器
    pub fn from_config(config: MatcherConfig) -> Result<Self> {
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config,
            config_path: None,
            validator,
        })
    }

    fn load_config(config_path: Option<&Path>) -> Result<MatcherConfig> {
        let defaults = toml::to_string(&MatcherConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("MATCHER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let config: MatcherConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => debug!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 按点分路径读取配置值，例如 `api.base_url`
    pub fn get_value(&self, path: &str) -> Result<serde_json::Value> {
        let config_json =
            serde_json::to_value(&self.config).context("Failed to serialize config to JSON")?;

        let mut current = &config_json;
        for part in path.split('.') {
            match current {
                serde_json::Value::Object(map) => {
                    current = map
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
                }
                _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
            }
        }

        Ok(current.clone())
    }

    /// 验证配置
    pub fn validate_config(&self) -> Result<()> {
        self.validator.validate(&self.config)
    }

    /// 生效配置的TOML文本
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.config).context("Failed to serialize configuration")
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&MatcherConfig) -> Result<()>,
    /// 错误消息
    error_message: &'static str,
}

fn check_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| anyhow::anyhow!("'{}' must start with http:// or https://", url))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(anyhow::anyhow!("'{}' has no valid host", url));
    }
    Ok(())
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "api.base_url",
                validator: |config| check_url(&config.api.base_url),
                error_message: "Invalid service base URL",
            },
            ValidationRule {
                field_path: "api.profiles_base_url",
                validator: |config| match &config.api.profiles_base_url {
                    Some(url) => check_url(url),
                    None => Ok(()),
                },
                error_message: "Invalid profiles base URL",
            },
            ValidationRule {
                field_path: "api.request_timeout_secs",
                validator: |config| {
                    if config.api.request_timeout_secs == 0 {
                        Err(anyhow::anyhow!("Request timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid request timeout",
            },
            ValidationRule {
                field_path: "api.upload_field",
                validator: |config| {
                    if config.api.upload_field.trim().is_empty() {
                        Err(anyhow::anyhow!("Upload field name cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid upload field",
            },
            ValidationRule {
                field_path: "viewer.max_payload_bytes",
                validator: |config| {
                    if config.viewer.max_payload_bytes == 0 {
                        Err(anyhow::anyhow!("Payload limit cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid viewer payload limit",
            },
            ValidationRule {
                field_path: "logging.format",
                validator: |config| match config.logging.format.as_str() {
                    "full" | "compact" | "pretty" => Ok(()),
                    other => Err(anyhow::anyhow!("Unknown log format: {}", other)),
                },
                error_message: "Invalid log format",
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &MatcherConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("matcher-config-")
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults_preserve_error_asymmetry() {
        let config = MatcherConfig::default();
        assert_eq!(config.workflow.match_errors, ErrorSurfacing::LoggedOnly);
        assert_eq!(config.workflow.profile_errors, ErrorSurfacing::Surfaced);
        assert_eq!(config.workflow.catalog_errors, ErrorSurfacing::Surfaced);
        assert_eq!(config.workflow.numeric_policy, NumericPolicy::SubmitAsIs);
        assert_eq!(config.api.upload_field, "files[]");
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let file = temp_config(
            r#"
[api]
base_url = "https://matcher.example.org"
profiles_base_url = "https://matcher.example.org/api"

[workflow]
match_errors = "surfaced"
numeric_policy = "block"
"#,
        );

        let manager = ConfigManager::load(Some(file.path())).unwrap();
        let config = manager.config();
        assert_eq!(config.api.base_url, "https://matcher.example.org");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.workflow.match_errors, ErrorSurfacing::Surfaced);
        assert_eq!(config.workflow.numeric_policy, NumericPolicy::Block);
        assert_eq!(config.viewer, ViewerConfig::default());
        assert_eq!(
            manager.get_value("api.profiles_base_url").unwrap(),
            serde_json::json!("https://matcher.example.org/api")
        );
        assert_eq!(manager.config_path(), Some(file.path()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");
        assert!(ConfigManager::load(Some(&path)).is_err());
    }

    #[test]
    fn test_validation_rules() {
        let validator = ConfigValidator::new();

        let mut config = MatcherConfig::default();
        config.api.base_url = "localhost:8000".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = MatcherConfig::default();
        config.api.request_timeout_secs = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = MatcherConfig::default();
        config.viewer.max_payload_bytes = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = MatcherConfig::default();
        config.logging.format = "json".to_string();
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_to_toml_reloads_to_same_config() {
        let mut config = MatcherConfig::default();
        config.api.profiles_base_url = Some("http://localhost:3000/api".to_string());
        let manager = ConfigManager::from_config(config.clone()).unwrap();

        let text = manager.to_toml().unwrap();
        assert!(text.contains("match_errors = \"logged_only\""));
        let reparsed: MatcherConfig = toml::from_str(&text).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_get_value_unknown_path() {
        let manager = ConfigManager::from_config(MatcherConfig::default()).unwrap();
        assert!(manager.get_value("api.nope").is_err());
        assert_eq!(
            manager.get_value("logging.level").unwrap(),
            serde_json::json!("info")
        );
    }
}
