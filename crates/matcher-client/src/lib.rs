//! # 匹配服务客户端
//!
//! 对外部匹配服务的全部访问都经过这里：
//! - `MatcherApi` trait，控制器依赖的接口边界
//! - `HttpMatcherApi`，基于 reqwest 的 HTTP/JSON 与 multipart 实现
//! - 状态码映射：404 为 `NotFound`，其余非2xx为 `Http`，网络失败为 `Transport`

pub mod api;
pub mod http;

pub use api::{HealthStatus, MatcherApi, UploadResponse};
pub use http::{ApiSettings, HttpMatcherApi};
