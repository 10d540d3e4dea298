//! # Matcher Core
//!
//! 论文匹配客户端的核心模块，提供数据模型、封闭词表、错误定义、
//! 数值转换和请求序号等基础设施。

pub mod coerce;
pub mod draft;
pub mod error;
pub mod models;
pub mod policy;
pub mod sequence;
pub mod vocabulary;

pub use draft::{FieldUpdate, PhysicalDraft, ProfileDraft};
pub use error::{MatcherError, Result};
pub use models::*;
pub use policy::{ErrorSurfacing, NumericPolicy};
pub use sequence::{Liveness, RequestSequencer, RequestToken};
pub use vocabulary::*;
