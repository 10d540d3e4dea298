//! # 匹配工作流模块
//!
//! 客户端的状态与资源编排层，包括：
//! - 批量上传：一次请求提交多份论文，逐文件汇总结果
//! - 档案仓库：加载、保存，以及先探测后确认的删除流程
//! - 档案表单：持有档案草稿并提交匹配
//! - 论文目录：列表、确认删除和PDF查看

pub mod paper_catalog;
pub mod profile_form;
pub mod profile_repository;
pub mod session;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

// 重新导出主要类型
pub use paper_catalog::{PaperCatalogController, PaperDeletion, ViewerSnapshot};
pub use profile_form::{Banner, FormPhase, FormSettings, ProfileFormController};
pub use profile_repository::{ProfileDeletion, ProfileRepository, EMPTY_USERNAME_MESSAGE};
pub use session::{MatcherSession, SessionSettings};
pub use upload::{aggregate, UploadOrchestrator};
