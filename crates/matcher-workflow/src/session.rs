//! 匹配会话
//!
//! 把上传、档案表单和论文目录三个控制器组合在一起，共享同一个服务接口和资源登记表。

use crate::paper_catalog::PaperCatalogController;
use crate::profile_form::{FormSettings, ProfileFormController};
use crate::upload::UploadOrchestrator;
use matcher_client::{HealthStatus, MatcherApi};
use matcher_core::{ErrorSurfacing, Result};
use matcher_viewer::{RendererSettings, ResourceRegistry};
use std::sync::Arc;
use tracing::info;

/// 会话设置
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub form: FormSettings,
    /// 论文列表、删除、查看失败的呈现方式
    pub catalog_errors: ErrorSurfacing,
    pub renderer: RendererSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            form: FormSettings::default(),
            catalog_errors: ErrorSurfacing::Surfaced,
            renderer: RendererSettings::default(),
        }
    }
}

/// 匹配会话
///
/// 各控制器各自拥有自己的状态，彼此之间只共享服务接口和资源登记表。
#[derive(Clone)]
pub struct MatcherSession {
    api: Arc<dyn MatcherApi>,
    registry: ResourceRegistry,
    upload: UploadOrchestrator,
    form: ProfileFormController,
    catalog: PaperCatalogController,
}

impl MatcherSession {
    pub fn new(api: Arc<dyn MatcherApi>, settings: SessionSettings) -> Self {
        let registry = ResourceRegistry::new();
        Self {
            upload: UploadOrchestrator::new(Arc::clone(&api)),
            form: ProfileFormController::new(Arc::clone(&api), settings.form),
            catalog: PaperCatalogController::new(
                Arc::clone(&api),
                registry.clone(),
                settings.renderer,
                settings.catalog_errors,
            ),
            registry,
            api,
        }
    }

    pub fn api(&self) -> &Arc<dyn MatcherApi> {
        &self.api
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn upload(&self) -> &UploadOrchestrator {
        &self.upload
    }

    pub fn form(&self) -> &ProfileFormController {
        &self.form
    }

    pub fn catalog(&self) -> &PaperCatalogController {
        &self.catalog
    }

    /// 服务健康检查
    pub async fn health(&self) -> Result<HealthStatus> {
        let status = self.api.health().await?;
        info!("Matcher service status: {}", status.status);
        Ok(status)
    }

    /// 拆除所有控制器，释放所有文档资源
    pub async fn shutdown(&self) {
        self.upload.teardown().await;
        self.form.teardown().await;
        self.catalog.teardown().await;
        info!(
            "Session closed ({} resources created, {} released)",
            self.registry.created(),
            self.registry.released()
        );
    }
}
