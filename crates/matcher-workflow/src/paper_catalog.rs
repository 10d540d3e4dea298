//! 论文目录控制器
//!
//! 列表总是整体替换；删除必须先得到点名标题的确认凭证，确认后无论成败都重新拉取列表。
//! 查看论文时为每次打开创建新的渲染器，打开新论文前关闭旧的渲染器并释放其资源。

use matcher_client::MatcherApi;
use matcher_core::{
    ErrorSurfacing, Liveness, MatcherError, Paper, PaperDetails, RequestSequencer, Result,
};
use matcher_viewer::{DocumentRenderer, RenderView, RendererSettings, ResourceRegistry};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const LOAD_PAPERS_FAILED: &str = "Failed to load papers";
pub const DELETE_PAPER_FAILED: &str = "Failed to delete paper";
pub const LOAD_PDF_FAILED: &str = "Failed to load PDF";
pub const MISSING_PDF_MESSAGE: &str = "No PDF content available";

struct OpenView {
    paper: Paper,
    renderer: DocumentRenderer,
}

#[derive(Default)]
struct CatalogInner {
    papers: Vec<Paper>,
    error: Option<String>,
    view: Option<OpenView>,
}

/// 查看器快照：论文详情和文档渲染状态
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSnapshot {
    pub paper_id: String,
    pub details: PaperDetails,
    pub document: RenderView,
}

/// 论文删除确认凭证
#[derive(Debug)]
#[must_use = "a deletion does nothing until confirmed"]
pub struct PaperDeletion {
    paper_id: String,
    title: String,
}

impl PaperDeletion {
    pub fn paper_id(&self) -> &str {
        &self.paper_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// 确认对话框的提示文本
    pub fn message(&self) -> String {
        format!("Are you sure you want to delete \"{}\"?", self.title)
    }
}

/// 论文目录控制器，克隆后共享同一目录
#[derive(Clone)]
pub struct PaperCatalogController {
    api: Arc<dyn MatcherApi>,
    inner: Arc<Mutex<CatalogInner>>,
    list_seq: Arc<RequestSequencer>,
    view_seq: Arc<RequestSequencer>,
    liveness: Liveness,
    registry: ResourceRegistry,
    renderer_settings: RendererSettings,
    errors: ErrorSurfacing,
}

impl PaperCatalogController {
    pub fn new(
        api: Arc<dyn MatcherApi>,
        registry: ResourceRegistry,
        renderer_settings: RendererSettings,
        errors: ErrorSurfacing,
    ) -> Self {
        Self {
            api,
            inner: Arc::new(Mutex::new(CatalogInner::default())),
            list_seq: Arc::new(RequestSequencer::new("paper-list")),
            view_seq: Arc::new(RequestSequencer::new("paper-view")),
            liveness: Liveness::new(),
            registry,
            renderer_settings,
            errors,
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub async fn papers(&self) -> Vec<Paper> {
        self.inner.lock().await.papers.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.lock().await.error.clone()
    }

    pub async fn dismiss_error(&self) {
        self.inner.lock().await.error = None;
    }

    fn report(&self, inner: &mut CatalogInner, message: &str) {
        if self.errors.is_surfaced() {
            inner.error = Some(message.to_string());
        } else {
            warn!("{}", message);
        }
    }

    /// 拉取全部论文并整体替换列表
    pub async fn refresh(&self) -> Result<Vec<Paper>> {
        let token = self.list_seq.issue();
        let result = self.api.list_papers().await;

        let mut inner = self.inner.lock().await;
        self.list_seq.settle(token);
        if !self.liveness.is_alive() {
            return Err(MatcherError::StaleResponseIgnored {
                slot: self.list_seq.slot(),
                token: token.value(),
                current: token.value(),
            });
        }
        self.list_seq.check(token)?;

        match result {
            Ok(papers) => {
                debug!("Fetched {} papers", papers.len());
                inner.papers = papers.clone();
                Ok(papers)
            }
            Err(e) => {
                error!("Error fetching papers: {}", e);
                self.report(&mut inner, LOAD_PAPERS_FAILED);
                Err(e)
            }
        }
    }

    /// 删除第一步：按当前列表找到论文，返回点名标题的确认凭证
    pub async fn request_delete(&self, paper_id: &str) -> Result<PaperDeletion> {
        let inner = self.inner.lock().await;
        let paper = inner
            .papers
            .iter()
            .find(|p| p.id == paper_id)
            .ok_or_else(|| MatcherError::NotFound(format!("paper {}", paper_id)))?;

        Ok(PaperDeletion {
            paper_id: paper.id.clone(),
            title: paper.title.clone(),
        })
    }

    /// 确认删除。之后总是重新拉取列表，列表不做乐观修改
    pub async fn confirm_delete(&self, deletion: PaperDeletion) -> Result<()> {
        info!("Deleting paper {} ({})", deletion.paper_id, deletion.title);
        let result = self.api.delete_paper(&deletion.paper_id).await;

        match &result {
            Ok(()) => {
                let viewing = {
                    let inner = self.inner.lock().await;
                    inner
                        .view
                        .as_ref()
                        .is_some_and(|v| v.paper.id == deletion.paper_id)
                };
                if viewing {
                    self.close_view().await;
                }
            }
            Err(e) => error!("Error deleting paper {}: {}", deletion.paper_id, e),
        }

        if let Err(e) = self.refresh().await {
            debug!("Refetch after delete failed: {}", e);
        }
        // 删除失败的提示在重新拉取之后写入，不被列表加载失败覆盖
        if result.is_err() && self.liveness.is_alive() {
            let mut inner = self.inner.lock().await;
            self.report(&mut inner, DELETE_PAPER_FAILED);
        }
        result
    }

    pub fn cancel_delete(&self, deletion: PaperDeletion) {
        debug!("Deletion of paper {} cancelled", deletion.paper_id);
    }

    /// 打开论文查看器并渲染其PDF。
    ///
    /// 之前打开的查看器先被关闭；被更新的查看请求取代时返回 `StaleResponseIgnored`。
    pub async fn view(&self, paper_id: &str) -> Result<RenderView> {
        let renderer = DocumentRenderer::new(self.registry.clone(), self.renderer_settings.clone());

        let (token, previous) = {
            let mut inner = self.inner.lock().await;
            let paper = inner
                .papers
                .iter()
                .find(|p| p.id == paper_id)
                .cloned()
                .ok_or_else(|| MatcherError::NotFound(format!("paper {}", paper_id)))?;
            let token = self.view_seq.issue();
            let previous = inner.view.replace(OpenView {
                paper,
                renderer: renderer.clone(),
            });
            (token, previous)
        };
        if let Some(previous) = previous {
            previous.renderer.close().await;
        }

        info!("Loading PDF for paper {}", paper_id);
        let result = self.api.view_paper(paper_id).await;

        self.view_seq.settle(token);
        if !self.liveness.is_alive() {
            renderer.close().await;
            return Err(MatcherError::StaleResponseIgnored {
                slot: self.view_seq.slot(),
                token: token.value(),
                current: token.value(),
            });
        }
        self.view_seq.check(token)?;

        match result {
            Ok(view) => match view.pdf_content.filter(|p| !p.trim().is_empty()) {
                Some(payload) => renderer.render(Some(payload)).await,
                None => {
                    warn!("Paper {} has no PDF content", paper_id);
                    Ok(renderer.show_error(MISSING_PDF_MESSAGE).await)
                }
            },
            Err(e) => {
                error!("Error loading PDF for paper {}: {}", paper_id, e);
                {
                    let mut inner = self.inner.lock().await;
                    self.report(&mut inner, LOAD_PDF_FAILED);
                }
                Ok(renderer.show_error(LOAD_PDF_FAILED).await)
            }
        }
    }

    /// 关闭查看器，释放文档资源
    pub async fn close_view(&self) {
        // 进行中的查看请求随之过期
        let token = self.view_seq.issue();
        self.view_seq.settle(token);
        let previous = self.inner.lock().await.view.take();
        if let Some(previous) = previous {
            debug!("Closing viewer for paper {}", previous.paper.id);
            previous.renderer.close().await;
        }
    }

    /// 当前打开的查看器
    pub async fn viewer(&self) -> Option<ViewerSnapshot> {
        let (paper, renderer) = {
            let inner = self.inner.lock().await;
            let view = inner.view.as_ref()?;
            (view.paper.clone(), view.renderer.clone())
        };

        Some(ViewerSnapshot {
            paper_id: paper.id.clone(),
            details: paper.details(),
            document: renderer.state().await,
        })
    }

    /// 拆除目录，关闭查看器
    pub async fn teardown(&self) {
        self.liveness.teardown();
        self.close_view().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fail, gate, ok, paper, settle, ScriptedApi};
    use matcher_core::PaperView;

    const PDF_B64: &str = "JVBERi0xLjQK";

    fn catalog(api: &Arc<ScriptedApi>) -> PaperCatalogController {
        PaperCatalogController::new(
            api.clone(),
            ResourceRegistry::new(),
            RendererSettings::default(),
            ErrorSurfacing::Surfaced,
        )
    }

    fn pdf(payload: &str) -> PaperView {
        PaperView {
            pdf_content: Some(payload.to_string()),
        }
    }

    async fn loaded(api: &Arc<ScriptedApi>, papers: Vec<Paper>) -> PaperCatalogController {
        api.script().list.push_back(ok(papers));
        let catalog = catalog(api);
        catalog.refresh().await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn test_refresh_replaces_list() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One"), paper("p2", "Two")]).await;
        api.script().list.push_back(ok(vec![paper("p3", "Three")]));

        catalog.refresh().await.unwrap();
        let ids: Vec<String> = catalog.papers().await.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p3"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_shows_error_and_keeps_list() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One")]).await;
        api.script()
            .list
            .push_back(fail(MatcherError::Transport("connection refused".to_string())));

        assert!(catalog.refresh().await.is_err());
        assert_eq!(catalog.error().await.as_deref(), Some(LOAD_PAPERS_FAILED));
        assert_eq!(catalog.papers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_prompt_names_title_and_cancel_makes_no_call() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "Statins in the Elderly")]).await;

        assert!(catalog.request_delete("missing").await.unwrap_err().is_not_found());

        let deletion = catalog.request_delete("p1").await.unwrap();
        assert_eq!(
            deletion.message(),
            "Are you sure you want to delete \"Statins in the Elderly\"?"
        );
        catalog.cancel_delete(deletion);
        assert_eq!(api.count("DELETE"), 0);
    }

    #[tokio::test]
    async fn test_confirmed_delete_always_refetches() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One"), paper("p2", "Two")]).await;
        {
            let mut script = api.script();
            script.delete_paper.push_back(ok(()));
            script.list.push_back(ok(vec![paper("p2", "Two")]));
            script.delete_paper.push_back(fail(MatcherError::Http {
                status: 500,
                detail: "partial failure".to_string(),
            }));
            script.list.push_back(ok(vec![paper("p2", "Two")]));
        }

        let deletion = catalog.request_delete("p1").await.unwrap();
        catalog.confirm_delete(deletion).await.unwrap();
        assert_eq!(catalog.papers().await, vec![paper("p2", "Two")]);

        let deletion = catalog.request_delete("p2").await.unwrap();
        assert!(catalog.confirm_delete(deletion).await.is_err());
        assert_eq!(catalog.error().await.as_deref(), Some(DELETE_PAPER_FAILED));
        assert_eq!(catalog.papers().await, vec![paper("p2", "Two")]);

        assert_eq!(
            api.calls(),
            vec![
                "GET /papers",
                "DELETE /papers/p1",
                "GET /papers",
                "DELETE /papers/p2",
                "GET /papers",
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_error_outlives_failed_refetch() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One")]).await;
        {
            let mut script = api.script();
            script
                .delete_paper
                .push_back(fail(MatcherError::Transport("connection reset".to_string())));
            script
                .list
                .push_back(fail(MatcherError::Transport("connection reset".to_string())));
        }

        let deletion = catalog.request_delete("p1").await.unwrap();
        assert!(catalog.confirm_delete(deletion).await.is_err());

        assert_eq!(catalog.error().await.as_deref(), Some(DELETE_PAPER_FAILED));
        assert_eq!(catalog.papers().await, vec![paper("p1", "One")]);
        assert_eq!(api.count("GET /papers"), 2);
    }

    #[tokio::test]
    async fn test_second_view_releases_first_resource() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One"), paper("p2", "Two")]).await;
        api.script().view.push_back(ok(pdf(PDF_B64)));
        api.script().view.push_back(ok(pdf(PDF_B64)));

        let first = catalog.view("p1").await.unwrap();
        assert!(first.resource_uri().is_some());
        let second = catalog.view("p2").await.unwrap();

        let registry = catalog.registry();
        assert_eq!(registry.live(), 1);
        assert_eq!(registry.created(), 2);
        assert!(registry.resolve(first.resource_uri().unwrap()).is_none());
        assert!(registry.resolve(second.resource_uri().unwrap()).is_some());

        let viewer = catalog.viewer().await.unwrap();
        assert_eq!(viewer.paper_id, "p2");
        assert_eq!(viewer.details.title, "Two");

        catalog.close_view().await;
        assert!(catalog.viewer().await.is_none());
        assert_eq!(registry.live(), 0);
        assert_eq!(registry.created(), registry.released());
    }

    #[tokio::test]
    async fn test_invalid_payload_renders_error() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One")]).await;
        api.script().view.push_back(ok(pdf("####")));

        let view = catalog.view("p1").await.unwrap();
        assert!(matches!(view, RenderView::Error(_)));
        assert_eq!(catalog.registry().created(), 0);
        assert!(catalog.error().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_content_and_fetch_failure() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One")]).await;
        api.script().view.push_back(ok(PaperView { pdf_content: None }));
        api.script()
            .view
            .push_back(fail(MatcherError::Transport("timed out".to_string())));

        let view = catalog.view("p1").await.unwrap();
        assert_eq!(view, RenderView::Error(MISSING_PDF_MESSAGE.to_string()));

        let view = catalog.view("p1").await.unwrap();
        assert_eq!(view, RenderView::Error(LOAD_PDF_FAILED.to_string()));
        assert_eq!(catalog.error().await.as_deref(), Some(LOAD_PDF_FAILED));
        assert_eq!(catalog.registry().live(), 0);
    }

    #[tokio::test]
    async fn test_stale_view_is_ignored() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One"), paper("p2", "Two")]).await;
        let (release_first, first) = gate();
        api.script().view.push_back(first);
        api.script().view.push_back(ok(pdf(PDF_B64)));

        let earlier = {
            let catalog = catalog.clone();
            tokio::spawn(async move { catalog.view("p1").await })
        };
        settle().await;
        catalog.view("p2").await.unwrap();

        release_first.send(Ok(pdf(PDF_B64))).unwrap();
        assert!(earlier.await.unwrap().unwrap_err().is_stale());

        assert_eq!(catalog.viewer().await.unwrap().paper_id, "p2");
        assert_eq!(catalog.registry().live(), 1);
        assert_eq!(catalog.registry().created(), 1);
    }

    #[tokio::test]
    async fn test_deleting_viewed_paper_closes_viewer() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One")]).await;
        {
            let mut script = api.script();
            script.view.push_back(ok(pdf(PDF_B64)));
            script.delete_paper.push_back(ok(()));
            script.list.push_back(ok(Vec::new()));
        }

        catalog.view("p1").await.unwrap();
        let deletion = catalog.request_delete("p1").await.unwrap();
        catalog.confirm_delete(deletion).await.unwrap();

        assert!(catalog.viewer().await.is_none());
        assert_eq!(catalog.registry().live(), 0);
    }

    #[tokio::test]
    async fn test_teardown_during_fetch_leaves_no_resources() {
        let api = Arc::new(ScriptedApi::new());
        let catalog = loaded(&api, vec![paper("p1", "One")]).await;
        let (release, reply) = gate();
        api.script().view.push_back(reply);

        let pending = {
            let catalog = catalog.clone();
            tokio::spawn(async move { catalog.view("p1").await })
        };
        settle().await;
        catalog.teardown().await;
        release.send(Ok(pdf(PDF_B64))).unwrap();

        assert!(pending.await.unwrap().unwrap_err().is_stale());
        assert_eq!(catalog.registry().live(), 0);
        assert_eq!(catalog.registry().created(), 0);
    }
}
