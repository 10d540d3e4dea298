//! 文档渲染器
//!
//! 把base64负载转换为可嵌入的资源地址。状态互斥：`Empty`、`Loading`、
//! `Error`、`Ready`。每个渲染器实例同一时刻最多持有一个资源；
//! 新负载到达时先释放旧资源，渲染器关闭后任何迟到的解码结果都会被丢弃。

use crate::decode::decode_pdf_payload;
use crate::registry::{ResourceHandle, ResourceRegistry};
use matcher_core::{Liveness, MatcherError, RequestSequencer, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 解码失败时展示给用户的消息
pub const DECODE_FAILED_MESSAGE: &str = "Failed to process PDF data";

/// 渲染器设置
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// base64文本的最大长度
    pub max_payload_bytes: usize,
    /// 是否要求PDF文件头
    pub require_pdf_signature: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024 * 1024,
            require_pdf_signature: false,
        }
    }
}

/// 渲染器内部状态，`Ready` 持有资源句柄
#[derive(Debug)]
enum RenderState {
    Empty,
    Loading,
    Error(String),
    Ready(ResourceHandle),
}

/// 渲染器状态快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderView {
    Empty,
    Loading,
    Error(String),
    Ready(String),
}

impl RenderView {
    /// 可嵌入的资源地址，仅在 `Ready` 时存在
    pub fn resource_uri(&self) -> Option<&str> {
        match self {
            RenderView::Ready(uri) => Some(uri),
            _ => None,
        }
    }
}

impl From<&RenderState> for RenderView {
    fn from(state: &RenderState) -> Self {
        match state {
            RenderState::Empty => RenderView::Empty,
            RenderState::Loading => RenderView::Loading,
            RenderState::Error(message) => RenderView::Error(message.clone()),
            RenderState::Ready(handle) => RenderView::Ready(handle.uri().to_string()),
        }
    }
}

/// 文档渲染器，克隆后共享同一实例
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    state: Arc<Mutex<RenderState>>,
    registry: ResourceRegistry,
    sequencer: Arc<RequestSequencer>,
    liveness: Liveness,
    settings: RendererSettings,
}

impl DocumentRenderer {
    /// 创建渲染器
    pub fn new(registry: ResourceRegistry, settings: RendererSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(RenderState::Empty)),
            registry,
            sequencer: Arc::new(RequestSequencer::new("viewer")),
            liveness: Liveness::new(),
            settings,
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn is_open(&self) -> bool {
        self.liveness.is_alive()
    }

    /// 当前状态
    pub async fn state(&self) -> RenderView {
        RenderView::from(&*self.state.lock().await)
    }

    /// 替换状态，被替换的 `Ready` 状态中的资源在此释放。关闭后保持 `Empty`
    async fn replace(&self, next: RenderState) -> RenderView {
        let mut state = self.state.lock().await;
        if !self.liveness.is_alive() {
            *state = RenderState::Empty;
            return RenderView::Empty;
        }
        let view = RenderView::from(&next);
        *state = next;
        view
    }

    /// 渲染新负载。
    ///
    /// `None` 或空串进入 `Empty`；解码失败进入 `Error`，不会创建资源。
    /// 如果在解码期间渲染器被关闭或收到更新的负载，返回 `StaleResponseIgnored`。
    pub async fn render(&self, payload: Option<String>) -> Result<RenderView> {
        if !self.is_open() {
            warn!("Ignoring payload for a closed renderer");
            return Ok(RenderView::Empty);
        }

        let token = self.sequencer.issue();
        let payload = match payload.filter(|p| !p.trim().is_empty()) {
            Some(payload) => payload,
            None => {
                self.sequencer.settle(token);
                return Ok(self.replace(RenderState::Empty).await);
            }
        };

        // 先释放旧资源再开始解码
        self.replace(RenderState::Loading).await;

        let decoded = if payload.len() > self.settings.max_payload_bytes {
            Err(MatcherError::Decode(format!(
                "payload of {} bytes exceeds limit of {} bytes",
                payload.len(),
                self.settings.max_payload_bytes
            )))
        } else {
            let require_signature = self.settings.require_pdf_signature;
            tokio::task::spawn_blocking(move || decode_pdf_payload(&payload, require_signature))
                .await
                .unwrap_or_else(|e| Err(MatcherError::Internal(format!("decode task failed: {}", e))))
        };

        // 检查与创建资源都在锁内完成，关闭操作无法插入其间
        let mut state = self.state.lock().await;
        self.sequencer.settle(token);
        if !self.liveness.is_alive() {
            debug!("Renderer closed during decode, dropping result");
            return Err(MatcherError::StaleResponseIgnored {
                slot: self.sequencer.slot(),
                token: token.value(),
                current: token.value(),
            });
        }
        self.sequencer.check(token)?;

        *state = match decoded {
            Ok(blob) => {
                let handle = self.registry.create(blob);
                info!("Document ready at {}", handle.uri());
                RenderState::Ready(handle)
            }
            Err(e) => {
                warn!("Error creating PDF resource: {}", e);
                RenderState::Error(DECODE_FAILED_MESSAGE.to_string())
            }
        };
        Ok(RenderView::from(&*state))
    }

    /// 直接进入错误状态（例如获取负载失败），释放已持有的资源
    pub async fn show_error(&self, message: impl Into<String>) -> RenderView {
        let token = self.sequencer.issue();
        self.sequencer.settle(token);
        self.replace(RenderState::Error(message.into())).await
    }

    /// 清空内容并释放资源，进行中的解码结果将被丢弃
    pub async fn clear(&self) {
        let token = self.sequencer.issue();
        self.sequencer.settle(token);
        self.replace(RenderState::Empty).await;
    }

    /// 关闭渲染器，无条件释放资源
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if self.liveness.teardown() {
            debug!("Renderer closed");
        }
        *state = RenderState::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF_B64: &str = "JVBERi0xLjQK";

    fn renderer() -> DocumentRenderer {
        DocumentRenderer::new(ResourceRegistry::new(), RendererSettings::default())
    }

    #[tokio::test]
    async fn test_render_then_close_leaves_no_live_resources() {
        let renderer = renderer();
        let view = renderer.render(Some(PDF_B64.to_string())).await.unwrap();
        let uri = view.resource_uri().unwrap().to_string();
        assert!(renderer.registry().resolve(&uri).is_some());

        renderer.close().await;
        assert_eq!(renderer.state().await, RenderView::Empty);
        assert_eq!(renderer.registry().live(), 0);
        assert_eq!(renderer.registry().created(), renderer.registry().released());
    }

    #[tokio::test]
    async fn test_new_payload_releases_previous_resource() {
        let renderer = renderer();
        let first = renderer.render(Some(PDF_B64.to_string())).await.unwrap();
        let second = renderer.render(Some(PDF_B64.to_string())).await.unwrap();

        assert_ne!(first.resource_uri(), second.resource_uri());
        assert_eq!(renderer.registry().live(), 1);
        assert!(renderer.registry().resolve(first.resource_uri().unwrap()).is_none());
        assert_eq!(renderer.registry().created(), 2);
        assert_eq!(renderer.registry().released(), 1);
    }

    #[tokio::test]
    async fn test_invalid_payload_creates_nothing() {
        let renderer = renderer();
        let view = renderer.render(Some("####".to_string())).await.unwrap();
        assert_eq!(view, RenderView::Error(DECODE_FAILED_MESSAGE.to_string()));
        assert!(view.resource_uri().is_none());
        assert_eq!(renderer.registry().created(), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_releases_and_shows_nothing() {
        let renderer = renderer();
        renderer.render(Some(PDF_B64.to_string())).await.unwrap();

        assert_eq!(renderer.render(None).await.unwrap(), RenderView::Empty);
        assert_eq!(renderer.render(Some(String::new())).await.unwrap(), RenderView::Empty);
        assert_eq!(renderer.registry().live(), 0);
    }

    #[tokio::test]
    async fn test_close_during_decode_discards_result() {
        let renderer = renderer();
        let pending = {
            let renderer = renderer.clone();
            tokio::spawn(async move { renderer.render(Some(PDF_B64.to_string())).await })
        };
        renderer.close().await;

        // 无论解码先完成还是关闭先完成，最终都没有存活资源
        let _ = pending.await.unwrap();
        assert_eq!(renderer.registry().live(), 0);
        assert_eq!(renderer.registry().created(), renderer.registry().released());
        assert_eq!(renderer.state().await, RenderView::Empty);
    }

    #[tokio::test]
    async fn test_payload_limit() {
        let renderer = DocumentRenderer::new(
            ResourceRegistry::new(),
            RendererSettings {
                max_payload_bytes: 4,
                require_pdf_signature: false,
            },
        );
        let view = renderer.render(Some(PDF_B64.to_string())).await.unwrap();
        assert!(matches!(view, RenderView::Error(_)));
        assert_eq!(renderer.registry().created(), 0);
    }

    #[tokio::test]
    async fn test_dropping_last_clone_releases_resource() {
        let registry = ResourceRegistry::new();
        {
            let renderer = DocumentRenderer::new(registry.clone(), RendererSettings::default());
            renderer.render(Some(PDF_B64.to_string())).await.unwrap();
            assert_eq!(registry.live(), 1);
        }
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn test_show_error_releases_resource() {
        let renderer = renderer();
        renderer.render(Some(PDF_B64.to_string())).await.unwrap();
        let view = renderer.show_error("Failed to load PDF").await;
        assert_eq!(view, RenderView::Error("Failed to load PDF".to_string()));
        assert_eq!(renderer.registry().live(), 0);
    }
}
