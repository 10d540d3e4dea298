//! # 文档查看模块
//!
//! 负责把服务端返回的base64 PDF负载转换为本地可寻址的资源，并保证资源按时释放。

pub mod decode;
pub mod registry;
pub mod renderer;

pub use decode::{decode_pdf_payload, has_pdf_signature, PDF_MIME};
pub use registry::{Blob, ResourceHandle, ResourceRegistry};
pub use renderer::{DocumentRenderer, RenderView, RendererSettings, DECODE_FAILED_MESSAGE};
