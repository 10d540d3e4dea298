//! base64 负载解码

use crate::registry::Blob;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use matcher_core::{MatcherError, Result};

/// PDF文档的MIME类型
pub const PDF_MIME: &str = "application/pdf";

/// 标准字母表，补位可有可无
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 是否以PDF文件头开始
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// 把base64文本解码为PDF对象。
///
/// 解码前去掉所有ASCII空白；`require_signature` 为真时还要求PDF文件头。
pub fn decode_pdf_payload(payload: &str, require_signature: bool) -> Result<Blob> {
    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(MatcherError::Decode("payload is empty".to_string()));
    }

    let bytes = FORGIVING
        .decode(cleaned.as_bytes())
        .map_err(|e| MatcherError::Decode(e.to_string()))?;

    if !has_pdf_signature(&bytes) {
        if require_signature {
            return Err(MatcherError::Decode(
                "payload is not a PDF document".to_string(),
            ));
        }
        tracing::debug!("Decoded payload has no PDF signature ({} bytes)", bytes.len());
    }

    Ok(Blob::new(bytes, PDF_MIME))
}
