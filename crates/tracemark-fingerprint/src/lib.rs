/// Tracemark fingerprinting
///
/// Derives comparable signatures from published content and scores pairs of
/// signatures of the same kind:
/// - Text: normalized token set, compared with the Jaccard index
/// - Image: 64-bit difference hash, compared with normalized Hamming similarity
/// - Video: source reference and duration only, compared for equality or a
///   duration match within a tolerance. Re-encoded uploads are not detected.
///
/// Extraction is deterministic: the same payload always yields the same signature.

pub mod perceptual;
pub mod similarity;
pub mod text;
pub mod video;

use tracemark_types::models::{ContentPayload, Signature};

pub use similarity::{similarity, similarity_with};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Payload had nothing to fingerprint
    #[error("payload is empty")]
    Empty,
    /// Image bytes could not be decoded
    #[error("payload could not be decoded: {0}")]
    Undecodable(String),
}

/// Produce a signature for a payload. Callers skip fingerprinting on error.
pub fn extract(payload: &ContentPayload) -> Result<Signature, ExtractError> {
    match payload {
        ContentPayload::Text(body) => text::signature(body),
        ContentPayload::Image(bytes) => perceptual::signature(bytes),
        ContentPayload::Video {
            source_ref,
            duration_ms,
        } => video::signature(source_ref, *duration_ms),
    }
}
