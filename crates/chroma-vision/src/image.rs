//! Image intake: turn raw bytes into a transportable encoded payload.
//!
//! Only common raster formats are accepted. The MIME type comes from magic
//! bytes, never from a caller-supplied extension, so a mislabeled file cannot
//! smuggle an unsupported format past intake.

use crate::error::{VisionError, VisionResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single image, base64-encoded with its detected MIME type.
///
/// Created at intake, consumed once by the analysis call, not retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedImage {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl EncodedImage {
    /// Encode raw image bytes. Fails when the format is not a supported
    /// raster format (JPEG, PNG, WebP, GIF).
    pub fn from_bytes(bytes: &[u8]) -> VisionResult<Self> {
        let mime_type = sniff_mime(bytes).ok_or_else(|| {
            VisionError::UnsupportedImage(
                "expected JPEG, PNG, WebP, or GIF".to_string(),
            )
        })?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        })
    }

    /// Read and encode an image file. A failed read is terminal for this
    /// attempt; there are no retries.
    pub fn from_path(path: impl AsRef<Path>) -> VisionResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Accept an already-encoded payload from the HTTP edge, verifying that
    /// both fields are present and the base64 decodes.
    pub fn from_parts(mime_type: &str, data: &str) -> VisionResult<Self> {
        if mime_type.trim().is_empty() || data.trim().is_empty() {
            return Err(VisionError::UnsupportedImage(
                "missing image data or MIME type".to_string(),
            ));
        }
        BASE64
            .decode(data.trim())
            .map_err(|e| VisionError::UnsupportedImage(format!("invalid base64: {}", e)))?;
        Ok(Self {
            mime_type: mime_type.trim().to_string(),
            data: data.trim().to_string(),
        })
    }
}

/// Detect a supported raster format from magic bytes.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
