//! Media validation for analysis submissions.
//!
//! Files are classified by byte signature first, falling back to the file
//! extension, and size-checked before any bytes go on the wire. The accepted
//! formats and the 5 MiB image limit match what the detection service
//! enforces on its side.

use std::path::Path;

use serde::Serialize;

use crate::error::{Result, VigilError};

/// Maximum accepted image payload.
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
/// Maximum accepted video payload.
pub const MAX_VIDEO_BYTES: u64 = 50 * 1024 * 1024;

/// Broad media category, which selects the service endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A validated analysis submission.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Original file name (used for the multipart part and the UI).
    pub name: String,
    pub kind: MediaKind,
    /// MIME type for the multipart part.
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// Validate raw bytes as an analysis submission.
    ///
    /// # Errors
    /// `VigilError::InvalidMedia` when the bytes match no accepted format,
    /// `VigilError::MediaTooLarge` when the size limit for the detected kind
    /// is exceeded.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let (kind, mime) = sniff_format(&bytes, &name)
            .ok_or_else(|| VigilError::InvalidMedia(name.clone()))?;

        let limit = match kind {
            MediaKind::Image => MAX_IMAGE_BYTES,
            MediaKind::Video => MAX_VIDEO_BYTES,
        };
        let actual = bytes.len() as u64;
        if actual > limit {
            return Err(VigilError::MediaTooLarge { limit, actual });
        }

        Ok(Self {
            name,
            kind,
            mime,
            bytes,
        })
    }

    /// Read and validate a file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self::from_bytes(name, bytes)
    }
}

/// Classify media by byte signature, falling back to the file extension.
pub fn sniff_format(bytes: &[u8], file_name: &str) -> Option<(MediaKind, &'static str)> {
    if bytes.len() >= 12 {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some((MediaKind::Image, "image/png"));
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some((MediaKind::Image, "image/jpeg"));
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some((MediaKind::Image, "image/gif"));
        }
        if bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            return Some((MediaKind::Image, "image/webp"));
        }
        if &bytes[4..8] == b"ftyp" {
            // ISO base media: MP4 family, with QuickTime as a named brand.
            if &bytes[8..12] == b"qt  " {
                return Some((MediaKind::Video, "video/quicktime"));
            }
            return Some((MediaKind::Video, "video/mp4"));
        }
        if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            // EBML header: WebM or Matroska.
            return Some((MediaKind::Video, "video/webm"));
        }
        if bytes.starts_with(b"RIFF") && &bytes[8..12] == b"AVI " {
            return Some((MediaKind::Video, "video/x-msvideo"));
        }
    }

    match extension_of(file_name)?.as_str() {
        "png" => Some((MediaKind::Image, "image/png")),
        "jpg" | "jpeg" => Some((MediaKind::Image, "image/jpeg")),
        "gif" => Some((MediaKind::Image, "image/gif")),
        "webp" => Some((MediaKind::Image, "image/webp")),
        "mp4" | "m4v" => Some((MediaKind::Video, "video/mp4")),
        "mov" => Some((MediaKind::Video, "video/quicktime")),
        "webm" | "mkv" => Some((MediaKind::Video, "video/webm")),
        "avi" => Some((MediaKind::Video, "video/x-msvideo")),
        _ => None,
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}
