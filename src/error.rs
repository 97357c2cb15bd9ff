//! Error types for the ebook-export library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExportError`] is **fatal**: the export cannot produce a document at
//!   all (no chapters, unreadable manifest, serialization failure, output
//!   directory not writable). Returned as `Err(ExportError)` from the
//!   top-level `export*` functions. No output file exists after one of these.
//!
//! * [`AssetError`] is **non-fatal**: a single image or the cover snapshot
//!   could not be obtained. The renderer drops that image (or falls back to
//!   a synthesized cover) and keeps going, so one dead link never costs the
//!   user the whole book.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ebook-export library.
///
/// Per-image and per-cover failures use [`AssetError`] and are reported
/// through the progress callback rather than propagated here.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The book has no chapters; nothing to render.
    #[error("Nothing to export: the book has no chapters.\nAdd at least one chapter before exporting.")]
    NoContent,

    /// Book manifest was not found at the given path.
    #[error("Book manifest not found: '{path}'\nCheck the path exists and is readable.")]
    ManifestNotFound { path: PathBuf },

    /// Book manifest exists but is not valid JSON for an ebook.
    #[error("Invalid book manifest '{path}': {detail}")]
    InvalidManifest { path: PathBuf, detail: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// Document assembly or serialization failed inside a renderer.
    #[error("{format} rendering failed: {detail}")]
    RenderFailed { format: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    pub(crate) fn render(format: impl ToString, detail: impl ToString) -> Self {
        ExportError::RenderFailed {
            format: format.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal error for a single image or the cover snapshot.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum AssetError {
    /// A `data:` locator was malformed or its payload was not valid base64.
    #[error("Invalid data URI: {detail}")]
    InvalidDataUri { detail: String },

    /// The image bytes could not be fetched.
    #[error("Failed to fetch '{locator}': {reason}")]
    FetchFailed { locator: String, reason: String },

    /// The server answered with a non-success status.
    #[error("Fetching '{locator}' returned HTTP {status}")]
    HttpStatus { locator: String, status: u16 },

    /// The response was not an image (e.g. an HTML hotlink-protection page).
    #[error("'{locator}' is not an image (content type '{content_type}')")]
    NotAnImage {
        locator: String,
        content_type: String,
    },

    /// The bytes were fetched but could not be decoded as an image.
    #[error("Failed to decode image '{locator}': {detail}")]
    DecodeFailed { locator: String, detail: String },

    /// Every strategy together exceeded the resolution deadline.
    #[error("Image '{locator}' timed out after {secs}s")]
    Timeout { locator: String, secs: u64 },

    /// The cover surface could not be rasterized.
    #[error("Cover capture failed: {detail}")]
    CaptureFailed { detail: String },

    /// The cover surface rasterized to an image with no pixels.
    #[error("Cover capture produced an empty {width}x{height} image")]
    EmptyCapture { width: u32, height: u32 },
}
