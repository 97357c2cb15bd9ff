//! Configuration types for ebook export.
//!
//! All export behaviour that is not part of the book itself is controlled
//! through [`ExportConfig`], built via its [`ExportConfigBuilder`]. Keeping
//! every knob in one struct makes it trivial to share a config between PDF
//! and DOCX exports of the same book and to log exactly what a run used.
//!
//! # Design choice: builder over constructor
//! Most callers only care about one or two knobs (usually the image timeout
//! or the author prefix). The builder lets them set only those and rely on
//! documented defaults for the rest.

use crate::error::ExportError;
use crate::progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an ebook export.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use ebook_export::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .image_timeout_secs(5)
///     .author_prefix("por ")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Upper bound for resolving one image, all fallback strategies
    /// included. Range: 1–120. Default: 10.
    ///
    /// Exceeding the bound skips that image; it never fails the export.
    /// Books pulling images from slow CDNs may want more; offline exports of
    /// books with only embedded `data:` images are unaffected.
    pub image_timeout_secs: u64,

    /// Upper bound for each image inside a cover surface to finish loading
    /// before the snapshot is taken. Default: 3.
    ///
    /// Images still pending afterwards are captured as whatever the surface
    /// draws for them (usually nothing).
    pub cover_image_wait_secs: u64,

    /// Pixel density multiplier for the cover snapshot. Range: 1.0–4.0.
    /// Default: 2.0.
    ///
    /// The snapshot is a full page at 8.5in × 11in (816 × 1056 CSS pixels);
    /// 2× gives 1632 × 2112 pixels, sharp enough for print without making
    /// the document balloon.
    pub snapshot_scale: f32,

    /// Maximum width of a content image in DOCX output, in pixels at
    /// 96 dpi. Default: 480 (five inches).
    pub docx_max_image_width_px: u32,

    /// Text placed in front of the author's name on cover and title pages.
    /// Default: `"by "`.
    pub author_prefix: String,

    /// User-Agent sent when fetching remote images. If None, uses
    /// `ebook-export/<version>`.
    pub user_agent: Option<String>,

    /// Directory local image paths may be read from. Default: None.
    ///
    /// With None every non-URL, non-`data:` locator is refused. When set,
    /// relative locators resolve against it and anything that canonicalizes
    /// outside it is refused, so book content cannot pull arbitrary files
    /// off the exporting machine.
    pub local_image_root: Option<PathBuf>,

    /// Optional per-element progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            image_timeout_secs: 10,
            cover_image_wait_secs: 3,
            snapshot_scale: 2.0,
            docx_max_image_width_px: 480,
            author_prefix: "by ".to_string(),
            user_agent: None,
            local_image_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("cover_image_wait_secs", &self.cover_image_wait_secs)
            .field("snapshot_scale", &self.snapshot_scale)
            .field("docx_max_image_width_px", &self.docx_max_image_width_px)
            .field("author_prefix", &self.author_prefix)
            .field("user_agent", &self.user_agent)
            .field("local_image_root", &self.local_image_root)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn cover_image_wait(&self) -> Duration {
        Duration::from_secs(self.cover_image_wait_secs)
    }

    /// Snapshot scale forced into 1.0–4.0.
    ///
    /// The fields are public, so a config assembled without the builder can
    /// carry anything; the cover snapshot must never size a canvas from it
    /// directly.
    pub(crate) fn snapshot_scale(&self) -> f32 {
        if self.snapshot_scale.is_finite() {
            self.snapshot_scale.clamp(1.0, 4.0)
        } else {
            2.0
        }
    }

    /// The configured callback, or a no-op.
    pub(crate) fn progress(&self) -> &dyn ExportProgressCallback {
        static NOOP: NoopProgressCallback = NoopProgressCallback;
        match &self.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &NOOP,
        }
    }

    pub(crate) fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| concat!("ebook-export/", env!("CARGO_PKG_VERSION")).to_string())
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl fmt::Debug for ExportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExportConfigBuilder {
    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs.clamp(1, 120);
        self
    }

    pub fn cover_image_wait_secs(mut self, secs: u64) -> Self {
        self.config.cover_image_wait_secs = secs;
        self
    }

    pub fn snapshot_scale(mut self, scale: f32) -> Self {
        self.config.snapshot_scale = scale;
        self
    }

    pub fn docx_max_image_width_px(mut self, px: u32) -> Self {
        self.config.docx_max_image_width_px = px.max(16);
        self
    }

    pub fn author_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.author_prefix = prefix.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    pub fn local_image_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.local_image_root = Some(root.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        if !(1.0..=4.0).contains(&c.snapshot_scale) {
            return Err(ExportError::InvalidConfig(format!(
                "Snapshot scale must be 1.0–4.0, got {}",
                c.snapshot_scale
            )));
        }
        if c.cover_image_wait_secs > 60 {
            return Err(ExportError::InvalidConfig(format!(
                "Cover image wait must be ≤ 60s, got {}s",
                c.cover_image_wait_secs
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Paginated PDF drawn directly with standard Type1 fonts. (default)
    #[default]
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
}

impl ExportFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    /// MIME type of the produced document.
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Pdf => f.write_str("PDF"),
            ExportFormat::Docx => f.write_str("DOCX"),
        }
    }
}
