//! Image acquisition with a layered fallback chain.
//!
//! Both renderers need the same thing from an `<img>` locator: the raw
//! bytes to embed and the pixel dimensions to lay them out. Locators come
//! in three shapes (inline `data:` URIs, remote URLs, local paths), and
//! remote hosts fail in annoying ways (hotlink protection returning HTML,
//! redirects, missing content types). [`ImageResolver`] hides all of that
//! behind one call. Local paths are only read below a configured
//! `local_image_root`, and anything that does not sniff as PNG, JPEG or GIF
//! is rejected before it can reach a renderer:
//!
//! ```text
//! data: URI ──▶ base64 decode ─────────────────────────────┐
//!                                                          ├─▶ ResolvedImage
//! URL / path ─▶ ImageSource (strict) ──ok + sniffed────────┤
//!                    │ err / not an image                  │
//!                    ▼                                     │
//!               Rasterizer (permissive, decode + redraw) ──┘
//! ```
//!
//! Every attempt for one locator runs under a single deadline. A failure is
//! an [`AssetError`]: callers skip the image, never the export.
//!
//! ## Why traits at the fetch and redraw seams?
//!
//! The resolution policy (order of strategies, deadline, payload checks)
//! is the part worth testing; the network is not. [`ImageSource`] and
//! [`Rasterizer`] let tests drive every branch of the chain with in-memory
//! fakes while production uses [`HttpImageSource`] and [`CanvasRasterizer`].

use crate::config::ExportConfig;
use crate::error::{AssetError, ExportError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::percent_decode_str;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, ImageFormat, ImageReader, Rgba, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ── Resolved payload ─────────────────────────────────────────────────────

/// Container format of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
}

impl ImageKind {
    /// Identify the container from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Gif => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Gif => "gif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
        }
    }
}

/// An image ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
}

impl ResolvedImage {
    /// Wrap fetched bytes after checking they are a PNG, JPEG or GIF with a
    /// readable header.
    ///
    /// Anything else (an HTML error page, a text file) is rejected here so
    /// neither renderer ever embeds it.
    pub fn from_bytes(data: Vec<u8>, locator: &str) -> Result<Self, AssetError> {
        let not_an_image = |detail: &str| AssetError::DecodeFailed {
            locator: locator.to_string(),
            detail: detail.to_string(),
        };
        let kind = ImageKind::sniff(&data).ok_or_else(|| not_an_image("not a PNG, JPEG or GIF"))?;
        let (width, height) =
            decode_dimensions(&data).ok_or_else(|| not_an_image("unreadable image header"))?;
        Ok(Self {
            data,
            width,
            height,
            kind,
        })
    }

    /// Encode a drawn canvas as PNG.
    pub fn from_canvas(canvas: &DynamicImage) -> Result<Self, image::ImageError> {
        let mut data = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut data), ImageFormat::Png)?;
        Ok(Self {
            data,
            width: canvas.width(),
            height: canvas.height(),
            kind: ImageKind::Png,
        })
    }

    /// Decode the payload to pixels.
    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory(&self.data)
    }
}

/// Read pixel dimensions from an encoded image without decoding pixels.
pub fn decode_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    reader
        .into_dimensions()
        .ok()
        .filter(|&(w, h)| w > 0 && h > 0)
}

// ── Capabilities ─────────────────────────────────────────────────────────

/// Strict byte fetch: the first strategy for non-inline locators.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AssetError>;
}

/// Last-resort strategy: load the image however possible and redraw it
/// onto a canvas of its natural size.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, locator: &str) -> Result<DynamicImage, AssetError>;
}

/// Check if the locator looks like an HTTP(S) URL.
pub fn is_url(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

pub fn is_data_uri(locator: &str) -> bool {
    locator
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

fn local_path(locator: &str) -> PathBuf {
    PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator))
}

/// Read a local image, only when a root directory was configured and the
/// resolved path stays inside it. Relative locators are taken from the root.
async fn read_local(root: Option<&Path>, locator: &str) -> Result<Vec<u8>, AssetError> {
    let fail = |reason: String| AssetError::FetchFailed {
        locator: locator.to_string(),
        reason,
    };
    let root = root.ok_or_else(|| fail("local image paths are disabled".into()))?;

    let requested = local_path(locator);
    let joined = if requested.is_absolute() {
        requested
    } else {
        root.join(requested)
    };
    let root = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| fail(format!("image root: {e}")))?;
    let path = tokio::fs::canonicalize(&joined)
        .await
        .map_err(|e| fail(e.to_string()))?;
    if !path.starts_with(&root) {
        return Err(fail(format!("outside the image root {}", root.display())));
    }

    tokio::fs::read(&path).await.map_err(|e| fail(e.to_string()))
}

/// Production [`ImageSource`]: `reqwest` for URLs, the filesystem otherwise.
///
/// Only 2xx responses whose content type is an image (or unspecified
/// binary) are accepted, so hotlink-protection pages never get embedded.
/// Local paths are refused unless [`HttpImageSource::with_local_root`] set
/// a directory to read them from.
pub struct HttpImageSource {
    client: reqwest::Client,
    local_root: Option<PathBuf>,
}

impl HttpImageSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            local_root: None,
        })
    }

    pub fn with_local_root(mut self, root: Option<PathBuf>) -> Self {
        self.local_root = root;
        self
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AssetError> {
        if !is_url(locator) {
            let bytes = read_local(self.local_root.as_deref(), locator).await?;
            return non_empty(bytes, locator);
        }

        let response = self.client.get(locator).send().await.map_err(|e| {
            AssetError::FetchFailed {
                locator: locator.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            return Err(AssetError::HttpStatus {
                locator: locator.to_string(),
                status: response.status().as_u16(),
            });
        }

        if let Some(ct) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let ct = ct.to_ascii_lowercase();
            if !ct.starts_with("image/") && !ct.starts_with("application/octet-stream") {
                return Err(AssetError::NotAnImage {
                    locator: locator.to_string(),
                    content_type: ct,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssetError::FetchFailed {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        non_empty(bytes.to_vec(), locator)
    }
}

fn non_empty(bytes: Vec<u8>, locator: &str) -> Result<Vec<u8>, AssetError> {
    if bytes.is_empty() {
        return Err(AssetError::FetchFailed {
            locator: locator.to_string(),
            reason: "empty response body".into(),
        });
    }
    Ok(bytes)
}

/// Production [`Rasterizer`].
///
/// Reloads the image with a browser-like request profile (any content type,
/// generous redirect limit, `Accept: image/*`), decodes whatever comes
/// back, and draws it onto a transparent canvas of its natural size. Hosts
/// that mislabel images or gate them behind a redirect chain still work;
/// responses that do not decode as an image still fail.
pub struct CanvasRasterizer {
    client: reqwest::Client,
    local_root: Option<PathBuf>,
}

impl CanvasRasterizer {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ExportError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("image/*,*/*;q=0.8"),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("Mozilla/5.0 (compatible; {user_agent})"))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(20))
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            local_root: None,
        })
    }

    /// Same rules as [`HttpImageSource::with_local_root`].
    pub fn with_local_root(mut self, root: Option<PathBuf>) -> Self {
        self.local_root = root;
        self
    }

    async fn load(&self, locator: &str) -> Result<Vec<u8>, AssetError> {
        if !is_url(locator) {
            return read_local(self.local_root.as_deref(), locator).await;
        }
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AssetError::FetchFailed {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssetError::FetchFailed {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Rasterizer for CanvasRasterizer {
    async fn rasterize(&self, locator: &str) -> Result<DynamicImage, AssetError> {
        let bytes = self.load(locator).await?;
        let owned_locator = locator.to_string();
        tokio::task::spawn_blocking(move || -> Result<DynamicImage, AssetError> {
            let img = image::load_from_memory(&bytes).map_err(|e| AssetError::DecodeFailed {
                locator: owned_locator.clone(),
                detail: e.to_string(),
            })?;
            draw_on_canvas(&img).ok_or(AssetError::DecodeFailed {
                locator: owned_locator,
                detail: "image has no pixels".into(),
            })
        })
        .await
        .map_err(|e| AssetError::DecodeFailed {
            locator: locator.to_string(),
            detail: format!("decode task panicked: {e}"),
        })?
    }
}

/// Draw `img` at the origin of a transparent canvas of its natural size.
pub fn draw_on_canvas(img: &DynamicImage) -> Option<DynamicImage> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return None;
    }
    let mut canvas = RgbaImage::new(w, h);
    imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
    Some(DynamicImage::ImageRgba8(canvas))
}

/// Composite `img` over opaque white and drop the alpha channel.
///
/// JPEG and the PDF `DeviceRGB` image space have no transparency; without
/// this, transparent regions come out black.
pub fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let mut canvas = RgbaImage::from_pixel(img.width(), img.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

// ── Resolver ─────────────────────────────────────────────────────────────

/// Decode a `data:` URI into its payload bytes.
///
/// The payload is percent-decoded first (RFC 2397), then base64-decoded
/// when the header says so.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let (header, payload) = uri.split_once(',').ok_or_else(|| AssetError::InvalidDataUri {
        detail: "missing ',' separator".into(),
    })?;
    let raw: Vec<u8> = percent_decode_str(payload).collect();
    if header.to_ascii_lowercase().ends_with(";base64") {
        let cleaned: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        STANDARD
            .decode(&cleaned)
            .map_err(|e| AssetError::InvalidDataUri {
                detail: e.to_string(),
            })
    } else {
        Ok(raw)
    }
}

/// Resolves image locators to embeddable payloads, one strategy at a time.
#[derive(Clone)]
pub struct ImageResolver {
    source: Arc<dyn ImageSource>,
    rasterizer: Arc<dyn Rasterizer>,
    timeout: Duration,
}

impl ImageResolver {
    pub fn new(
        source: Arc<dyn ImageSource>,
        rasterizer: Arc<dyn Rasterizer>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            rasterizer,
            timeout,
        }
    }

    /// Resolver backed by [`HttpImageSource`] and [`CanvasRasterizer`].
    pub fn from_config(config: &ExportConfig) -> Result<Self, ExportError> {
        let ua = config.user_agent();
        let timeout = config.image_timeout();
        let root = config.local_image_root.clone();
        Ok(Self::new(
            Arc::new(HttpImageSource::new(&ua, timeout)?.with_local_root(root.clone())),
            Arc::new(CanvasRasterizer::new(&ua, timeout)?.with_local_root(root)),
            timeout,
        ))
    }

    /// Resolve `locator`, bounded by the configured deadline.
    pub async fn resolve(&self, locator: &str) -> Result<ResolvedImage, AssetError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(AssetError::FetchFailed {
                locator: String::new(),
                reason: "image has no source".into(),
            });
        }

        match tokio::time::timeout(self.timeout, self.resolve_chain(locator)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Image resolution timed out: {}", short(locator));
                Err(AssetError::Timeout {
                    locator: locator.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    async fn resolve_chain(&self, locator: &str) -> Result<ResolvedImage, AssetError> {
        // 1) Inline payload
        if is_data_uri(locator) {
            let bytes = decode_data_uri(locator)?;
            debug!("Decoded data URI ({} bytes)", bytes.len());
            return ResolvedImage::from_bytes(bytes, locator);
        }

        // 2) Direct fetch
        match self.source.fetch(locator).await {
            Ok(bytes) => {
                debug!("Fetched {} ({} bytes)", short(locator), bytes.len());
                match ResolvedImage::from_bytes(bytes, locator) {
                    Ok(resolved) => return Ok(resolved),
                    Err(e) => debug!("Fetched payload rejected, trying canvas fallback: {}", e),
                }
            }
            Err(e) => debug!("Direct fetch failed, trying canvas fallback: {}", e),
        }

        // 3) Canvas round-trip
        let canvas = self.rasterizer.rasterize(locator).await?;
        let resolved = ResolvedImage::from_canvas(&canvas).map_err(|e| AssetError::DecodeFailed {
            locator: locator.to_string(),
            detail: e.to_string(),
        })?;
        debug!(
            "Canvas fallback produced {}x{} PNG for {}",
            resolved.width,
            resolved.height,
            short(locator)
        );
        Ok(resolved)
    }
}

/// Locator shortened for logs; data URIs can be megabytes long.
pub(crate) fn short(locator: &str) -> &str {
    match locator.char_indices().nth(80) {
        Some((idx, _)) => &locator[..idx],
        None => locator,
    }
}
