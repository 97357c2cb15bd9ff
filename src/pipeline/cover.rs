//! Cover acquisition: snapshot a designed cover, or synthesize one.
//!
//! The editing application lets authors design a cover page visually. When
//! the host hands us that rendered cover as a [`CoverSurface`], the export
//! uses a raster snapshot of it so the first page looks exactly like the
//! design. When there is no surface, or capturing it fails, a cover is
//! composed from metadata instead: genre, title, author and the cover
//! artwork, laid out by each renderer in its own way.
//!
//! ```text
//! surface? ──yes──▶ wait for images ──▶ rasterize ──ok──▶ Snapshot
//!    │                                      │ err / zero area
//!    no ◀───────────────────────────────────┘
//!    ▼
//! has_cover_page && title? ──yes──▶ Synthesized (artwork optional)
//!    │ no
//!    ▼
//!  None (renderers emit a plain title page)
//! ```

use crate::config::ExportConfig;
use crate::error::AssetError;
use crate::model::ExportOptions;
use crate::pipeline::image::{encode_jpeg, flatten_on_white, ImageResolver, ResolvedImage};
use crate::pipeline::parse::collapse_whitespace;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Logical page size of a cover surface in CSS pixels: 8.5in × 11in at 96 dpi.
pub const COVER_PAGE_PX: (u32, u32) = (816, 1056);

// ── Surface ──────────────────────────────────────────────────────────────

/// A rendered cover page that can be rasterized on demand.
///
/// Hosts implement this over whatever draws their cover (an offscreen web
/// view, a canvas, a pre-rendered file). Images inside the surface may still
/// be loading; the acquirer waits for each one with a bounded deadline
/// before capturing.
#[async_trait]
pub trait CoverSurface: Send + Sync {
    /// Current on-screen size. `(0, 0)` means nothing was rendered.
    fn rendered_size(&self) -> (u32, u32);

    /// Number of images embedded in the surface.
    fn image_count(&self) -> usize {
        0
    }

    /// Resolve once image `index` has finished loading (or failed to).
    async fn wait_for_image(&self, index: usize) -> Result<(), AssetError> {
        let _ = index;
        Ok(())
    }

    /// Draw the surface into a bitmap of exactly `width` × `height` pixels.
    async fn rasterize(&self, width: u32, height: u32) -> Result<DynamicImage, AssetError>;
}

/// A cover that was already rendered to an image file or buffer.
pub struct ImageFileSurface {
    image: DynamicImage,
}

impl ImageFileSurface {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let image = image::load_from_memory(bytes).map_err(|e| AssetError::CaptureFailed {
            detail: e.to_string(),
        })?;
        Ok(Self::new(image))
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AssetError::CaptureFailed {
                detail: format!("{}: {e}", path.display()),
            })?;
        Self::from_bytes(&bytes)
    }
}

#[async_trait]
impl CoverSurface for ImageFileSurface {
    fn rendered_size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    async fn rasterize(&self, width: u32, height: u32) -> Result<DynamicImage, AssetError> {
        let image = self.image.clone();
        tokio::task::spawn_blocking(move || image.resize_exact(width, height, FilterType::Triangle))
            .await
            .map_err(|e| AssetError::CaptureFailed {
                detail: format!("resize task panicked: {e}"),
            })
    }
}

// ── Artifacts ────────────────────────────────────────────────────────────

/// Full-page raster of the designed cover, already flattened onto white.
#[derive(Debug, Clone)]
pub struct CoverSnapshot {
    pub pixels: RgbImage,
}

impl CoverSnapshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        encode_jpeg(&self.pixels, quality)
    }
}

/// Metadata for a cover composed by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedCover {
    pub title: String,
    pub genre: Option<String>,
    pub author: Option<String>,
    pub image: Option<ResolvedImage>,
}

#[derive(Debug, Clone)]
pub enum CoverArtifact {
    Snapshot(CoverSnapshot),
    Synthesized(SynthesizedCover),
}

// ── Acquisition ──────────────────────────────────────────────────────────

/// Decide what goes on the first page.
///
/// Never fails: capture problems degrade to synthesis, and a cover that
/// cannot be synthesized degrades to `None`.
pub async fn acquire_cover(
    options: &ExportOptions,
    resolver: &ImageResolver,
    config: &ExportConfig,
) -> Option<CoverArtifact> {
    if let Some(surface) = &options.cover_surface {
        match capture_snapshot(surface.as_ref(), config).await {
            Ok(snapshot) => {
                info!(
                    "Captured cover snapshot {}x{}",
                    snapshot.width(),
                    snapshot.height()
                );
                return Some(CoverArtifact::Snapshot(snapshot));
            }
            Err(e) => warn!("Cover snapshot failed, composing from metadata: {}", e),
        }
    }

    if !options.has_cover_page {
        return None;
    }
    synthesize(options, resolver).await.map(CoverArtifact::Synthesized)
}

/// Wait for the surface's images, then rasterize it at `snapshot_scale`.
pub async fn capture_snapshot(
    surface: &dyn CoverSurface,
    config: &ExportConfig,
) -> Result<CoverSnapshot, AssetError> {
    let (width, height) = surface.rendered_size();
    if width == 0 || height == 0 {
        return Err(AssetError::EmptyCapture { width, height });
    }

    let wait = config.cover_image_wait();
    for index in 0..surface.image_count() {
        match tokio::time::timeout(wait, surface.wait_for_image(index)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Cover image {} failed to load: {}", index, e),
            Err(_) => debug!("Cover image {} still loading after {:?}", index, wait),
        }
    }

    let scale = config.snapshot_scale();
    let target_w = (COVER_PAGE_PX.0 as f32 * scale).round() as u32;
    let target_h = (COVER_PAGE_PX.1 as f32 * scale).round() as u32;
    let raster = surface.rasterize(target_w, target_h).await?;
    if raster.width() == 0 || raster.height() == 0 {
        return Err(AssetError::EmptyCapture {
            width: raster.width(),
            height: raster.height(),
        });
    }

    let pixels = tokio::task::spawn_blocking(move || flatten_on_white(&raster))
        .await
        .map_err(|e| AssetError::CaptureFailed {
            detail: format!("flatten task panicked: {e}"),
        })?;
    Ok(CoverSnapshot { pixels })
}

async fn synthesize(options: &ExportOptions, resolver: &ImageResolver) -> Option<SynthesizedCover> {
    let title = collapse_whitespace(&options.title);
    if title.is_empty() {
        warn!("Cover requested but the book has no title; skipping cover");
        return None;
    }

    let image = match options.cover_image.as_deref() {
        Some(locator) if !locator.trim().is_empty() => match resolver.resolve(locator).await {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("Cover artwork unavailable, continuing without it: {}", e);
                None
            }
        },
        _ => None,
    };

    Some(SynthesizedCover {
        title,
        genre: clean(options.genre.as_deref()),
        author: clean(options.author.as_deref()),
        image,
    })
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(collapse_whitespace)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::image::tests::{data_uri, png_bytes};
    use crate::pipeline::image::{ImageSource, Rasterizer};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct NoNetwork;

    #[async_trait]
    impl ImageSource for NoNetwork {
        async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AssetError> {
            Err(AssetError::FetchFailed {
                locator: locator.to_string(),
                reason: "offline".into(),
            })
        }
    }

    #[async_trait]
    impl Rasterizer for NoNetwork {
        async fn rasterize(&self, locator: &str) -> Result<DynamicImage, AssetError> {
            Err(AssetError::DecodeFailed {
                locator: locator.to_string(),
                detail: "offline".into(),
            })
        }
    }

    fn resolver() -> ImageResolver {
        ImageResolver::new(Arc::new(NoNetwork), Arc::new(NoNetwork), Duration::from_secs(1))
    }

    struct BlankSurface;

    #[async_trait]
    impl CoverSurface for BlankSurface {
        fn rendered_size(&self) -> (u32, u32) {
            (0, 0)
        }

        async fn rasterize(&self, _w: u32, _h: u32) -> Result<DynamicImage, AssetError> {
            panic!("never rasterized");
        }
    }

    struct BrokenSurface;

    #[async_trait]
    impl CoverSurface for BrokenSurface {
        fn rendered_size(&self) -> (u32, u32) {
            (816, 1056)
        }

        async fn rasterize(&self, _w: u32, _h: u32) -> Result<DynamicImage, AssetError> {
            Err(AssetError::CaptureFailed {
                detail: "tainted canvas".into(),
            })
        }
    }

    /// Surface whose images never finish loading.
    struct StalledSurface {
        waits: AtomicUsize,
    }

    #[async_trait]
    impl CoverSurface for StalledSurface {
        fn rendered_size(&self) -> (u32, u32) {
            (400, 500)
        }

        fn image_count(&self) -> usize {
            2
        }

        async fn wait_for_image(&self, _index: usize) -> Result<(), AssetError> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn rasterize(&self, w: u32, h: u32) -> Result<DynamicImage, AssetError> {
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                w,
                h,
                Rgba([0, 0, 0, 0]),
            )))
        }
    }

    /// Records the raster size it was asked for and returns a tiny image.
    #[derive(Default)]
    struct RecordingSurface {
        requested: std::sync::Mutex<Option<(u32, u32)>>,
    }

    #[async_trait]
    impl CoverSurface for RecordingSurface {
        fn rendered_size(&self) -> (u32, u32) {
            (816, 1056)
        }

        async fn rasterize(&self, w: u32, h: u32) -> Result<DynamicImage, AssetError> {
            *self.requested.lock().unwrap() = Some((w, h));
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                4,
                4,
                Rgba([9, 9, 9, 255]),
            )))
        }
    }

    fn options() -> ExportOptions {
        let mut o = ExportOptions::new("  The   Long Night ", "<p>x</p>");
        o.genre = Some("Fantasy".into());
        o.author = Some("Ana Lima".into());
        o
    }

    #[tokio::test]
    async fn snapshot_from_image_file_surface() {
        let surface = ImageFileSurface::from_bytes(&png_bytes(100, 130)).unwrap();
        let mut opts = options();
        opts.cover_surface = Some(Arc::new(surface));

        let config = ExportConfig::default();
        match acquire_cover(&opts, &resolver(), &config).await {
            Some(CoverArtifact::Snapshot(snap)) => {
                assert_eq!((snap.width(), snap.height()), (1632, 2112));
                assert!(!snap.to_png().unwrap().is_empty());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_area_surface_falls_back_to_synthesis() {
        let mut opts = options();
        opts.cover_surface = Some(Arc::new(BlankSurface));
        let cover = acquire_cover(&opts, &resolver(), &ExportConfig::default()).await;
        match cover {
            Some(CoverArtifact::Synthesized(c)) => {
                assert_eq!(c.title, "The Long Night");
                assert_eq!(c.genre.as_deref(), Some("Fantasy"));
                assert_eq!(c.author.as_deref(), Some("Ana Lima"));
                assert!(c.image.is_none());
            }
            other => panic!("expected synthesized cover, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn capture_error_falls_back_to_synthesis() {
        let mut opts = options();
        opts.cover_surface = Some(Arc::new(BrokenSurface));
        let cover = acquire_cover(&opts, &resolver(), &ExportConfig::default()).await;
        assert!(matches!(cover, Some(CoverArtifact::Synthesized(_))));
    }

    #[tokio::test]
    async fn stalled_images_do_not_block_capture() {
        let surface = Arc::new(StalledSurface {
            waits: AtomicUsize::new(0),
        });
        let config = ExportConfig::builder()
            .cover_image_wait_secs(0)
            .snapshot_scale(1.0)
            .build()
            .unwrap();
        let snap = capture_snapshot(surface.as_ref(), &config).await.unwrap();
        assert_eq!(surface.waits.load(Ordering::SeqCst), 2);
        assert_eq!((snap.width(), snap.height()), (816, 1056));
        // transparent capture lands on white
        assert_eq!(snap.pixels.get_pixel(10, 10).0, [255, 255, 255]);
    }

    #[tokio::test]
    async fn hand_built_config_cannot_oversize_snapshot() {
        let surface = RecordingSurface::default();
        let mut config = ExportConfig::default();
        config.snapshot_scale = 100.0;
        config.cover_image_wait_secs = 0;
        capture_snapshot(&surface, &config).await.unwrap();
        assert_eq!(*surface.requested.lock().unwrap(), Some((3264, 4224)));
    }

    #[tokio::test]
    async fn synthesized_cover_embeds_resolved_artwork() {
        let mut opts = options();
        opts.cover_image = Some(data_uri(&png_bytes(60, 90), "image/png"));
        match acquire_cover(&opts, &resolver(), &ExportConfig::default()).await {
            Some(CoverArtifact::Synthesized(c)) => {
                let img = c.image.expect("artwork resolved");
                assert_eq!((img.width, img.height), (60, 90));
            }
            other => panic!("expected synthesized cover, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_artwork_keeps_cover() {
        let mut opts = options();
        opts.cover_image = Some("https://offline.example/cover.jpg".into());
        match acquire_cover(&opts, &resolver(), &ExportConfig::default()).await {
            Some(CoverArtifact::Synthesized(c)) => assert!(c.image.is_none()),
            other => panic!("expected synthesized cover, got {other:?}"),
        }
    }

    #[test]
    fn no_cover_page_and_no_surface_yields_none() {
        let mut opts = options();
        opts.has_cover_page = false;
        let cover = tokio_test::block_on(acquire_cover(&opts, &resolver(), &ExportConfig::default()));
        assert!(cover.is_none());
    }

    #[test]
    fn blank_title_yields_none() {
        let opts = ExportOptions::new("   ", "<p>x</p>");
        let cover = tokio_test::block_on(acquire_cover(&opts, &resolver(), &ExportConfig::default()));
        assert!(cover.is_none());
    }

    #[tokio::test]
    async fn open_reports_missing_file() {
        let err = ImageFileSurface::open("/nonexistent/cover.png").await.err().unwrap();
        assert!(matches!(err, AssetError::CaptureFailed { .. }));
    }
}
