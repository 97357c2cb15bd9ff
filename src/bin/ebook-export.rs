//! CLI binary for ebook-export.
//!
//! A thin shim over the library crate that reads a book manifest, maps CLI
//! flags to `ExportConfig` and writes the finished document.

use anyhow::{Context, Result};
use clap::Parser;
use ebook_export::{
    book_options, export, load_manifest, write_output, CoverSurface, ExportConfig, ExportFormat,
    ExportProgressCallback, ExportStats, ImageFileSurface, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar over parsed elements plus one log
/// line per skipped image.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_export_start` sets the length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading chapters…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} elements  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, format: ExportFormat, total_elements: usize) {
        self.activate_bar(total_elements);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_elements} elements as {format}…"))
        ));
    }

    fn on_element_complete(&self, index: usize, _total: usize) {
        self.bar.set_position(index as u64);
    }

    fn on_image_skipped(&self, locator: &str, error: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let shown = truncate(locator, 60);
        self.bar.println(format!(
            "  {} image {}  {}",
            red("✗"),
            shown,
            dim(&truncate(error, 80))
        ));
    }

    fn on_export_complete(&self, stats: &ExportStats) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        if skipped == 0 {
            eprintln!(
                "{} {} elements rendered",
                green("✔"),
                bold(&stats.elements.to_string())
            );
        } else {
            eprintln!(
                "{} {} elements rendered  ({} images skipped)",
                cyan("⚠"),
                bold(&stats.elements.to_string()),
                red(&skipped.to_string()),
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # PDF into the current directory
  ebook-export book.json

  # DOCX into a folder
  ebook-export book.json --format docx -o exports/

  # Use a pre-rendered cover design as the first page
  ebook-export book.json --cover-snapshot cover.png

  # Plain title page instead of a synthesized cover
  ebook-export book.json --no-cover

  # Machine-readable stats
  ebook-export book.json --json

MANIFEST FORMAT:
  {
    "title": "The Long Road",
    "author": "A. Writer",
    "genre": "Fantasy",
    "cover_image": "https://example.com/art.jpg",
    "chapters": [
      { "title": "Beginnings", "content": "<p>…</p>", "order": 0 }
    ]
  }

ENVIRONMENT VARIABLES:
  EBOOK_EXPORT_FORMAT          Default output format (pdf, docx)
  EBOOK_EXPORT_OUTPUT_DIR      Default output directory
  EBOOK_EXPORT_IMAGE_TIMEOUT   Per-image deadline in seconds
  EBOOK_EXPORT_USER_AGENT      User-Agent for image requests
  EBOOK_EXPORT_IMAGE_ROOT      Directory local image paths may be read from
  RUST_LOG                     Override log filter (e.g. ebook_export=debug)
"#;

/// Export an ebook manifest to PDF or DOCX.
#[derive(Parser, Debug)]
#[command(
    name = "ebook-export",
    version,
    about = "Export an ebook manifest to PDF or DOCX",
    long_about = "Export a book (JSON manifest of chapters with editor HTML) to a paginated PDF \
or a Word document. Remote images are fetched with a fallback chain; images that cannot be \
retrieved are skipped rather than failing the export.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the book manifest (JSON).
    manifest: PathBuf,

    /// Output format.
    #[arg(short, long, env = "EBOOK_EXPORT_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Directory the document is written to; the file name comes from the title.
    #[arg(short, long, env = "EBOOK_EXPORT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Raster image of the designed cover, used as a full-page snapshot.
    #[arg(long, env = "EBOOK_EXPORT_COVER_SNAPSHOT")]
    cover_snapshot: Option<PathBuf>,

    /// Skip the synthesized cover and start with a plain title page.
    #[arg(long, conflicts_with = "cover_snapshot")]
    no_cover: bool,

    /// Deadline for resolving one image, in seconds.
    #[arg(long, env = "EBOOK_EXPORT_IMAGE_TIMEOUT", default_value_t = 10)]
    image_timeout: u64,

    /// How long the cover capture waits for each cover image, in seconds.
    #[arg(long, env = "EBOOK_EXPORT_COVER_WAIT", default_value_t = 3)]
    cover_wait: u64,

    /// Pixel-density multiplier for the cover snapshot (1.0–4.0).
    #[arg(long, env = "EBOOK_EXPORT_SNAPSHOT_SCALE", default_value_t = 2.0)]
    snapshot_scale: f32,

    /// Maximum image width in DOCX output, in pixels.
    #[arg(long, env = "EBOOK_EXPORT_DOCX_IMAGE_WIDTH", default_value_t = 480)]
    docx_image_width: u32,

    /// Text placed before the author name on covers.
    #[arg(long, env = "EBOOK_EXPORT_AUTHOR_PREFIX", default_value = "by ")]
    author_prefix: String,

    /// User-Agent header for image requests.
    #[arg(long, env = "EBOOK_EXPORT_USER_AGENT")]
    user_agent: Option<String>,

    /// Allow local image paths, but only inside this directory.
    #[arg(long, env = "EBOOK_EXPORT_IMAGE_ROOT")]
    image_root: Option<PathBuf>,

    /// Print export stats as JSON on stdout.
    #[arg(long, env = "EBOOK_EXPORT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "EBOOK_EXPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EBOOK_EXPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EBOOK_EXPORT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormatArg {
    Pdf,
    Docx,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Docx => ExportFormat::Docx,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load inputs ──────────────────────────────────────────────────────
    let book = load_manifest(&cli.manifest)
        .await
        .context("Failed to load book manifest")?;

    let cover_surface: Option<Arc<dyn CoverSurface>> = match cli.cover_snapshot {
        Some(ref path) => {
            let surface = ImageFileSurface::open(path)
                .await
                .with_context(|| format!("Failed to open cover snapshot {:?}", path))?;
            Some(Arc::new(surface))
        }
        None => None,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let format: ExportFormat = cli.format.clone().into();

    // ── Run export ───────────────────────────────────────────────────────
    let mut options = book_options(&book, cover_surface).context("Export failed")?;
    options.has_cover_page = !cli.no_cover;
    let output = export(format, &options, &config)
        .await
        .context("Export failed")?;
    let path = write_output(&output, &cli.output_dir)
        .await
        .context("Export failed")?;
    let stats = output.stats;

    if cli.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?;
        println!("{json}");
    } else if !cli.quiet {
        let pages = stats
            .pages
            .map(|p| format!("{p} pages  "))
            .unwrap_or_default();
        eprintln!(
            "{}  {}{} images  {}ms  →  {}",
            if stats.images_skipped == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            pages,
            stats.images_embedded,
            stats.duration_ms,
            bold(&path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .image_timeout_secs(cli.image_timeout)
        .cover_image_wait_secs(cli.cover_wait)
        .snapshot_scale(cli.snapshot_scale)
        .docx_max_image_width_px(cli.docx_image_width)
        .author_prefix(cli.author_prefix.clone());

    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(ref root) = cli.image_root {
        builder = builder.local_image_root(root.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd\u{2026}");
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["ebook-export", "book.json"]);
        assert!(matches!(cli.format, FormatArg::Pdf));
        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert_eq!(cli.author_prefix, "by ");
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.docx_max_image_width_px, 480);
        assert!(config.local_image_root.is_none());
    }

    #[test]
    fn image_root_flag_enables_local_images() {
        let cli = Cli::parse_from(["ebook-export", "book.json", "--image-root", "art"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.local_image_root, Some(PathBuf::from("art")));
    }

    #[test]
    fn no_cover_conflicts_with_snapshot() {
        let res = Cli::try_parse_from([
            "ebook-export",
            "book.json",
            "--no-cover",
            "--cover-snapshot",
            "c.png",
        ]);
        assert!(res.is_err());
    }
}
