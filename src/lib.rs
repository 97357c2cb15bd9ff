//! # ebook-export
//!
//! Export a book written in a rich-text editor to PDF or DOCX.
//!
//! ## Why this crate?
//!
//! Editor output is loose HTML: inline styles, nested lists, images that
//! live on other people's servers, and a cover designed on a canvas. Feeding
//! that to a browser print engine gives inconsistent results and no control
//! over failures. Instead this crate flattens the HTML into a small element
//! model and lays it out itself, so a dead image link costs one picture, not
//! the whole book.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Ebook (chapters)
//!  │
//!  ├─ 1. Combine  order chapters, prefix each with a title heading
//!  ├─ 2. Parse    HTML → flat ParsedElement list
//!  ├─ 3. Cover    snapshot of the designed cover, or a synthesized one
//!  ├─ 4. Images   resolve locators through a fallback chain
//!  ├─ 5. Render   lay out and serialize PDF (lopdf) or DOCX (zip + quick-xml)
//!  └─ 6. Output   bytes + sanitized filename + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ebook_export::{export_book, Chapter, Ebook, ExportConfig, ExportFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let book = Ebook {
//!         title: "The Long Road".into(),
//!         author: Some("A. Writer".into()),
//!         chapters: vec![Chapter::new("Beginnings", "<p>It was raining.</p>", 0)],
//!         ..Default::default()
//!     };
//!     let config = ExportConfig::default();
//!     let output = export_book(&book, ExportFormat::Pdf, None, &config).await?;
//!     std::fs::write(&output.filename, &output.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ebook-export` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ebook-export = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod element;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, ExportFormat};
pub use element::{Alignment, ElementKind, ImageRef, ParsedElement, Run};
pub use error::{AssetError, ExportError};
pub use export::{
    book_options, combine_chapters, export, export_book, export_book_with_resolver, export_sync,
    export_to_file, export_with_resolver, load_manifest, output_filename, sanitize_title,
    write_output,
};
pub use model::{Chapter, CoverKind, Ebook, ExportOptions, ExportOutput, ExportStats};
pub use pipeline::cover::{CoverSurface, ImageFileSurface};
pub use pipeline::image::{ImageResolver, ImageSource, Rasterizer, ResolvedImage};
pub use pipeline::parse::parse;
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
