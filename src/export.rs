//! Export entry points.
//!
//! The chain is always the same: order the chapters and combine them into
//! one HTML document, hand that to the renderer for the requested format,
//! then name the result after the book. [`export`] works on prepared
//! [`ExportOptions`]; [`export_book`] and [`export_to_file`] start from an
//! [`Ebook`] record.

use crate::config::{ExportConfig, ExportFormat};
use crate::error::ExportError;
use crate::model::{Chapter, Ebook, ExportOptions, ExportOutput, ExportStats};
use crate::pipeline::cover::CoverSurface;
use crate::pipeline::docx::render_docx;
use crate::pipeline::image::ImageResolver;
use crate::pipeline::pdf::render_pdf;
use crate::pipeline::RenderedDocument;
use quick_xml::escape::escape;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Characters that are illegal in file names on at least one platform.
const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Combine chapters into one HTML document, ordered by `order`.
///
/// Each chapter is introduced by a centered `<h1>` with its title. Every
/// heading after the first asks for a page break, so chapters start on a
/// new page in both output formats. Ties keep their input order.
pub fn combine_chapters(chapters: &[Chapter]) -> String {
    let mut ordered: Vec<&Chapter> = chapters.iter().collect();
    ordered.sort_by_key(|c| c.order);

    ordered
        .iter()
        .enumerate()
        .map(|(i, chapter)| {
            let page_break = if i == 0 { "auto" } else { "always" };
            format!(
                "<h1 style=\"text-align: center; page-break-before: {page_break}; margin-top: 2em;\">{}</h1>\n{}",
                escape(chapter.title.as_str()),
                chapter.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Strip characters that are unsafe in file names, collapse whitespace and
/// fall back to `ebook` when nothing is left.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "ebook".to_string()
    } else {
        collapsed
    }
}

pub fn output_filename(title: &str, format: ExportFormat) -> String {
    format!("{}.{}", sanitize_title(title), format.extension())
}

/// Render `options` in `format` with the default network-backed resolver.
///
/// # Errors
/// Returns `Err` only when the document could not be produced at all.
/// Unreachable images and failed cover captures are skipped and reported
/// through the progress callback and [`ExportStats`].
pub async fn export(
    format: ExportFormat,
    options: &ExportOptions,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    let resolver = ImageResolver::from_config(config)?;
    export_with_resolver(format, options, &resolver, config).await
}

/// Like [`export`], with a caller-supplied [`ImageResolver`].
pub async fn export_with_resolver(
    format: ExportFormat,
    options: &ExportOptions,
    resolver: &ImageResolver,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    let start = Instant::now();
    info!("Starting {} export: {:?}", format, options.title);

    let rendered: RenderedDocument = match format {
        ExportFormat::Pdf => render_pdf(options, resolver, config).await?,
        ExportFormat::Docx => render_docx(options, resolver, config).await?,
    };

    let stats = ExportStats {
        format,
        elements: rendered.elements,
        images_embedded: rendered.images_embedded,
        images_skipped: rendered.images_skipped,
        pages: rendered.pages,
        cover: rendered.cover,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "{} export complete: {} bytes, {} elements, {} images ({} skipped), {}ms",
        format,
        rendered.bytes.len(),
        stats.elements,
        stats.images_embedded,
        stats.images_skipped,
        stats.duration_ms
    );
    config.progress().on_export_complete(&stats);

    Ok(ExportOutput {
        bytes: rendered.bytes,
        filename: output_filename(&options.title, format),
        format,
        stats,
    })
}

/// Export a whole book.
///
/// A book without chapters is rejected before any rendering work starts.
pub async fn export_book(
    book: &Ebook,
    format: ExportFormat,
    cover_surface: Option<Arc<dyn CoverSurface>>,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    let options = book_options(book, cover_surface)?;
    export(format, &options, config).await
}

/// [`export_book`] with a caller-supplied [`ImageResolver`].
pub async fn export_book_with_resolver(
    book: &Ebook,
    format: ExportFormat,
    cover_surface: Option<Arc<dyn CoverSurface>>,
    resolver: &ImageResolver,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    let options = book_options(book, cover_surface)?;
    export_with_resolver(format, &options, resolver, config).await
}

/// Combine a book's chapters into the options both renderers consume.
///
/// Fails with [`ExportError::NoContent`] for a book without chapters. The
/// returned options can be adjusted (for instance `has_cover_page`) before
/// handing them to [`export`].
pub fn book_options(
    book: &Ebook,
    cover_surface: Option<Arc<dyn CoverSurface>>,
) -> Result<ExportOptions, ExportError> {
    if book.chapters.is_empty() {
        return Err(ExportError::NoContent);
    }
    debug!("Combining {} chapters", book.chapters.len());
    let mut options = ExportOptions::for_book(book, combine_chapters(&book.chapters));
    options.cover_surface = cover_surface;
    Ok(options)
}

/// Export a book and write it to `output_dir/<sanitized title>.<ext>`.
///
/// Uses an atomic write (temp file in the same directory, then rename) so a
/// failed export never leaves a partial document behind.
pub async fn export_to_file(
    book: &Ebook,
    format: ExportFormat,
    cover_surface: Option<Arc<dyn CoverSurface>>,
    output_dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<(PathBuf, ExportStats), ExportError> {
    let output = export_book(book, format, cover_surface, config).await?;
    let path = write_output(&output, output_dir.as_ref()).await?;
    Ok((path, output.stats))
}

/// Atomically write `output` into `dir`, returning the final path.
pub async fn write_output(output: &ExportOutput, dir: &Path) -> Result<PathBuf, ExportError> {
    let path = dir.join(&output.filename);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ExportError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    let bytes = output.bytes.clone();
    let dir = dir.to_path_buf();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ExportError> {
        let fail = |source: std::io::Error| ExportError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(fail)?;
        tmp.write_all(&bytes).map_err(fail)?;
        tmp.flush().map_err(fail)?;
        // On error the temp file is dropped and deleted.
        tmp.persist(&target).map_err(|e| fail(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| ExportError::Internal(format!("write task panicked: {e}")))??;

    info!("Wrote {}", path.display());
    Ok(path)
}

/// Synchronous wrapper around [`export_book`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync(
    book: &Ebook,
    format: ExportFormat,
    cover_surface: Option<Arc<dyn CoverSurface>>,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_book(book, format, cover_surface, config))
}

/// Read an [`Ebook`] manifest from a JSON file.
pub async fn load_manifest(path: impl AsRef<Path>) -> Result<Ebook, ExportError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExportError::ManifestNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ExportError::InvalidManifest {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }
        }
    })?;
    serde_json::from_str(&raw).map_err(|e| ExportError::InvalidManifest {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_orders_by_order_field() {
        let chapters = vec![
            Chapter::new("Two", "<p>c2</p>", 2),
            Chapter::new("Zero", "<p>c0</p>", 0),
            Chapter::new("One", "<p>c1</p>", 1),
        ];
        let html = combine_chapters(&chapters);
        let zero = html.find("Zero").unwrap();
        let one = html.find("One").unwrap();
        let two = html.find("Two").unwrap();
        assert!(zero < one && one < two);
    }

    #[test]
    fn combine_page_breaks_after_first() {
        let chapters = vec![
            Chapter::new("A", "<p>a</p>", 0),
            Chapter::new("B", "<p>b</p>", 1),
            Chapter::new("C", "<p>c</p>", 2),
        ];
        let html = combine_chapters(&chapters);
        assert_eq!(html.matches("page-break-before: auto").count(), 1);
        assert_eq!(html.matches("page-break-before: always").count(), 2);
        assert!(html.starts_with(
            "<h1 style=\"text-align: center; page-break-before: auto; margin-top: 2em;\">A</h1>\n<p>a</p>"
        ));
        assert!(html.contains("</p>\n\n<h1"));
    }

    #[test]
    fn combine_keeps_input_order_for_ties() {
        let chapters = vec![
            Chapter::new("First", "", 1),
            Chapter::new("Second", "", 1),
        ];
        let html = combine_chapters(&chapters);
        assert!(html.find("First").unwrap() < html.find("Second").unwrap());
    }

    #[test]
    fn combine_escapes_titles() {
        let html = combine_chapters(&[Chapter::new("Q&A <live>", "", 0)]);
        assert!(html.contains(">Q&amp;A &lt;live&gt;</h1>"));
    }

    #[test]
    fn sanitize_strips_forbidden_chars() {
        assert_eq!(sanitize_title("My/Book:\"Title\""), "MyBookTitle");
        assert_eq!(sanitize_title("  a   b  "), "a b");
        assert_eq!(sanitize_title("<>?*"), "ebook");
        assert_eq!(sanitize_title(""), "ebook");
    }

    #[test]
    fn output_filename_appends_extension() {
        assert_eq!(output_filename("My/Book:\"Title\"", ExportFormat::Pdf), "MyBookTitle.pdf");
        assert_eq!(output_filename("Notes", ExportFormat::Docx), "Notes.docx");
    }

    #[tokio::test]
    async fn manifest_errors_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_manifest(&missing).await,
            Err(ExportError::ManifestNotFound { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            load_manifest(&bad).await,
            Err(ExportError::InvalidManifest { .. })
        ));

        let good = dir.path().join("book.json");
        std::fs::write(&good, r#"{"title":"T","chapters":[{"title":"A","content":"<p>x</p>","order":0}]}"#).unwrap();
        let book = load_manifest(&good).await.unwrap();
        assert_eq!(book.chapters.len(), 1);
    }
}
