//! Input and output value types for an export call.
//!
//! [`Ebook`] and [`Chapter`] mirror the records the editing application
//! stores; they deserialize straight from its JSON. [`ExportOptions`] is the
//! per-call value object handed to a renderer, and [`ExportOutput`] is what
//! comes back.

use crate::config::ExportFormat;
use crate::pipeline::cover::CoverSurface;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One chapter of rich-text content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ebook_id: Option<String>,
    pub title: String,
    /// Editor HTML. Never modified by the export.
    #[serde(default)]
    pub content: String,
    /// Sort key. Gaps and duplicates are fine; ties keep input order.
    #[serde(alias = "chapter_order", default)]
    pub order: i64,
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>, order: i64) -> Self {
        Self {
            id: String::new(),
            ebook_id: None,
            title: title.into(),
            content: content.into(),
            order,
        }
    }
}

/// Book metadata plus its chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ebook {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// URL, local path or `data:` URI of the cover artwork.
    #[serde(default, alias = "coverImage")]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// Everything a renderer needs for one export.
#[derive(Clone)]
pub struct ExportOptions {
    pub title: String,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub cover_image: Option<String>,
    /// Synthesize a cover when no snapshot is available. Default: true.
    pub has_cover_page: bool,
    /// Combined chapter HTML.
    pub content: String,
    /// Externally rendered cover to snapshot, if any.
    pub cover_surface: Option<Arc<dyn CoverSurface>>,
}

impl ExportOptions {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
            genre: None,
            cover_image: None,
            has_cover_page: true,
            content: content.into(),
            cover_surface: None,
        }
    }

    /// Options for `book` with `content` already combined from its chapters.
    pub fn for_book(book: &Ebook, content: String) -> Self {
        Self {
            title: book.title.clone(),
            author: non_blank(&book.author),
            genre: non_blank(&book.genre),
            cover_image: non_blank(&book.cover_image),
            has_cover_page: true,
            content,
            cover_surface: None,
        }
    }
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl fmt::Debug for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOptions")
            .field("title", &self.title)
            .field("author", &self.author)
            .field("genre", &self.genre)
            .field("cover_image", &self.cover_image)
            .field("has_cover_page", &self.has_cover_page)
            .field("content_len", &self.content.len())
            .field(
                "cover_surface",
                &self.cover_surface.as_ref().map(|_| "<dyn CoverSurface>"),
            )
            .finish()
    }
}

/// What occupies the first page of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverKind {
    /// Raster snapshot of the designed cover.
    Snapshot,
    /// Cover composed from title, genre, author and artwork.
    Synthesized,
    /// Plain title/author page; no cover was requested.
    TitlePage,
}

/// Per-export statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportStats {
    pub format: ExportFormat,
    /// Parsed content elements.
    pub elements: usize,
    pub images_embedded: usize,
    pub images_skipped: usize,
    /// Page count; only known for PDF.
    pub pages: Option<usize>,
    pub cover: CoverKind,
    pub duration_ms: u64,
}

/// A finished document.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    /// Sanitized title plus extension.
    pub filename: String,
    pub format: ExportFormat,
    pub stats: ExportStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_accepts_chapter_order_alias() {
        let json = r#"{"id":"c1","ebook_id":"b1","title":"One","content":"<p>x</p>","chapter_order":3}"#;
        let ch: Chapter = serde_json::from_str(json).unwrap();
        assert_eq!(ch.order, 3);
        assert_eq!(ch.ebook_id.as_deref(), Some("b1"));
    }

    #[test]
    fn ebook_manifest_minimal() {
        let json = r#"{"title":"Book","chapters":[{"title":"A","order":0}]}"#;
        let book: Ebook = serde_json::from_str(json).unwrap();
        assert_eq!(book.title, "Book");
        assert!(book.author.is_none());
        assert_eq!(book.chapters.len(), 1);
        assert_eq!(book.chapters[0].content, "");
    }

    #[test]
    fn options_drop_blank_metadata() {
        let book = Ebook {
            title: "T".into(),
            author: Some("  ".into()),
            genre: Some("Fantasy".into()),
            cover_image: Some(String::new()),
            chapters: vec![],
        };
        let opts = ExportOptions::for_book(&book, "<p>x</p>".into());
        assert!(opts.author.is_none());
        assert_eq!(opts.genre.as_deref(), Some("Fantasy"));
        assert!(opts.cover_image.is_none());
        assert!(opts.has_cover_page);
    }

    #[test]
    fn stats_serialize_cover_kind() {
        let stats = ExportStats {
            format: ExportFormat::Docx,
            elements: 4,
            images_embedded: 1,
            images_skipped: 0,
            pages: None,
            cover: CoverKind::Synthesized,
            duration_ms: 12,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"synthesized\""));
        assert!(json.contains("\"docx\""));
    }
}
