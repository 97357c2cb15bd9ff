//! Paginated PDF output.
//!
//! Rendering happens in two passes:
//!
//! 1. **Layout** (async): walk the parsed elements with a running vertical
//!    cursor, resolving images as they come up, and record what to draw on
//!    each page as [`DrawOp`]s in top-down coordinates.
//! 2. **Serialization** (`spawn_blocking`): turn the pages into a `lopdf`
//!    object graph, compress it and write it out.
//!
//! ## Why not draw straight into the document?
//!
//! Image resolution awaits the network; the `lopdf` document does not need
//! to live across those awaits, and keeping layout as plain data makes page
//! breaking testable without parsing PDF content streams.
//!
//! Text uses the four standard Helvetica faces with WinAnsiEncoding. A
//! paragraph is drawn in a single face: bold or italic only when every run
//! carries the flag, so mixed inline styling flattens to regular.

use crate::config::{ExportConfig, ExportFormat};
use crate::element::{Alignment, ElementKind, ListCounter, ParsedElement};
use crate::error::{AssetError, ExportError};
use crate::model::{CoverKind, ExportOptions};
use crate::pipeline::cover::{acquire_cover, CoverArtifact, CoverSnapshot, SynthesizedCover};
use crate::pipeline::image::{encode_jpeg, flatten_on_white, short, ImageResolver, ResolvedImage};
use crate::pipeline::parse::parse;
use crate::pipeline::text::{encode_win_ansi, text_width, wrap_text, PdfFont};
use crate::pipeline::RenderedDocument;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use tracing::{debug, info, warn};

// ── Page geometry (points) ───────────────────────────────────────────────

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 72.0;
pub const LINE_HEIGHT: f32 = 18.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
/// Lowest baseline allowed before breaking the page.
const MAX_Y: f32 = PAGE_HEIGHT - MARGIN;
const LIST_INDENT: f32 = 20.0;

const BODY_JPEG_QUALITY: u8 = 90;
const SNAPSHOT_JPEG_QUALITY: u8 = 95;

/// Font size and spacing (before, after) per element kind.
fn text_style(kind: ElementKind) -> (f32, f32, f32) {
    match kind {
        ElementKind::Heading1 => (24.0, 20.0, 12.0),
        ElementKind::Heading2 => (18.0, 16.0, 10.0),
        ElementKind::Heading3 => (14.0, 12.0, 8.0),
        _ => (12.0, 0.0, 8.0),
    }
}

fn line_advance(size: f32) -> f32 {
    LINE_HEIGHT.max(size * 1.25)
}

// ── Layout model ─────────────────────────────────────────────────────────

/// One drawing instruction. `y` grows downward from the top of the page;
/// for text it is the baseline, for images the top edge.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        font: PdfFont,
        size: f32,
        x: f32,
        y: f32,
        text: String,
        /// 0 = black, 255 = white.
        gray: u8,
    },
    Image {
        index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// A JPEG ready to embed as a `DCTDecode` XObject.
#[derive(Debug, Clone)]
struct PdfImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

#[derive(Debug)]
struct Layout {
    pages: Vec<Vec<DrawOp>>,
    images: Vec<PdfImage>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            images: Vec::new(),
            y: MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = MARGIN;
    }

    fn page_has_content(&self) -> bool {
        self.pages.last().is_some_and(|ops| !ops.is_empty())
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.push(op);
        }
    }

    fn text_at(&mut self, text: &str, font: PdfFont, size: f32, x: f32, gray: u8) {
        self.push(DrawOp::Text {
            font,
            size,
            x,
            y: self.y,
            text: text.to_string(),
            gray,
        });
    }

    fn centered(&mut self, text: &str, font: PdfFont, size: f32, gray: u8) {
        let x = PAGE_WIDTH / 2.0 - text_width(text, font, size) / 2.0;
        self.text_at(text, font, size, x, gray);
    }

    /// Wrapped, centered title lines 35 pt apart starting at the cursor.
    /// Returns the number of lines drawn.
    fn centered_title(&mut self, title: &str) -> usize {
        let lines = wrap_text(title, PdfFont::Bold, 28.0, CONTENT_WIDTH);
        let top = self.y;
        for (i, line) in lines.iter().enumerate() {
            self.y = top + i as f32 * 35.0;
            self.centered(line, PdfFont::Bold, 28.0, 0);
        }
        self.y = top;
        lines.len()
    }

    fn image_at(&mut self, image: PdfImage, x: f32, y: f32, width: f32, height: f32) {
        let index = self.images.len();
        self.images.push(image);
        self.push(DrawOp::Image {
            index,
            x,
            y,
            width,
            height,
        });
    }

    // ── Covers ───────────────────────────────────────────────────────────

    fn snapshot_page(&mut self, image: PdfImage) {
        self.image_at(image, 0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT);
    }

    fn synthesized_cover(&mut self, cover: &SynthesizedCover, artwork: Option<PdfImage>, prefix: &str) {
        match artwork {
            Some(image) => {
                let (w, h) = (image.width as f32, image.height as f32);
                let scale = (CONTENT_WIDTH / w).min(PAGE_HEIGHT * 0.5 / h).min(1.0);
                let (w, h) = (w * scale, h * scale);
                self.y = 100.0;
                self.image_at(image, (PAGE_WIDTH - w) / 2.0, self.y, w, h);
                self.y += h + 40.0;
            }
            None => self.y = MARGIN + 150.0,
        }

        if let Some(genre) = &cover.genre {
            self.centered(&genre.to_uppercase(), PdfFont::Regular, 12.0, 100);
            self.y += 40.0;
        }

        let lines = self.centered_title(&cover.title);
        self.y += lines as f32 * 35.0 + 30.0;

        if let Some(author) = &cover.author {
            self.centered(&format!("{prefix}{author}"), PdfFont::Oblique, 16.0, 80);
        }
    }

    fn title_page(&mut self, title: &str, author: Option<&str>, prefix: &str) {
        self.y = MARGIN + 150.0;
        let lines = self.centered_title(title);
        self.y += lines as f32 * 35.0 + 50.0;
        if let Some(author) = author {
            self.centered(&format!("{prefix}{author}"), PdfFont::Oblique, 16.0, 0);
        }
    }

    // ── Content ──────────────────────────────────────────────────────────

    fn begin_element(&mut self, element: &ParsedElement) {
        if self.y > MAX_Y - 40.0 {
            self.new_page();
        }
        if element.page_break_before && self.page_has_content() {
            self.new_page();
        }
    }

    fn text_element(&mut self, element: &ParsedElement, number: Option<u32>) {
        let (size, before, after) = text_style(element.kind);
        self.y += before;

        let prefix = match element.kind {
            ElementKind::ListItem => "• ".to_string(),
            ElementKind::OrderedItem => format!("{}. ", number.unwrap_or(1)),
            _ => String::new(),
        };
        let text = format!("{prefix}{}", element.plain_text().trim());
        if text.trim().is_empty() {
            self.y += LINE_HEIGHT;
            return;
        }

        let font = if element.kind.is_heading() {
            PdfFont::Bold
        } else {
            PdfFont::from_flags(element.all_bold(), element.all_italic())
        };
        let indent = if element.kind.is_list() { LIST_INDENT } else { 0.0 };
        let advance = line_advance(size);

        for line in wrap_text(&text, font, size, CONTENT_WIDTH - indent) {
            if self.y > MAX_Y {
                self.new_page();
            }
            let width = text_width(&line, font, size);
            let x = match element.align {
                Alignment::Center => PAGE_WIDTH / 2.0 - width / 2.0,
                Alignment::Right => PAGE_WIDTH - MARGIN - width,
                Alignment::Left | Alignment::Justify => MARGIN + indent,
            };
            self.text_at(&line, font, size, x, 0);
            self.y += advance;
        }
        self.y += after;
    }

    fn place_image(&mut self, image: PdfImage) {
        let (mut w, mut h) = (image.width as f32, image.height as f32);
        if w > CONTENT_WIDTH {
            h *= CONTENT_WIDTH / w;
            w = CONTENT_WIDTH;
        }
        let room = MAX_Y - self.y - 40.0;
        if h > room && room > 100.0 {
            w *= room / h;
            h = room;
        }
        if h > MAX_Y - self.y - 20.0 {
            self.new_page();
            let full = MAX_Y - MARGIN;
            if h > full {
                w *= full / h;
                h = full;
            }
        }
        let x = MARGIN + (CONTENT_WIDTH - w) / 2.0;
        self.image_at(image, x, self.y, w, h);
        self.y += h + 20.0;
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render `options` as a PDF.
///
/// Image and cover failures degrade (skip, synthesize, title page); only a
/// serialization failure is an error.
pub async fn render_pdf(
    options: &ExportOptions,
    resolver: &ImageResolver,
    config: &ExportConfig,
) -> Result<RenderedDocument, ExportError> {
    let elements = parse(&options.content);
    let total = elements.len();
    let progress = config.progress();
    progress.on_export_start(ExportFormat::Pdf, total);
    info!("Rendering PDF: {} elements", total);

    let mut layout = Layout::new();
    let prefix = config.author_prefix.as_str();
    let cover = match acquire_cover(options, resolver, config).await {
        Some(CoverArtifact::Snapshot(snapshot)) => {
            layout.snapshot_page(snapshot_image(snapshot).await?);
            CoverKind::Snapshot
        }
        Some(CoverArtifact::Synthesized(cover)) => {
            let artwork = match cover.image.clone() {
                Some(resolved) => match to_pdf_image(resolved, BODY_JPEG_QUALITY).await {
                    Ok(image) => Some(image),
                    Err(e) => {
                        warn!("Cover artwork could not be embedded: {}", e);
                        None
                    }
                },
                None => None,
            };
            layout.synthesized_cover(&cover, artwork, prefix);
            CoverKind::Synthesized
        }
        None => {
            let author = options.author.as_deref().filter(|a| !a.trim().is_empty());
            layout.title_page(options.title.trim(), author, prefix);
            CoverKind::TitlePage
        }
    };
    layout.new_page();

    let mut counter = ListCounter::default();
    let (mut embedded, mut skipped) = (0usize, 0usize);
    for (i, element) in elements.iter().enumerate() {
        let number = counter.advance(element);
        layout.begin_element(element);

        match (&element.kind, &element.image) {
            (ElementKind::Image, Some(image_ref)) => {
                match embed(resolver, &image_ref.src).await {
                    Ok(image) => {
                        layout.place_image(image);
                        embedded += 1;
                    }
                    Err(e) => {
                        warn!("Skipping image {}: {}", short(&image_ref.src), e);
                        progress.on_image_skipped(&image_ref.src, &e.to_string());
                        skipped += 1;
                    }
                }
            }
            _ => layout.text_element(element, number),
        }
        progress.on_element_complete(i + 1, total);
    }

    let pages = layout.pages.len();
    debug!("Laid out {} pages, {} images", pages, layout.images.len());

    let title = options.title.trim().to_string();
    let author = options.author.clone();
    let bytes = tokio::task::spawn_blocking(move || write_pdf(layout, &title, author.as_deref()))
        .await
        .map_err(|e| ExportError::Internal(format!("PDF writer task panicked: {e}")))??;

    Ok(RenderedDocument {
        bytes,
        pages: Some(pages),
        elements: total,
        images_embedded: embedded,
        images_skipped: skipped,
        cover,
    })
}

async fn embed(resolver: &ImageResolver, locator: &str) -> Result<PdfImage, AssetError> {
    let resolved = resolver.resolve(locator).await?;
    to_pdf_image(resolved, BODY_JPEG_QUALITY).await
}

/// Decode, flatten onto white and re-encode as JPEG.
async fn to_pdf_image(resolved: ResolvedImage, quality: u8) -> Result<PdfImage, AssetError> {
    tokio::task::spawn_blocking(move || -> Result<PdfImage, AssetError> {
        let pixels = resolved.decode().map_err(|e| AssetError::DecodeFailed {
            locator: String::new(),
            detail: e.to_string(),
        })?;
        let rgb = flatten_on_white(&pixels);
        let jpeg = encode_jpeg(&rgb, quality).map_err(|e| AssetError::DecodeFailed {
            locator: String::new(),
            detail: e.to_string(),
        })?;
        Ok(PdfImage {
            jpeg,
            width: rgb.width(),
            height: rgb.height(),
        })
    })
    .await
    .map_err(|e| AssetError::DecodeFailed {
        locator: String::new(),
        detail: format!("image task panicked: {e}"),
    })?
}

async fn snapshot_image(snapshot: CoverSnapshot) -> Result<PdfImage, ExportError> {
    tokio::task::spawn_blocking(move || -> Result<PdfImage, ExportError> {
        let jpeg = snapshot
            .to_jpeg(SNAPSHOT_JPEG_QUALITY)
            .map_err(|e| ExportError::render("PDF", format!("cover snapshot: {e}")))?;
        Ok(PdfImage {
            jpeg,
            width: snapshot.width(),
            height: snapshot.height(),
        })
    })
    .await
    .map_err(|e| ExportError::Internal(format!("snapshot task panicked: {e}")))?
}

// ── Serialization ────────────────────────────────────────────────────────

fn write_pdf(layout: Layout, title: &str, author: Option<&str>) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for font in PdfFont::ALL {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name(), id);
    }

    let mut xobjects = Dictionary::new();
    for (i, image) in layout.images.iter().enumerate() {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        let id = doc.add_object(Stream::new(dict, image.jpeg.clone()).with_compression(false));
        xobjects.set(image_name(i), id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
        "XObject" => xobjects,
    });

    let mut kids = Vec::with_capacity(layout.pages.len());
    for ops in &layout.pages {
        let content = Content {
            operations: page_operations(ops),
        };
        let encoded = content
            .encode()
            .map_err(|e| ExportError::render("PDF", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let mut info = dictionary! {
        "Title" => text_string(title),
        "Producer" => text_string(concat!("ebook-export ", env!("CARGO_PKG_VERSION"))),
    };
    if let Some(author) = author {
        info.set("Author", text_string(author));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::render("PDF", e))?;
    Ok(out)
}

fn image_name(index: usize) -> String {
    format!("Im{}", index + 1)
}

/// Document-info string: plain literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        return Object::string_literal(s);
    }
    let mut bytes = vec![0xfe, 0xff];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn page_operations(ops: &[DrawOp]) -> Vec<Operation> {
    let mut out = Vec::new();
    for op in ops {
        match op {
            DrawOp::Text {
                font,
                size,
                x,
                y,
                text,
                gray,
            } => {
                out.push(Operation::new("g", vec![(*gray as f32 / 255.0).into()]));
                out.push(Operation::new("BT", vec![]));
                out.push(Operation::new(
                    "Tf",
                    vec![font.resource_name().into(), (*size).into()],
                ));
                out.push(Operation::new(
                    "Td",
                    vec![(*x).into(), (PAGE_HEIGHT - *y).into()],
                ));
                out.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
                ));
                out.push(Operation::new("ET", vec![]));
            }
            DrawOp::Image {
                index,
                x,
                y,
                width,
                height,
            } => {
                out.push(Operation::new("q", vec![]));
                out.push(Operation::new(
                    "cm",
                    vec![
                        (*width).into(),
                        0.into(),
                        0.into(),
                        (*height).into(),
                        (*x).into(),
                        (PAGE_HEIGHT - *y - *height).into(),
                    ],
                ));
                out.push(Operation::new(
                    "Do",
                    vec![Object::Name(image_name(*index).into_bytes())],
                ));
                out.push(Operation::new("Q", vec![]));
            }
        }
    }
    out
}
