//! Word (DOCX) output.
//!
//! Parsed elements are mapped onto the small object model in [`package`]
//! and zipped up in `spawn_blocking`. The document is split into sections
//! so the cover can have its own page setup:
//!
//! ```text
//! [cover section]   snapshot: Letter, zero margins, one full-page picture
//!                   synthesized: 720-twip margins, artwork/genre/title/author
//! content section   1440-twip margins; starts with a title page when there
//!                   is no cover section
//! ```
//!
//! Unlike the PDF renderer, run-level bold/italic/underline survive as-is.

pub mod package;

use crate::config::{ExportConfig, ExportFormat};
use crate::element::{Alignment, ElementKind, ListCounter, ParsedElement};
use crate::error::ExportError;
use crate::model::{CoverKind, ExportOptions};
use crate::pipeline::cover::{acquire_cover, CoverArtifact, CoverSnapshot, SynthesizedCover, COVER_PAGE_PX};
use crate::pipeline::image::{short, ImageKind, ImageResolver, ResolvedImage};
use crate::pipeline::parse::parse;
use crate::pipeline::RenderedDocument;
use package::{DocxPackage, Drawing, Inline, PageSetup, Paragraph, Section, Spacing, TextRun};
use tracing::{debug, info, warn};

/// Synthesized cover artwork box, in pixels.
const COVER_ART_BOX: (f32, f32) = (500.0, 650.0);

fn heading_style(kind: ElementKind) -> Option<(&'static str, u32, Spacing)> {
    match kind {
        ElementKind::Heading1 => Some(("Heading1", 48, Spacing::new(400, 200))),
        ElementKind::Heading2 => Some(("Heading2", 36, Spacing::new(300, 150))),
        ElementKind::Heading3 => Some(("Heading3", 28, Spacing::new(200, 100))),
        _ => None,
    }
}

/// Render `options` as a DOCX package.
pub async fn render_docx(
    options: &ExportOptions,
    resolver: &ImageResolver,
    config: &ExportConfig,
) -> Result<RenderedDocument, ExportError> {
    let elements = parse(&options.content);
    let total = elements.len();
    let progress = config.progress();
    progress.on_export_start(ExportFormat::Docx, total);
    info!("Rendering DOCX: {} elements", total);

    let title = options.title.trim().to_string();
    let author = options
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    let mut pkg = DocxPackage::new(title.clone(), author.clone());
    let prefix = config.author_prefix.as_str();

    let cover = match acquire_cover(options, resolver, config).await {
        Some(CoverArtifact::Snapshot(snapshot)) => {
            let section = snapshot_section(&mut pkg, snapshot).await?;
            pkg.sections.push(section);
            CoverKind::Snapshot
        }
        Some(CoverArtifact::Synthesized(cover)) => {
            let section = synthesized_section(&mut pkg, &cover, prefix);
            pkg.sections.push(section);
            CoverKind::Synthesized
        }
        None => CoverKind::TitlePage,
    };

    let mut content = Section::new(PageSetup::A4);
    if cover == CoverKind::TitlePage {
        title_page(&mut content, &title, author.as_deref(), prefix);
    }

    let mut counter = ListCounter::default();
    let (mut embedded, mut skipped) = (0usize, 0usize);
    for (i, element) in elements.iter().enumerate() {
        let number = counter.advance(element);
        match (&element.kind, &element.image) {
            (ElementKind::Image, Some(image_ref)) => match resolver.resolve(&image_ref.src).await {
                Ok(resolved) => {
                    content.push(image_paragraph(&mut pkg, element, resolved, config));
                    embedded += 1;
                }
                Err(e) => {
                    warn!("Skipping image {}: {}", short(&image_ref.src), e);
                    progress.on_image_skipped(&image_ref.src, &e.to_string());
                    skipped += 1;
                }
            },
            _ => content.push(text_paragraph(element, number)),
        }
        progress.on_element_complete(i + 1, total);
    }
    pkg.sections.push(content);
    debug!(
        "DOCX model: {} sections, {} media parts",
        pkg.sections.len(),
        pkg.media.len()
    );

    let bytes = tokio::task::spawn_blocking(move || pkg.to_bytes())
        .await
        .map_err(|e| ExportError::Internal(format!("DOCX writer task panicked: {e}")))?
        .map_err(|e| ExportError::render("DOCX", e))?;

    Ok(RenderedDocument {
        bytes,
        pages: None,
        elements: total,
        images_embedded: embedded,
        images_skipped: skipped,
        cover,
    })
}

// ── Cover sections ───────────────────────────────────────────────────────

async fn snapshot_section(
    pkg: &mut DocxPackage,
    snapshot: CoverSnapshot,
) -> Result<Section, ExportError> {
    let png = tokio::task::spawn_blocking(move || snapshot.to_png())
        .await
        .map_err(|e| ExportError::Internal(format!("snapshot task panicked: {e}")))?
        .map_err(|e| ExportError::render("DOCX", format!("cover snapshot: {e}")))?;
    let media = pkg.add_media(png, ImageKind::Png);

    let mut section = Section::new(PageSetup::LETTER.with_margin(0));
    section.push(
        Paragraph::new()
            .spacing(Spacing {
                before: 0,
                after: 0,
                line: Some(240),
            })
            .child(Inline::Drawing(Drawing {
                media,
                width_px: COVER_PAGE_PX.0,
                height_px: COVER_PAGE_PX.1,
            })),
    );
    Ok(section)
}

fn synthesized_section(pkg: &mut DocxPackage, cover: &SynthesizedCover, prefix: &str) -> Section {
    let mut section = Section::new(PageSetup::A4.with_margin(720));

    if let Some(art) = &cover.image {
        let (w, h) = fit_box(art.width, art.height, COVER_ART_BOX);
        let media = pkg.add_media(art.data.clone(), art.kind);
        section.push(Paragraph::new().spacing(Spacing::new(400, 200)));
        section.push(
            Paragraph::new()
                .align(Alignment::Center)
                .spacing(Spacing::new(200, 400))
                .child(Inline::Drawing(Drawing {
                    media,
                    width_px: w,
                    height_px: h,
                })),
        );
    }

    if let Some(genre) = &cover.genre {
        section.push(
            Paragraph::new()
                .align(Alignment::Center)
                .spacing(Spacing::new(600, 200))
                .run(TextRun::new(genre.to_uppercase()).size(20).color("666666")),
        );
    }

    let before = if cover.image.is_some() { 200 } else { 2400 };
    section.push(
        Paragraph::new()
            .align(Alignment::Center)
            .spacing(Spacing::new(before, 400))
            .run(TextRun::new(cover.title.as_str()).bold().size(56)),
    );

    if let Some(author) = &cover.author {
        section.push(
            Paragraph::new()
                .align(Alignment::Center)
                .spacing(Spacing::new(200, 600))
                .run(
                    TextRun::new(format!("{prefix}{author}"))
                        .italic()
                        .size(28)
                        .color("555555"),
                ),
        );
    }
    section
}

fn title_page(section: &mut Section, title: &str, author: Option<&str>, prefix: &str) {
    section.push(
        Paragraph::new()
            .style("Title")
            .align(Alignment::Center)
            .spacing(Spacing::new(600, 200))
            .run(TextRun::new(title).bold().size(48)),
    );
    if let Some(author) = author {
        section.push(
            Paragraph::new()
                .align(Alignment::Center)
                .spacing(Spacing::new(0, 600))
                .run(TextRun::new(format!("{prefix}{author}")).italic().size(28)),
        );
    }
    section.push(Paragraph::page_break());
}

/// Scale `(w, h)` to fit inside `bounds`, up or down, keeping aspect ratio.
fn fit_box(w: u32, h: u32, bounds: (f32, f32)) -> (u32, u32) {
    let (w, h) = (w.max(1) as f32, h.max(1) as f32);
    let scale = (bounds.0 / w).min(bounds.1 / h);
    ((w * scale).round() as u32, (h * scale).round() as u32)
}

// ── Content ──────────────────────────────────────────────────────────────

fn image_paragraph(
    pkg: &mut DocxPackage,
    element: &ParsedElement,
    image: ResolvedImage,
    config: &ExportConfig,
) -> Paragraph {
    let max = config.docx_max_image_width_px;
    let (mut w, mut h) = (image.width as f32, image.height as f32);
    if image.width > max {
        h *= max as f32 / w;
        w = max as f32;
    }
    let media = pkg.add_media(image.data, image.kind);
    let mut p = Paragraph::new()
        .align(element.align)
        .spacing(Spacing::new(200, 200))
        .child(Inline::Drawing(Drawing {
            media,
            width_px: w.round() as u32,
            height_px: (h.round() as u32).max(1),
        }));
    p.page_break_before = element.page_break_before;
    p
}

fn text_paragraph(element: &ParsedElement, number: Option<u32>) -> Paragraph {
    let heading = heading_style(element.kind);
    let size = heading.map_or(24, |(_, size, _)| size);
    let runs = element.runs.iter().map(|r| {
        Inline::Text(TextRun {
            text: r.text.clone(),
            bold: r.bold,
            italic: r.italic,
            underline: r.underline,
            size: Some(size),
            color: None,
        })
    });

    let p = Paragraph::new().align(element.align);
    let mut p = match (element.kind, heading) {
        (_, Some((style, _, spacing))) => p.style(style).spacing(spacing),
        (ElementKind::ListItem, None) => p.bullet(element.list_level).spacing(Spacing::new(0, 200)),
        (ElementKind::OrderedItem, None) => p
            .spacing(Spacing::new(0, 200))
            .run(TextRun::new(format!("{}. ", number.unwrap_or(1))).size(24)),
        _ => p.spacing(Spacing::new(0, 200)),
    };
    p.children.extend(runs);
    p.page_break_before = element.page_break_before;
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Run;

    fn texts(p: &Paragraph) -> Vec<&str> {
        p.children
            .iter()
            .filter_map(|c| match c {
                Inline::Text(r) => Some(r.text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn heading_maps_to_style_and_size() {
        let el = ParsedElement::text(ElementKind::Heading2, vec![Run::plain("Two")], Alignment::Center);
        let p = text_paragraph(&el, None);
        assert_eq!(p.style, Some("Heading2"));
        assert_eq!(p.spacing, Some(Spacing::new(300, 150)));
        assert_eq!(p.align, Some(Alignment::Center));
        match &p.children[0] {
            Inline::Text(r) => assert_eq!(r.size, Some(36)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn runs_keep_inline_formatting() {
        let el = ParsedElement::text(
            ElementKind::Paragraph,
            vec![
                Run {
                    text: "bold".into(),
                    bold: true,
                    ..Run::default()
                },
                Run {
                    text: " under".into(),
                    underline: true,
                    ..Run::default()
                },
            ],
            Alignment::Justify,
        );
        let p = text_paragraph(&el, None);
        match (&p.children[0], &p.children[1]) {
            (Inline::Text(a), Inline::Text(b)) => {
                assert!(a.bold && !a.underline);
                assert!(b.underline && !b.bold);
                assert_eq!(a.size, Some(24));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ordered_item_gets_number_prefix_and_bullet_gets_level() {
        let ordered = ParsedElement::text(ElementKind::OrderedItem, vec![Run::plain("x")], Alignment::Left);
        assert_eq!(texts(&text_paragraph(&ordered, Some(2))), vec!["2. ", "x"]);

        let mut bullet = ParsedElement::text(ElementKind::ListItem, vec![Run::plain("y")], Alignment::Left);
        bullet.list_level = 2;
        let p = text_paragraph(&bullet, None);
        assert_eq!(p.bullet_level, Some(2));
        assert_eq!(texts(&p), vec!["y"]);
    }

    #[test]
    fn page_break_hint_carries_over() {
        let mut el = ParsedElement::text(ElementKind::Heading1, vec![Run::plain("Ch")], Alignment::Center);
        el.page_break_before = true;
        assert!(text_paragraph(&el, None).page_break_before);
    }

    #[test]
    fn wide_images_are_capped() {
        let mut pkg = DocxPackage::new("T", None);
        let el = ParsedElement::image(
            crate::element::ImageRef {
                src: "x.png".into(),
                width: 400,
                height: 300,
            },
            Alignment::Center,
        );
        let image = ResolvedImage {
            data: vec![0],
            width: 960,
            height: 600,
            kind: ImageKind::Jpeg,
        };
        let p = image_paragraph(&mut pkg, &el, image, &ExportConfig::default());
        match &p.children[0] {
            Inline::Drawing(d) => assert_eq!((d.width_px, d.height_px), (480, 300)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(pkg.media[0].kind, ImageKind::Jpeg);
    }

    #[test]
    fn fit_box_scales_both_ways() {
        assert_eq!(fit_box(1000, 1300, (500.0, 650.0)), (500, 650));
        assert_eq!(fit_box(100, 100, (500.0, 650.0)), (500, 500));
        assert_eq!(fit_box(2000, 650, (500.0, 650.0)), (500, 163));
    }

    #[test]
    fn synthesized_cover_without_art_uses_tall_title_gap() {
        let mut pkg = DocxPackage::new("T", None);
        let cover = SynthesizedCover {
            title: "Book".into(),
            genre: Some("poetry".into()),
            author: Some("Ana".into()),
            image: None,
        };
        let section = synthesized_section(&mut pkg, &cover, "by ");
        assert_eq!(section.page.margin, 720);
        let all: Vec<&str> = section.paragraphs.iter().flat_map(texts).collect();
        assert_eq!(all, vec!["POETRY", "Book", "by Ana"]);
        assert_eq!(section.paragraphs[1].spacing, Some(Spacing::new(2400, 400)));
        assert!(pkg.media.is_empty());
    }

    #[test]
    fn title_page_ends_with_page_break() {
        let mut section = Section::new(PageSetup::A4);
        title_page(&mut section, "Book", Some("Ana"), "by ");
        assert_eq!(section.paragraphs.len(), 3);
        assert_eq!(section.paragraphs[0].style, Some("Title"));
        assert_eq!(section.paragraphs[2].children, vec![Inline::PageBreak]);
    }
}
