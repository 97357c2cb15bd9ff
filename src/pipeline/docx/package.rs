//! Minimal WordprocessingML object model and OPC packaging.
//!
//! Only what the renderer emits is modelled: sections with page setup,
//! paragraphs with style/spacing/alignment/bullet numbering, text runs,
//! page breaks and inline pictures. [`DocxPackage::to_bytes`] serializes the
//! model into the parts Word expects and zips them.

use crate::element::Alignment;
use crate::pipeline::image::ImageKind;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// English Metric Units per CSS pixel at 96 dpi.
pub const EMU_PER_PX: u64 = 9525;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Numbering instance used for bullet lists.
const BULLET_NUM_ID: u32 = 1;
/// Relationship ids 1 and 2 are styles and numbering; media start after.
const FIRST_MEDIA_REL: usize = 3;

// ── Model ────────────────────────────────────────────────────────────────

/// Page size and uniform margins, in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSetup {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

impl PageSetup {
    pub const A4: PageSetup = PageSetup {
        width: 11906,
        height: 16838,
        margin: 1440,
    };
    pub const LETTER: PageSetup = PageSetup {
        width: 12240,
        height: 15840,
        margin: 1440,
    };

    pub fn with_margin(self, margin: u32) -> Self {
        Self { margin, ..self }
    }
}

/// Paragraph spacing in twips; `line` in 240ths of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spacing {
    pub before: u32,
    pub after: u32,
    pub line: Option<u32>,
}

impl Spacing {
    pub fn new(before: u32, after: u32) -> Self {
        Self {
            before,
            after,
            line: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Half-points.
    pub size: Option<u32>,
    /// Hex RGB without `#`.
    pub color: Option<&'static str>,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn size(mut self, half_points: u32) -> Self {
        self.size = Some(half_points);
        self
    }

    pub fn color(mut self, hex: &'static str) -> Self {
        self.color = Some(hex);
        self
    }
}

/// An inline picture referencing a media part by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drawing {
    pub media: usize,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(TextRun),
    Drawing(Drawing),
    PageBreak,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub style: Option<&'static str>,
    pub align: Option<Alignment>,
    pub spacing: Option<Spacing>,
    /// Bullet nesting level.
    pub bullet_level: Option<u32>,
    pub page_break_before: bool,
    pub children: Vec<Inline>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_break() -> Self {
        Self::new().child(Inline::PageBreak)
    }

    pub fn style(mut self, style: &'static str) -> Self {
        self.style = Some(style);
        self
    }

    pub fn align(mut self, align: Alignment) -> Self {
        self.align = Some(align);
        self
    }

    pub fn spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = Some(spacing);
        self
    }

    pub fn bullet(mut self, level: u32) -> Self {
        self.bullet_level = Some(level);
        self
    }

    pub fn child(mut self, inline: Inline) -> Self {
        self.children.push(inline);
        self
    }

    pub fn run(self, run: TextRun) -> Self {
        self.child(Inline::Text(run))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub page: PageSetup,
    pub paragraphs: Vec<Paragraph>,
}

impl Section {
    pub fn new(page: PageSetup) -> Self {
        Self {
            page,
            paragraphs: Vec::new(),
        }
    }

    pub fn push(&mut self, paragraph: Paragraph) {
        self.paragraphs.push(paragraph);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub data: Vec<u8>,
    pub kind: ImageKind,
}

/// A whole document: metadata, sections in order, embedded media.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    pub title: String,
    pub creator: Option<String>,
    pub sections: Vec<Section>,
    pub media: Vec<MediaPart>,
}

impl DocxPackage {
    pub fn new(title: impl Into<String>, creator: Option<String>) -> Self {
        Self {
            title: title.into(),
            creator,
            ..Self::default()
        }
    }

    /// Register an image and return its media index for a [`Drawing`].
    pub fn add_media(&mut self, data: Vec<u8>, kind: ImageKind) -> usize {
        self.media.push(MediaPart { data, kind });
        self.media.len() - 1
    }

    /// Serialize and zip all parts.
    pub fn to_bytes(&self) -> zip::result::ZipResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let parts: [(&str, String); 7] = [
            ("[Content_Types].xml", self.content_types_xml()),
            ("_rels/.rels", root_rels_xml()),
            ("docProps/core.xml", self.core_xml()),
            ("word/document.xml", self.document_xml()),
            ("word/styles.xml", styles_xml()),
            ("word/numbering.xml", numbering_xml()),
            ("word/_rels/document.xml.rels", self.document_rels_xml()),
        ];
        for (name, xml) in parts {
            zip.start_file(name, deflated)?;
            zip.write_all(xml.as_bytes())?;
        }
        // Already-compressed payloads gain nothing from deflate.
        for (i, media) in self.media.iter().enumerate() {
            zip.start_file(format!("word/{}", media_target(i, media.kind)), stored)?;
            zip.write_all(&media.data)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    // ── Parts ────────────────────────────────────────────────────────────

    fn content_types_xml(&self) -> String {
        let mut media = String::new();
        for kind in [ImageKind::Png, ImageKind::Jpeg, ImageKind::Gif] {
            let _ = write!(
                media,
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                kind.extension(),
                kind.mime_type()
            );
        }
        format!(
            concat!(
                "{decl}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
                "<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>",
                "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
                "{media}",
                "<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>",
                "<Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>",
                "<Override PartName=\"/word/numbering.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml\"/>",
                "<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>",
                "</Types>"
            ),
            decl = XML_DECL,
            media = media
        )
    }

    fn core_xml(&self) -> String {
        let mut xml = format!(
            concat!(
                "{}<cp:coreProperties ",
                "xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" ",
                "xmlns:dc=\"http://purl.org/dc/elements/1.1/\" ",
                "xmlns:dcterms=\"http://purl.org/dc/terms/\" ",
                "xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
                "<dc:title>{}</dc:title>"
            ),
            XML_DECL,
            xml_text(&self.title)
        );
        if let Some(creator) = &self.creator {
            let _ = write!(xml, "<dc:creator>{}</dc:creator>", xml_text(creator));
        }
        xml.push_str("</cp:coreProperties>");
        xml
    }

    fn document_rels_xml(&self) -> String {
        let mut xml = format!(
            concat!(
                "{}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
                "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
                "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering\" Target=\"numbering.xml\"/>"
            ),
            XML_DECL
        );
        for (i, media) in self.media.iter().enumerate() {
            let _ = write!(
                xml,
                "<Relationship Id=\"{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/image\" Target=\"{}\"/>",
                media_rel_id(i),
                media_target(i, media.kind)
            );
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn document_xml(&self) -> String {
        let mut xml = format!(
            "{XML_DECL}<w:document xmlns:w=\"{NS_W}\" xmlns:r=\"{NS_R}\" xmlns:wp=\"{NS_WP}\" xmlns:a=\"{NS_A}\" xmlns:pic=\"{NS_PIC}\"><w:body>"
        );
        let mut drawing_id = 0u32;
        let last = self.sections.len().saturating_sub(1);
        for (i, section) in self.sections.iter().enumerate() {
            if i == last {
                for p in &section.paragraphs {
                    write_paragraph(&mut xml, p, None, &mut drawing_id);
                }
                write_sect_pr(&mut xml, section.page);
            } else {
                // A non-final section ends with a paragraph carrying its sectPr.
                let empty = Paragraph::new();
                let (body, tail) = match section.paragraphs.split_last() {
                    Some((tail, body)) => (body, tail),
                    None => (&[][..], &empty),
                };
                for p in body {
                    write_paragraph(&mut xml, p, None, &mut drawing_id);
                }
                write_paragraph(&mut xml, tail, Some(section.page), &mut drawing_id);
            }
        }
        if self.sections.is_empty() {
            write_sect_pr(&mut xml, PageSetup::A4);
        }
        xml.push_str("</w:body></w:document>");
        xml
    }
}

fn media_rel_id(index: usize) -> String {
    format!("rId{}", index + FIRST_MEDIA_REL)
}

fn media_target(index: usize, kind: ImageKind) -> String {
    format!("media/image{}.{}", index + 1, kind.extension())
}

fn root_rels_xml() -> String {
    format!(
        concat!(
            "{}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
            "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>",
            "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>",
            "</Relationships>"
        ),
        XML_DECL
    )
}

fn styles_xml() -> String {
    let mut xml = format!(
        concat!(
            "{}<w:styles xmlns:w=\"{}\">",
            "<w:docDefaults><w:rPrDefault><w:rPr>",
            "<w:rFonts w:ascii=\"Calibri\" w:hAnsi=\"Calibri\" w:cs=\"Calibri\"/>",
            "<w:sz w:val=\"24\"/><w:szCs w:val=\"24\"/>",
            "</w:rPr></w:rPrDefault></w:docDefaults>",
            "<w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/><w:qFormat/></w:style>"
        ),
        XML_DECL, NS_W
    );
    let styles = [
        ("Title", "Title", 56, None),
        ("Heading1", "heading 1", 48, Some(0)),
        ("Heading2", "heading 2", 36, Some(1)),
        ("Heading3", "heading 3", 28, Some(2)),
    ];
    for (id, name, size, outline) in styles {
        let _ = write!(
            xml,
            "<w:style w:type=\"paragraph\" w:styleId=\"{id}\"><w:name w:val=\"{name}\"/><w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/><w:qFormat/><w:pPr><w:keepNext/>"
        );
        if let Some(level) = outline {
            let _ = write!(xml, "<w:outlineLvl w:val=\"{level}\"/>");
        }
        let _ = write!(
            xml,
            "</w:pPr><w:rPr><w:b/><w:bCs/><w:sz w:val=\"{size}\"/><w:szCs w:val=\"{size}\"/></w:rPr></w:style>"
        );
    }
    xml.push_str("</w:styles>");
    xml
}

fn numbering_xml() -> String {
    let mut xml = format!(
        "{XML_DECL}<w:numbering xmlns:w=\"{NS_W}\"><w:abstractNum w:abstractNumId=\"0\"><w:multiLevelType w:val=\"hybridMultilevel\"/>"
    );
    for level in 0..9u32 {
        let _ = write!(
            xml,
            concat!(
                "<w:lvl w:ilvl=\"{lvl}\"><w:start w:val=\"1\"/><w:numFmt w:val=\"bullet\"/>",
                "<w:lvlText w:val=\"•\"/><w:lvlJc w:val=\"left\"/>",
                "<w:pPr><w:ind w:left=\"{left}\" w:hanging=\"360\"/></w:pPr></w:lvl>"
            ),
            lvl = level,
            left = 720 * (level + 1)
        );
    }
    let _ = write!(
        xml,
        "</w:abstractNum><w:num w:numId=\"{BULLET_NUM_ID}\"><w:abstractNumId w:val=\"0\"/></w:num></w:numbering>"
    );
    xml
}

// ── Body serialization ───────────────────────────────────────────────────

fn jc_value(align: Alignment) -> &'static str {
    match align {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "both",
    }
}

fn write_sect_pr(xml: &mut String, page: PageSetup) {
    let header = page.margin.min(720);
    let _ = write!(
        xml,
        concat!(
            "<w:sectPr><w:pgSz w:w=\"{w}\" w:h=\"{h}\"/>",
            "<w:pgMar w:top=\"{m}\" w:right=\"{m}\" w:bottom=\"{m}\" w:left=\"{m}\" ",
            "w:header=\"{hd}\" w:footer=\"{hd}\" w:gutter=\"0\"/></w:sectPr>"
        ),
        w = page.width,
        h = page.height,
        m = page.margin,
        hd = header
    );
}

fn write_paragraph(
    xml: &mut String,
    p: &Paragraph,
    section_end: Option<PageSetup>,
    drawing_id: &mut u32,
) {
    xml.push_str("<w:p><w:pPr>");
    if let Some(style) = p.style {
        let _ = write!(xml, "<w:pStyle w:val=\"{style}\"/>");
    }
    if p.page_break_before {
        xml.push_str("<w:pageBreakBefore/>");
    }
    if let Some(level) = p.bullet_level {
        let _ = write!(
            xml,
            "<w:numPr><w:ilvl w:val=\"{}\"/><w:numId w:val=\"{BULLET_NUM_ID}\"/></w:numPr>",
            level.min(8)
        );
    }
    if let Some(s) = p.spacing {
        let _ = write!(xml, "<w:spacing w:before=\"{}\" w:after=\"{}\"", s.before, s.after);
        if let Some(line) = s.line {
            let _ = write!(xml, " w:line=\"{line}\" w:lineRule=\"auto\"");
        }
        xml.push_str("/>");
    }
    if let Some(align) = p.align {
        let _ = write!(xml, "<w:jc w:val=\"{}\"/>", jc_value(align));
    }
    if let Some(page) = section_end {
        write_sect_pr(xml, page);
    }
    xml.push_str("</w:pPr>");

    for child in &p.children {
        match child {
            Inline::Text(run) => write_run(xml, run),
            Inline::PageBreak => xml.push_str("<w:r><w:br w:type=\"page\"/></w:r>"),
            Inline::Drawing(d) => {
                *drawing_id += 1;
                write_drawing(xml, d, *drawing_id);
            }
        }
    }
    xml.push_str("</w:p>");
}

fn write_run(xml: &mut String, run: &TextRun) {
    xml.push_str("<w:r><w:rPr>");
    if run.bold {
        xml.push_str("<w:b/><w:bCs/>");
    }
    if run.italic {
        xml.push_str("<w:i/><w:iCs/>");
    }
    if let Some(color) = run.color {
        let _ = write!(xml, "<w:color w:val=\"{color}\"/>");
    }
    if let Some(size) = run.size {
        let _ = write!(xml, "<w:sz w:val=\"{size}\"/><w:szCs w:val=\"{size}\"/>");
    }
    if run.underline {
        xml.push_str("<w:u w:val=\"single\"/>");
    }
    let _ = write!(
        xml,
        "</w:rPr><w:t xml:space=\"preserve\">{}</w:t></w:r>",
        xml_text(&run.text)
    );
}

/// Escape text for element content, dropping characters XML 1.0 cannot
/// carry at all (C0 controls other than tab/newline/CR, U+FFFE, U+FFFF).
fn xml_text(text: &str) -> String {
    let is_xml_char =
        |c: char| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}');
    if text.chars().all(is_xml_char) {
        return escape(text).into_owned();
    }
    let kept: String = text.chars().filter(|&c| is_xml_char(c)).collect();
    escape(kept.as_str()).into_owned()
}

fn write_drawing(xml: &mut String, d: &Drawing, id: u32) {
    let cx = d.width_px as u64 * EMU_PER_PX;
    let cy = d.height_px as u64 * EMU_PER_PX;
    let rel = media_rel_id(d.media);
    let _ = write!(
        xml,
        concat!(
            "<w:r><w:drawing><wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">",
            "<wp:extent cx=\"{cx}\" cy=\"{cy}\"/>",
            "<wp:docPr id=\"{id}\" name=\"Picture {id}\"/>",
            "<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect=\"1\"/></wp:cNvGraphicFramePr>",
            "<a:graphic><a:graphicData uri=\"{ns_pic}\"><pic:pic>",
            "<pic:nvPicPr><pic:cNvPr id=\"{id}\" name=\"Picture {id}\"/><pic:cNvPicPr/></pic:nvPicPr>",
            "<pic:blipFill><a:blip r:embed=\"{rel}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>",
            "<pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
            "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr>",
            "</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"
        ),
        cx = cx,
        cy = cy,
        id = id,
        rel = rel,
        ns_pic = NS_PIC
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut s = String::new();
        part.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn escapes_text_and_metadata() {
        let mut pkg = DocxPackage::new("Tom & Jerry <2>", Some("A \"B\"".into()));
        let mut section = Section::new(PageSetup::A4);
        section.push(Paragraph::new().run(TextRun::new("x < y & z")));
        pkg.sections.push(section);

        let bytes = pkg.to_bytes().unwrap();
        let doc = read_part(&bytes, "word/document.xml");
        assert!(doc.contains("x &lt; y &amp; z"));
        let core = read_part(&bytes, "docProps/core.xml");
        assert!(core.contains("<dc:title>Tom &amp; Jerry &lt;2&gt;</dc:title>"));
        assert!(core.contains("<dc:creator>A &quot;B&quot;</dc:creator>"));
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(xml_text("a\u{1}b\u{b}c\u{FFFF}"), "abc");
        assert_eq!(xml_text("tab\tok & <fine>"), "tab\tok &amp; &lt;fine&gt;");

        let mut pkg = DocxPackage::new("Bad\u{8}Title", Some("Auth\u{1f}or".into()));
        let mut section = Section::new(PageSetup::A4);
        section.push(Paragraph::new().run(TextRun::new("a\u{1}b")));
        pkg.sections.push(section);
        let bytes = pkg.to_bytes().unwrap();

        let doc = read_part(&bytes, "word/document.xml");
        assert!(!doc.contains('\u{1}'));
        assert!(doc.contains(">ab</w:t>"));
        let core = read_part(&bytes, "docProps/core.xml");
        assert!(core.contains("<dc:title>BadTitle</dc:title>"));
        assert!(core.contains("<dc:creator>Author</dc:creator>"));
        let mut reader = quick_xml::Reader::from_str(&doc);
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("document.xml does not parse: {e}"),
            }
        }
    }

    #[test]
    fn content_types_cover_every_media_kind() {
        let types = DocxPackage::new("T", None).content_types_xml();
        assert!(types.contains("<Default Extension=\"jpeg\" ContentType=\"image/jpeg\"/>"));
        assert!(types.contains("<Default Extension=\"gif\" ContentType=\"image/gif\"/>"));
    }

    #[test]
    fn non_final_section_properties_live_in_last_paragraph() {
        let mut pkg = DocxPackage::new("T", None);
        let mut cover = Section::new(PageSetup::LETTER.with_margin(0));
        cover.push(Paragraph::new().run(TextRun::new("CoverText")));
        let mut body = Section::new(PageSetup::A4);
        body.push(Paragraph::new().run(TextRun::new("BodyText")));
        pkg.sections = vec![cover, body];

        let doc = pkg.document_xml();
        assert_eq!(doc.matches("<w:sectPr>").count(), 2);
        let first = doc.find("<w:sectPr>").unwrap();
        let cover_text = doc.find("CoverText").unwrap();
        let body_text = doc.find("BodyText").unwrap();
        assert!(cover_text < first && first < body_text);
        assert!(doc.contains("<w:pgSz w:w=\"12240\" w:h=\"15840\"/>"));
        assert!(doc.contains("w:top=\"0\""));
        assert!(doc.ends_with("</w:sectPr></w:body></w:document>"));
    }

    #[test]
    fn media_parts_and_relationships() {
        let mut pkg = DocxPackage::new("T", None);
        let png = pkg.add_media(vec![1, 2, 3], ImageKind::Png);
        let jpg = pkg.add_media(vec![4, 5], ImageKind::Jpeg);
        let mut section = Section::new(PageSetup::A4);
        for media in [png, jpg] {
            section.push(Paragraph::new().child(Inline::Drawing(Drawing {
                media,
                width_px: 100,
                height_px: 50,
            })));
        }
        pkg.sections.push(section);

        let bytes = pkg.to_bytes().unwrap();
        let rels = read_part(&bytes, "word/_rels/document.xml.rels");
        assert!(rels.contains("Id=\"rId3\""));
        assert!(rels.contains("Target=\"media/image2.jpeg\""));
        let doc = read_part(&bytes, "word/document.xml");
        assert!(doc.contains("cx=\"952500\" cy=\"476250\""));
        assert!(doc.contains("r:embed=\"rId4\""));

        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes[..])).unwrap();
        let mut data = Vec::new();
        archive
            .by_name("word/media/image1.png")
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[test]
    fn paragraph_properties_in_schema_order() {
        let mut xml = String::new();
        let mut id = 0;
        let mut p = Paragraph::new()
            .style("Heading1")
            .bullet(1)
            .spacing(Spacing::new(400, 200))
            .align(Alignment::Justify);
        p.page_break_before = true;
        write_paragraph(&mut xml, &p, None, &mut id);
        let order = [
            "<w:pStyle",
            "<w:pageBreakBefore/>",
            "<w:numPr>",
            "<w:spacing w:before=\"400\" w:after=\"200\"/>",
            "<w:jc w:val=\"both\"/>",
        ];
        let positions: Vec<usize> = order.iter().map(|s| xml.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{xml}");
    }

    #[test]
    fn all_required_parts_present() {
        let bytes = DocxPackage::new("T", None).to_bytes().unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(&bytes[..])).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/document.xml",
            "word/styles.xml",
            "word/numbering.xml",
            "word/_rels/document.xml.rels",
        ] {
            assert!(names.contains(&part), "missing {part}");
        }
    }
}
