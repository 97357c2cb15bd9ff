//! HTML → [`ParsedElement`] sequence.
//!
//! The editor produces a small, predictable HTML dialect: headings,
//! paragraphs, bullet and numbered lists, inline bold/italic/underline,
//! images (bare, inside paragraphs, or wrapped in `figure`), and `br` for
//! blank lines. This module pattern-matches that dialect into the closed
//! element set both renderers understand. Anything else is walked for its
//! children so text is never silently lost.
//!
//! ## Why scraper?
//!
//! Chapter HTML comes from a browser editor and is not guaranteed to be
//! well formed. `scraper` wraps html5ever, which repairs markup exactly the
//! way a browser does and decodes every named and numeric entity, so the
//! text we extract is the text the author saw.

use crate::element::{
    Alignment, ElementKind, ImageRef, ParsedElement, Run, DEFAULT_IMAGE_HEIGHT,
    DEFAULT_IMAGE_WIDTH,
};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

static TEXT_ALIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)text-align\s*:\s*(left|center|right|justify)").expect("valid regex")
});

static PAGE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:page-break-before|break-before)\s*:\s*(?:always|page)")
        .expect("valid regex")
});

static LEADING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("valid regex"));

/// Parse chapter HTML into structural elements, in document order.
///
/// Pure and deterministic: the same input always yields the same output.
pub fn parse(html: &str) -> Vec<ParsedElement> {
    let document = Html::parse_fragment(html);
    let mut blocks = BlockParser::default();
    blocks.children(document.root_element(), 0);
    blocks.out
}

#[derive(Default)]
struct BlockParser {
    out: Vec<ParsedElement>,
}

impl BlockParser {
    fn children(&mut self, parent: ElementRef<'_>, list_level: u32) {
        for child in parent.children() {
            if let Some(el) = ElementRef::wrap(child) {
                self.element(el, list_level);
            } else if let Some(text) = child.value().as_text() {
                self.loose_text(text);
            }
        }
    }

    /// A text node outside any recognized block becomes its own paragraph.
    fn loose_text(&mut self, text: &str) {
        let collapsed = collapse_whitespace(text);
        if !collapsed.is_empty() {
            self.out.push(ParsedElement::text(
                ElementKind::Paragraph,
                vec![Run::plain(collapsed)],
                Alignment::Left,
            ));
        }
    }

    fn element(&mut self, el: ElementRef<'_>, list_level: u32) {
        let start = self.out.len();
        let name = el.value().name();

        match name {
            "img" => self.out.push(image_element(el, Alignment::Center)),
            "h1" | "h2" | "h3" => {
                let kind = match name {
                    "h1" => ElementKind::Heading1,
                    "h2" => ElementKind::Heading2,
                    _ => ElementKind::Heading3,
                };
                self.out
                    .push(ParsedElement::text(kind, inline_runs(el), alignment(el)));
            }
            "p" | "div" => {
                let align = alignment(el);
                for img in descendant_images(el) {
                    self.out.push(image_element(img, align));
                }
                let runs = inline_runs(el);
                if runs.iter().any(|r| !r.text.trim().is_empty()) {
                    self.out
                        .push(ParsedElement::text(ElementKind::Paragraph, runs, align));
                }
            }
            "ul" | "ol" => {
                let kind = if name == "ul" {
                    ElementKind::ListItem
                } else {
                    ElementKind::OrderedItem
                };
                let items = el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| c.value().name() == "li");
                for (i, li) in items.enumerate() {
                    let mut item = ParsedElement::text(kind, inline_runs(li), alignment(li));
                    item.list_level = list_level;
                    item.list_start = i == 0;
                    self.out.push(item);
                }
            }
            "br" => self.out.push(ParsedElement::text(
                ElementKind::Paragraph,
                Vec::new(),
                Alignment::Left,
            )),
            "figure" => {
                for img in descendant_images(el) {
                    self.out.push(image_element(img, Alignment::Center));
                }
            }
            "script" | "style" | "template" | "head" => {}
            _ => self.children(el, list_level),
        }

        if page_break_hint(el) {
            if let Some(first) = self.out.get_mut(start) {
                first.page_break_before = true;
            }
        }
    }
}

// ── Attributes ───────────────────────────────────────────────────────────

/// Inline `text-align` wins over utility classes; nothing means left.
fn alignment(el: ElementRef<'_>) -> Alignment {
    if let Some(caps) = el.value().attr("style").and_then(|s| TEXT_ALIGN.captures(s)) {
        return match caps[1].to_ascii_lowercase().as_str() {
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            "justify" => Alignment::Justify,
            _ => Alignment::Left,
        };
    }
    let class = el.value().attr("class").unwrap_or("");
    if class.contains("text-center") {
        Alignment::Center
    } else if class.contains("text-right") {
        Alignment::Right
    } else if class.contains("text-justify") {
        Alignment::Justify
    } else {
        Alignment::Left
    }
}

fn page_break_hint(el: ElementRef<'_>) -> bool {
    el.value()
        .attr("style")
        .is_some_and(|s| PAGE_BREAK.is_match(s))
}

fn dimension(el: ElementRef<'_>, attr: &str) -> Option<u32> {
    let raw = el.value().attr(attr)?;
    let caps = LEADING_DIGITS.captures(raw)?;
    caps[1].parse().ok().filter(|&v: &u32| v > 0)
}

fn image_element(img: ElementRef<'_>, align: Alignment) -> ParsedElement {
    let image = ImageRef {
        src: img.value().attr("src").unwrap_or("").trim().to_string(),
        width: dimension(img, "width").unwrap_or(DEFAULT_IMAGE_WIDTH),
        height: dimension(img, "height").unwrap_or(DEFAULT_IMAGE_HEIGHT),
    };
    ParsedElement::image(image, align)
}

fn descendant_images<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|d| d.value().name() == "img")
}

// ── Inline runs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    bold: bool,
    italic: bool,
    underline: bool,
}

/// Accumulates runs while collapsing whitespace across run boundaries.
///
/// A collapsed space is attached to the run that precedes it, so
/// `a <b>b</b>` yields `"a "` + bold `"b"`.
#[derive(Default)]
struct RunBuilder {
    runs: Vec<Run>,
    pending_space: bool,
}

impl RunBuilder {
    fn push_text(&mut self, text: &str, flags: Flags) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                self.space();
                continue;
            }
            if self.pending_space {
                if let Some(last) = self.runs.last_mut() {
                    last.text.push(' ');
                }
                self.pending_space = false;
            }
            match self.runs.last_mut() {
                Some(last) if last_flags(last) == flags => last.text.push(ch),
                _ => self.runs.push(Run {
                    text: ch.to_string(),
                    bold: flags.bold,
                    italic: flags.italic,
                    underline: flags.underline,
                }),
            }
        }
    }

    /// Record a word break; leading breaks are dropped.
    fn space(&mut self) {
        if !self.runs.is_empty() {
            self.pending_space = true;
        }
    }

    fn finish(self) -> Vec<Run> {
        self.runs
    }
}

fn last_flags(run: &Run) -> Flags {
    Flags {
        bold: run.bold,
        italic: run.italic,
        underline: run.underline,
    }
}

fn inline_runs(el: ElementRef<'_>) -> Vec<Run> {
    let mut builder = RunBuilder::default();
    walk_inline(el, Flags::default(), &mut builder);
    builder.finish()
}

fn walk_inline(parent: ElementRef<'_>, flags: Flags, builder: &mut RunBuilder) {
    for child in parent.children() {
        if let Some(text) = child.value().as_text() {
            builder.push_text(text, flags);
            continue;
        }
        let Some(el) = ElementRef::wrap(child) else {
            continue;
        };
        let mut flags = flags;
        match el.value().name() {
            "img" => continue,
            "br" => {
                builder.space();
                continue;
            }
            "strong" | "b" => flags.bold = true,
            "em" | "i" => flags.italic = true,
            "u" => flags.underline = true,
            "p" | "div" | "li" | "ul" | "ol" | "h1" | "h2" | "h3" | "blockquote" => {
                builder.space();
                walk_inline(el, flags, builder);
                builder.space();
                continue;
            }
            _ => {}
        }
        walk_inline(el, flags, builder);
    }
}

/// Collapse every whitespace sequence to one space and trim both ends.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(elements: &[ParsedElement]) -> Vec<ElementKind> {
        elements.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn headings_and_paragraphs_in_order() {
        let els = parse("<h1>One</h1><p>Body</p><h2>Two</h2><h3>Three</h3>");
        assert_eq!(
            kinds(&els),
            vec![
                ElementKind::Heading1,
                ElementKind::Paragraph,
                ElementKind::Heading2,
                ElementKind::Heading3
            ]
        );
        assert_eq!(els[1].plain_text(), "Body");
    }

    #[test]
    fn nested_formatting_unions_flags() {
        let els = parse("<p>plain <strong>bold <em>both</em></strong> <u>under</u></p>");
        assert_eq!(els.len(), 1);
        let runs = &els[0].runs;
        assert_eq!(runs[0], Run::plain("plain "));
        assert_eq!(runs[1].text, "bold ");
        assert!(runs[1].bold && !runs[1].italic);
        assert_eq!(runs[2].text, "both ");
        assert!(runs[2].bold && runs[2].italic);
        assert_eq!(runs[3].text, "under");
        assert!(runs[3].underline && !runs[3].bold);
        assert_eq!(els[0].plain_text(), "plain bold both under");
    }

    #[test]
    fn entities_decoded_and_whitespace_collapsed() {
        let els = parse("<p>  Fish &amp;\n\n   chips&nbsp;&nbsp;&lt;3  </p>");
        assert_eq!(els[0].plain_text(), "Fish & chips <3");
    }

    #[test]
    fn whitespace_only_paragraph_is_dropped() {
        let els = parse("<p>   </p><p><strong> </strong></p><div>\n</div>");
        assert!(els.is_empty(), "got {els:?}");
    }

    #[test]
    fn style_alignment_wins_over_class() {
        let els = parse(
            r#"<p style="text-align: right" class="text-center">a</p>
               <p class="prose text-center">b</p>
               <h2 class="text-justify">c</h2>
               <p>d</p>"#,
        );
        let aligns: Vec<_> = els.iter().map(|e| e.align).collect();
        assert_eq!(
            aligns,
            vec![
                Alignment::Right,
                Alignment::Center,
                Alignment::Justify,
                Alignment::Left
            ]
        );
    }

    #[test]
    fn images_inside_paragraph_come_first_with_container_alignment() {
        let els = parse(
            r#"<p style="text-align:right">see <img src="a.png" width="640" height="480"> here</p>"#,
        );
        assert_eq!(kinds(&els), vec![ElementKind::Image, ElementKind::Paragraph]);
        let img = els[0].image.as_ref().unwrap();
        assert_eq!(img.src, "a.png");
        assert_eq!((img.width, img.height), (640, 480));
        assert_eq!(els[0].align, Alignment::Right);
        assert_eq!(els[1].plain_text(), "see here");
    }

    #[test]
    fn figure_and_bare_images_are_centered_with_defaults() {
        let els = parse(r#"<figure class="text-right"><img src="f.jpg"><figcaption>cap</figcaption></figure><img>"#);
        assert_eq!(kinds(&els), vec![ElementKind::Image, ElementKind::Image]);
        assert!(els.iter().all(|e| e.align == Alignment::Center));
        let second = els[1].image.as_ref().unwrap();
        assert_eq!(second.src, "");
        assert_eq!((second.width, second.height), (400, 300));
    }

    #[test]
    fn lists_take_direct_children_only() {
        let els = parse("<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul><ol><li>one</li><li>two</li></ol>");
        assert_eq!(
            kinds(&els),
            vec![
                ElementKind::ListItem,
                ElementKind::ListItem,
                ElementKind::OrderedItem,
                ElementKind::OrderedItem
            ]
        );
        assert_eq!(els[1].plain_text(), "b c");
        assert!(els[0].list_start && !els[1].list_start);
        assert!(els[2].list_start && !els[3].list_start);
        assert!(els.iter().all(|e| e.list_level == 0));
    }

    #[test]
    fn br_becomes_blank_paragraph() {
        let els = parse("<p>a</p><br><p>b</p>");
        assert_eq!(els.len(), 3);
        assert_eq!(els[1].kind, ElementKind::Paragraph);
        assert!(els[1].runs.is_empty());
        assert!(els[1].is_blank());
    }

    #[test]
    fn inline_br_separates_words() {
        let els = parse("<p>line one<br>line two</p>");
        assert_eq!(els[0].plain_text(), "line one line two");
    }

    #[test]
    fn unknown_containers_recurse() {
        let els = parse("<blockquote>loose text<p>inner</p><section><h2>deep</h2></section></blockquote>");
        assert_eq!(
            kinds(&els),
            vec![
                ElementKind::Paragraph,
                ElementKind::Paragraph,
                ElementKind::Heading2
            ]
        );
        assert_eq!(els[0].plain_text(), "loose text");
    }

    #[test]
    fn top_level_text_becomes_paragraph() {
        let els = parse("  hello   world  <p>x</p>");
        assert_eq!(els[0].runs, vec![Run::plain("hello world")]);
        assert_eq!(els[1].plain_text(), "x");
    }

    #[test]
    fn page_break_hint_marks_first_element() {
        let els = parse(
            r#"<h1 style="text-align: center; page-break-before: auto;">A</h1><p>x</p>
               <h1 style="text-align: center; page-break-before: always; margin-top: 2em;">B</h1>"#,
        );
        assert!(!els[0].page_break_before);
        assert!(els[2].page_break_before);
        assert_eq!(els[2].align, Alignment::Center);
    }

    #[test]
    fn script_content_is_ignored() {
        let els = parse("<script>var x = 1;</script><p>ok</p>");
        assert_eq!(els.len(), 1);
    }

    #[test]
    fn parsing_is_idempotent() {
        let html = r#"<h1>T</h1><p class="text-center"><b>a</b> b<img src="x.gif"></p><ol><li>1</li></ol><br>"#;
        assert_eq!(parse(html), parse(html));
    }

    #[test]
    fn collapse_whitespace_trims() {
        assert_eq!(collapse_whitespace("\n  a \t b  "), "a b");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
