//! Structural elements produced by the HTML parser.
//!
//! A [`ParsedElement`] is one semantic block of chapter content. Both
//! renderers consume the same sequence, so everything either renderer needs
//! to know about a block (kind, formatted runs, alignment, list level, image
//! reference) lives here and nothing else about the source HTML survives.

use serde::{Deserialize, Serialize};

/// Intrinsic width used when the markup does not say.
pub const DEFAULT_IMAGE_WIDTH: u32 = 400;
/// Intrinsic height used when the markup does not say.
pub const DEFAULT_IMAGE_HEIGHT: u32 = 300;

/// Closed set of block kinds the renderers know how to lay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    ListItem,
    OrderedItem,
    Image,
}

impl ElementKind {
    pub fn is_heading(self) -> bool {
        matches!(
            self,
            ElementKind::Heading1 | ElementKind::Heading2 | ElementKind::Heading3
        )
    }

    pub fn is_list(self) -> bool {
        matches!(self, ElementKind::ListItem | ElementKind::OrderedItem)
    }
}

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// A text fragment with a fixed combination of formatting flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Where an image comes from and how large the markup says it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// URL, local path or `data:` URI. May be empty.
    pub src: String,
    pub width: u32,
    pub height: u32,
}

/// One semantic block of chapter content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedElement {
    pub kind: ElementKind,
    /// Formatted text; empty for images and forced blank lines.
    pub runs: Vec<Run>,
    /// Set only for [`ElementKind::Image`].
    pub image: Option<ImageRef>,
    pub align: Alignment,
    /// Nesting level for list kinds, 0 otherwise.
    pub list_level: u32,
    /// The block asked to start on a fresh page.
    pub page_break_before: bool,
    /// First item of a `ul`/`ol`; restarts ordered numbering.
    pub list_start: bool,
}

impl ParsedElement {
    pub fn text(kind: ElementKind, runs: Vec<Run>, align: Alignment) -> Self {
        Self {
            kind,
            runs,
            image: None,
            align,
            list_level: 0,
            page_break_before: false,
            list_start: false,
        }
    }

    pub fn image(image: ImageRef, align: Alignment) -> Self {
        Self {
            kind: ElementKind::Image,
            runs: Vec::new(),
            image: Some(image),
            align,
            list_level: 0,
            page_break_before: false,
            list_start: false,
        }
    }

    /// Concatenated run text, styling ignored.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// True when the block has no visible characters.
    pub fn is_blank(&self) -> bool {
        self.runs.iter().all(|r| r.text.trim().is_empty())
    }

    /// Every run is bold (and there is at least one run).
    pub fn all_bold(&self) -> bool {
        !self.runs.is_empty() && self.runs.iter().all(|r| r.bold)
    }

    /// Every run is italic (and there is at least one run).
    pub fn all_italic(&self) -> bool {
        !self.runs.is_empty() && self.runs.iter().all(|r| r.italic)
    }
}

/// Numbering state for ordered items during one render pass.
///
/// Restarts at every bullet item, at the first item of a new list, and as
/// soon as anything other than an ordered item follows a run of them.
#[derive(Debug, Default)]
pub struct ListCounter {
    current: u32,
}

impl ListCounter {
    /// Feed the next element; returns the number to print for ordered items.
    pub fn advance(&mut self, element: &ParsedElement) -> Option<u32> {
        match element.kind {
            ElementKind::OrderedItem => {
                if element.list_start {
                    self.current = 0;
                }
                self.current += 1;
                Some(self.current)
            }
            _ => {
                self.current = 0;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(list_start: bool) -> ParsedElement {
        let mut e = ParsedElement::text(
            ElementKind::OrderedItem,
            vec![Run::plain("x")],
            Alignment::Left,
        );
        e.list_start = list_start;
        e
    }

    #[test]
    fn all_bold_requires_every_run() {
        let mut e = ParsedElement::text(
            ElementKind::Paragraph,
            vec![
                Run {
                    text: "a".into(),
                    bold: true,
                    ..Run::default()
                },
                Run::plain("b"),
            ],
            Alignment::Left,
        );
        assert!(!e.all_bold());
        e.runs[1].bold = true;
        assert!(e.all_bold());
        e.runs.clear();
        assert!(!e.all_bold());
    }

    #[test]
    fn counter_counts_consecutive_ordered_items() {
        let mut c = ListCounter::default();
        assert_eq!(c.advance(&ordered(true)), Some(1));
        assert_eq!(c.advance(&ordered(false)), Some(2));
        assert_eq!(c.advance(&ordered(false)), Some(3));
    }

    #[test]
    fn counter_resets_after_other_element() {
        let mut c = ListCounter::default();
        c.advance(&ordered(true));
        c.advance(&ordered(false));
        let para = ParsedElement::text(ElementKind::Paragraph, vec![], Alignment::Left);
        assert_eq!(c.advance(&para), None);
        assert_eq!(c.advance(&ordered(false)), Some(1));
    }

    #[test]
    fn counter_resets_on_new_list() {
        let mut c = ListCounter::default();
        c.advance(&ordered(true));
        c.advance(&ordered(false));
        assert_eq!(c.advance(&ordered(true)), Some(1));
    }

    #[test]
    fn counter_resets_on_bullet() {
        let mut c = ListCounter::default();
        c.advance(&ordered(true));
        let bullet = ParsedElement::text(ElementKind::ListItem, vec![], Alignment::Left);
        assert_eq!(c.advance(&bullet), None);
        assert_eq!(c.advance(&ordered(false)), Some(1));
    }
}
