//! Font metrics, word wrapping and string encoding for PDF text.
//!
//! The PDF renderer draws with the four standard Helvetica faces, which
//! every viewer ships, so nothing is embedded. Laying text out still needs
//! their advance widths (for wrapping and for centered/right alignment) and
//! a mapping from Unicode to the single-byte WinAnsiEncoding the fonts are
//! declared with. Widths are in 1/1000 em, straight from the Adobe AFM files.

/// One of the four standard Helvetica faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PdfFont {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
}

impl PdfFont {
    pub const ALL: [PdfFont; 4] = [
        PdfFont::Regular,
        PdfFont::Bold,
        PdfFont::Oblique,
        PdfFont::BoldOblique,
    ];

    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => PdfFont::BoldOblique,
            (true, false) => PdfFont::Bold,
            (false, true) => PdfFont::Oblique,
            (false, false) => PdfFont::Regular,
        }
    }

    /// PostScript name used as `/BaseFont`.
    pub fn base_font(self) -> &'static str {
        match self {
            PdfFont::Regular => "Helvetica",
            PdfFont::Bold => "Helvetica-Bold",
            PdfFont::Oblique => "Helvetica-Oblique",
            PdfFont::BoldOblique => "Helvetica-BoldOblique",
        }
    }

    /// Key in the page `/Font` resource dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            PdfFont::Regular => "F1",
            PdfFont::Bold => "F2",
            PdfFont::Oblique => "F3",
            PdfFont::BoldOblique => "F4",
        }
    }

    fn is_bold(self) -> bool {
        matches!(self, PdfFont::Bold | PdfFont::BoldOblique)
    }
}

// ── Metrics ──────────────────────────────────────────────────────────────

/// Helvetica widths for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold widths for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

fn glyph_width(ch: char, font: PdfFont) -> u16 {
    let bold = font.is_bold();
    let code = ch as u32;
    if (32..=126).contains(&code) {
        let idx = (code - 32) as usize;
        return if bold {
            HELVETICA_BOLD[idx]
        } else {
            HELVETICA[idx]
        };
    }
    match ch {
        '\u{a0}' => 278,
        '•' => 350,
        '–' => 556,
        '—' => 1000,
        '…' => 1000,
        '‘' | '’' => {
            if bold {
                278
            } else {
                222
            }
        }
        '“' | '”' => {
            if bold {
                500
            } else {
                333
            }
        }
        '€' => 556,
        // Accented letters are close enough to their base glyph.
        c if c.is_uppercase() => {
            if bold {
                722
            } else {
                667
            }
        }
        c if c.is_alphabetic() => {
            if bold {
                611
            } else {
                556
            }
        }
        _ => 556,
    }
}

/// Advance width of `text` in points.
pub fn text_width(text: &str, font: PdfFont, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| glyph_width(c, font) as u32).sum();
    units as f32 * size / 1000.0
}

// ── Wrapping ─────────────────────────────────────────────────────────────

/// Greedy word wrap to `max_width` points.
///
/// Words wider than a whole line are broken between characters. The
/// returned lines never start or end with a space.
pub fn wrap_text(text: &str, font: PdfFont, size: f32, max_width: f32) -> Vec<String> {
    let space = text_width(" ", font, size);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0f32;

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let width = text_width(word, font, size);
        if !current.is_empty() && current_width + space + width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += space + width;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if width <= max_width {
            current.push_str(word);
            current_width = width;
        } else {
            current_width = 0.0;
            for ch in word.chars() {
                let w = text_width(ch.encode_utf8(&mut [0; 4]), font, size);
                if !current.is_empty() && current_width + w > max_width {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0.0;
                }
                current.push(ch);
                current_width += w;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Encode `text` as WinAnsiEncoding bytes; unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(ch: char) -> u8 {
    let code = ch as u32;
    if (0x20..0x7f).contains(&code) || (0xa0..=0xff).contains(&code) {
        return code as u8;
    }
    match ch {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => b'?',
    }
}
