//! Pipeline stages for turning chapter HTML into a finished document.
//!
//! Each submodule implements exactly one step. Keeping stages separate
//! makes each independently testable and lets the two output formats share
//! everything up to layout.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ image (locators ──▶ bytes) ──┐
//! parse ─────┤                                 ├──▶ pdf  | docx
//! (HTML)     └──▶ cover (snapshot | compose) ──┘
//! ```
//!
//! 1. [`parse`] turns combined chapter HTML into a flat list of
//!    [`crate::element::ParsedElement`]s
//! 2. [`image`] resolves image locators with a fallback chain under one
//!    deadline; the only stage with network I/O
//! 3. [`cover`] decides what goes on the first page
//! 4. [`pdf`] / [`docx`] lay the elements out and serialize; serialization
//!    runs in `spawn_blocking` because it is CPU-bound
//!
//! [`text`] holds the Helvetica metrics the PDF layout measures with.

pub mod cover;
pub mod docx;
pub mod image;
pub mod parse;
pub mod pdf;
pub mod text;

use crate::model::CoverKind;

/// Bytes and counters produced by one renderer pass.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    /// Page count; only the PDF renderer knows it.
    pub pages: Option<usize>,
    pub elements: usize,
    pub images_embedded: usize,
    pub images_skipped: usize,
    pub cover: CoverKind,
}
