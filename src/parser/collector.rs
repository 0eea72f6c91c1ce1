//! Per-page span collection from content streams.
//!
//! Interprets the text operators of a page's content stream (BT/ET, Tf,
//! Td/TD/Tm/T*/TL, Tj/TJ/'/") along with the q/Q/cm graphics state, and
//! reports one [`TextSpan`] per text-showing operator, in content-stream
//! order. Positions are mapped through the current transformation matrix
//! and converted from PDF user space (origin bottom-left) to top-down
//! page coordinates.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{BoundingBox, FontFlags, TextSpan};

use super::backend::{get_number_from_value, PageId, PdfBackend, PdfValue};

/// Ascender share of the font size above the baseline.
const ASCENT: f32 = 0.8;
/// Descender share of the font size below the baseline.
const DESCENT: f32 = 0.2;
/// TJ adjustment (thousandths of text space) that reads as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Reads pages of a document into text spans.
pub struct PageSpanCollector<'a, B: PdfBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: PdfBackend + ?Sized> PageSpanCollector<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Collect the spans of one page (1-indexed).
    ///
    /// Any failure to read or decode the page is reported as
    /// [`Error::PageDecode`]; callers skip the page and continue.
    pub fn collect(&self, page_number: u32) -> Result<Vec<TextSpan>> {
        let pages = self.backend.pages();
        let page_id = *pages.get(&page_number).ok_or_else(|| Error::PageDecode {
            page: page_number,
            reason: format!("page does not exist ({} pages)", pages.len()),
        })?;
        self.collect_page(page_number, page_id)
            .map_err(|e| match e {
                Error::PageDecode { .. } => e,
                other => Error::PageDecode {
                    page: page_number,
                    reason: other.to_string(),
                },
            })
    }

    fn collect_page(&self, page_number: u32, page_id: PageId) -> Result<Vec<TextSpan>> {
        let fonts: HashMap<Vec<u8>, String> = self
            .backend
            .page_fonts(page_id)?
            .into_iter()
            .map(|f| (f.name, f.base_font))
            .collect();
        let (_, page_height) = self.backend.page_size(page_id);
        let content = self.backend.page_content(page_id)?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let ops = self.backend.decode_content(&content)?;

        let mut state = TextState::new(page_number, page_height);
        let mut spans = Vec::new();

        for op in ops {
            match op.operator.as_str() {
                "q" => state.saved.push(state.ctm),
                "Q" => {
                    if let Some(ctm) = state.saved.pop() {
                        state.ctm = ctm;
                    }
                }
                "cm" => {
                    if let Some(m) = Transform::from_operands(&op.operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    state.in_text = true;
                    state.matrix = TextMatrix::default();
                }
                "ET" => state.in_text = false,
                "Tf" => {
                    if op.operands.len() >= 2 {
                        if let PdfValue::Name(name) = &op.operands[0] {
                            state.font_base = fonts
                                .get(name)
                                .cloned()
                                .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                            state.font_key = name.clone();
                        }
                        state.font_size = get_number_from_value(&op.operands[1]).unwrap_or(12.0);
                    }
                }
                "TL" => {
                    if let Some(leading) = op.operands.first().and_then(get_number_from_value) {
                        state.matrix.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    if op.operands.len() >= 2 {
                        let tx = get_number_from_value(&op.operands[0]).unwrap_or(0.0);
                        let ty = get_number_from_value(&op.operands[1]).unwrap_or(0.0);
                        if op.operator == "TD" {
                            state.matrix.leading = -ty;
                        }
                        state.matrix.translate(tx, ty);
                    }
                }
                "Tm" => {
                    if op.operands.len() >= 6 {
                        let n = |i: usize, default: f32| {
                            get_number_from_value(&op.operands[i]).unwrap_or(default)
                        };
                        state.matrix.set(
                            n(0, 1.0),
                            n(1, 0.0),
                            n(2, 0.0),
                            n(3, 1.0),
                            n(4, 0.0),
                            n(5, 0.0),
                        );
                    }
                }
                "T*" => state.matrix.next_line(),
                "Tj" => {
                    if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                        let text = self.backend.decode_text(page_id, &state.font_key, bytes);
                        state.emit(text, &mut spans);
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(items)) = op.operands.first() {
                        let text = self.decode_tj(page_id, &state.font_key, items);
                        state.emit(text, &mut spans);
                    }
                }
                "'" | "\"" => {
                    state.matrix.next_line();
                    let text_idx = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(PdfValue::Str(bytes)) = op.operands.get(text_idx) {
                        let text = self.backend.decode_text(page_id, &state.font_key, bytes);
                        state.emit(text, &mut spans);
                    }
                }
                _ => {}
            }
        }

        log::debug!("Page {}: collected {} spans", page_number, spans.len());
        Ok(spans)
    }

    /// Decode a TJ array, turning large negative adjustments into spaces
    /// outside spaceless scripts.
    fn decode_tj(&self, page_id: PageId, font_key: &[u8], items: &[PdfValue]) -> String {
        let mut combined = String::new();
        for item in items {
            match item {
                PdfValue::Str(bytes) => {
                    combined.push_str(&self.backend.decode_text(page_id, font_key, bytes));
                }
                PdfValue::Integer(_) | PdfValue::Real(_) => {
                    let adjustment = -get_number_from_value(item).unwrap_or(0.0);
                    let ends_with_space =
                        combined.ends_with(' ') || combined.ends_with('\u{00A0}');
                    if adjustment > TJ_SPACE_THRESHOLD && !ends_with_space {
                        if let Some(c) = combined.chars().last() {
                            if !is_spaceless_script_char(c) {
                                combined.push(' ');
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        combined
    }
}

/// Text state and transformation matrix tracked while walking a page.
struct TextState {
    page_number: u32,
    page_height: f32,
    in_text: bool,
    font_key: Vec<u8>,
    font_base: String,
    font_size: f32,
    matrix: TextMatrix,
    ctm: Transform,
    saved: Vec<Transform>,
}

impl TextState {
    fn new(page_number: u32, page_height: f32) -> Self {
        Self {
            page_number,
            page_height,
            in_text: false,
            font_key: Vec::new(),
            font_base: String::new(),
            font_size: 12.0,
            matrix: TextMatrix::default(),
            ctm: Transform::default(),
            saved: Vec::new(),
        }
    }

    fn emit(&self, text: String, spans: &mut Vec<TextSpan>) {
        if !self.in_text || text.trim().is_empty() {
            return;
        }
        let (tx, ty) = self.matrix.position();
        let (x, baseline) = self.ctm.apply(tx, ty);
        let size = self.font_size * self.matrix.scale_under(&self.ctm);
        let width = estimate_width(&text, size);
        let bbox = BoundingBox::new(
            x,
            self.page_height - (baseline + size * ASCENT),
            x + width,
            self.page_height - (baseline - size * DESCENT),
        );
        spans.push(TextSpan::new(
            text,
            size,
            FontFlags::from_font_name(&self.font_base),
            bbox,
            self.page_number,
        ));
    }
}

/// Approximate advance width: half an em per character, a full em for
/// CJK ideographs and kana.
pub(crate) fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .map(|c| {
            if is_spaceless_script_char(c) {
                font_size
            } else {
                font_size * 0.5
            }
        })
        .sum()
}

/// Text matrix tracking for position calculation.
#[derive(Debug, Clone)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32, // X translation
    f: f32, // Y translation
    leading: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
            leading: 12.0,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self.e = e;
        self.f = f;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.e += tx * self.a + ty * self.c;
        self.f += tx * self.b + ty * self.d;
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.leading);
    }

    fn position(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    /// Vertical scale of text space once mapped through `ctm`.
    fn scale_under(&self, ctm: &Transform) -> f32 {
        let b = self.a * ctm.b + self.b * ctm.d;
        let d = self.c * ctm.b + self.d * ctm.d;
        let s = (b * b + d * d).sqrt();
        if s > 0.0 {
            s
        } else {
            1.0
        }
    }
}

/// Current transformation matrix `[a b c d e f]`, user space to page space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }
}

impl Transform {
    fn from_operands(operands: &[PdfValue]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let n = |i: usize| get_number_from_value(&operands[i]);
        Some(Self {
            a: n(0)?,
            b: n(1)?,
            c: n(2)?,
            d: n(3)?,
            e: n(4)?,
            f: n(5)?,
        })
    }

    /// `self` applied first, then `outer`.
    fn then(&self, outer: &Transform) -> Transform {
        Transform {
            a: self.a * outer.a + self.b * outer.c,
            b: self.a * outer.b + self.b * outer.d,
            c: self.c * outer.a + self.d * outer.c,
            d: self.c * outer.b + self.d * outer.d,
            e: self.e * outer.a + self.f * outer.c + outer.e,
            f: self.e * outer.b + self.f * outer.d + outer.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
    // Full-width forms
    || (0xFF01..=0xFF60).contains(&code)
}
