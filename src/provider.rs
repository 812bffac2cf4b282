//! Glyph run extraction from PDF pages.
//!
//! The engine consumes positioned glyph runs through the [`GlyphRunProvider`]
//! trait and never mutates them. Runs are re-fetched per search (not cached
//! across searches) so that matching always reflects the current document
//! bytes.
//!
//! [`LopdfRunProvider`] is the default implementation: it walks each page's
//! content stream tracking the text state machine (`BT`/`ET`, `Tf`, `Td`,
//! `TD`, `Tm`, `TL`, `T*`, `'`, `Tj`, `TJ`) and the CTM (`q`/`Q`/`cm`),
//! emitting one run per show operator. String bytes decode as Latin-1
//! (a WinAnsi approximation); CMap-encoded fonts are out of scope.

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

use crate::error::{EngineError, Result};
use crate::metrics;

/// A contiguous span of text emitted by the document at one affine
/// position/orientation. Read-only input to the engine.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    pub text: String,
    /// 2x3 affine transform `[a, b, c, d, e, f]` with the font size folded
    /// into the scale components, so `|d|` is the vertical glyph scale.
    pub transform: [f64; 6],
    /// Reported advance width in page units, if the producer knows it.
    pub width: Option<f64>,
    pub font_name: Option<String>,
    /// Declared font size from the text state, fallback when the transform
    /// scale is degenerate.
    pub font_size: Option<f64>,
    /// True when a line-advance operator follows this run.
    pub ends_line: bool,
}

/// All glyph runs of one page plus the page bounding box.
#[derive(Debug, Clone)]
pub struct PageRuns {
    pub page_index: usize,
    pub page_width: f64,
    pub page_height: f64,
    pub runs: Vec<GlyphRun>,
}

/// Source of per-page glyph runs.
///
/// Structural failures (malformed document, missing page) are errors;
/// a page without text simply yields an empty run list.
#[async_trait]
pub trait GlyphRunProvider: Send + Sync {
    async fn page_count(&self, bytes: &[u8]) -> Result<usize>;
    async fn page_runs(&self, bytes: &[u8], page_index: usize) -> Result<PageRuns>;
}

/// Default provider backed by [`lopdf`].
#[derive(Debug, Default)]
pub struct LopdfRunProvider;

impl LopdfRunProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GlyphRunProvider for LopdfRunProvider {
    async fn page_count(&self, bytes: &[u8]) -> Result<usize> {
        let doc = Document::load_mem(bytes)?;
        Ok(doc.get_pages().len())
    }

    async fn page_runs(&self, bytes: &[u8], page_index: usize) -> Result<PageRuns> {
        let doc = Document::load_mem(bytes)?;
        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        let page_id = *page_ids
            .get(page_index)
            .ok_or(EngineError::InvalidPage(page_index, page_ids.len()))?;

        let (page_width, page_height) = page_dimensions(&doc, page_id);
        let data = doc.get_page_content(page_id)?;
        let content = Content::decode(&data)?;
        let runs = collect_runs(&content.operations);

        Ok(PageRuns {
            page_index,
            page_width,
            page_height,
            runs,
        })
    }
}

/// Look up a key in the page dictionary, walking up the page tree via
/// `/Parent` when the key is inherited.
fn resolve_inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    loop {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
}

/// Page width/height from the (possibly inherited) MediaBox.
/// Falls back to US Letter when the box is missing or malformed.
pub(crate) fn page_dimensions(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let media_box = resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| {
            if arr.len() == 4 {
                let vals: Vec<f64> = arr.iter().filter_map(as_number).collect();
                (vals.len() == 4).then(|| ((vals[2] - vals[0]).abs(), (vals[3] - vals[1]).abs()))
            } else {
                None
            }
        });
    media_box.unwrap_or((612.0, 792.0))
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// 2x3 affine matrix `[a, b, c, d, e, f]`.
#[derive(Debug, Clone, Copy)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f64, ty: f64) -> Matrix {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn scale(s: f64) -> Matrix {
        Matrix([s, 0.0, 0.0, s, 0.0, 0.0])
    }

    /// Standard PDF matrix concatenation: apply `self`, then `other`.
    fn multiply(self, other: Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn horizontal_scale(&self) -> f64 {
        (self.0[0] * self.0[0] + self.0[1] * self.0[1]).sqrt()
    }
}

/// A TJ adjustment this far negative (thousandths of an em) is an implicit
/// inter-word gap.
const TJ_SPACE_THRESHOLD: f64 = -200.0;

struct TextWalker {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f64,
    font_size: f64,
    font_name: Option<String>,
    runs: Vec<GlyphRun>,
}

impl TextWalker {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
            font_size: 0.0,
            font_name: None,
            runs: Vec::new(),
        }
    }

    /// Flag the most recently emitted run as ending its line.
    fn mark_line_end(&mut self) {
        if let Some(last) = self.runs.last_mut() {
            last.ends_line = true;
        }
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).multiply(self.tlm);
        self.tm = self.tlm;
    }

    /// Emit one glyph run for a show operation, then advance the text matrix.
    fn show(&mut self, text: String, advance: f64) {
        if !text.is_empty() {
            let trm = self.tm.multiply(self.ctm);
            let full = Matrix::scale(self.font_size).multiply(trm);
            let width = advance * trm.horizontal_scale();
            self.runs.push(GlyphRun {
                text,
                transform: full.0,
                width: (width > 0.0).then_some(width),
                font_name: self.font_name.clone(),
                font_size: Some(self.font_size),
                ends_line: false,
            });
        }
        self.tm = Matrix::translate(advance, 0.0).multiply(self.tm);
    }

    fn op(&mut self, operation: &Operation) {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(prev) = self.ctm_stack.pop() {
                    self.ctm = prev;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.ctm = m.multiply(self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                self.font_name = operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .map(|n| String::from_utf8_lossy(n).into_owned());
                if let Some(size) = operands.get(1).and_then(as_number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(as_number) {
                    self.leading = l;
                }
            }
            "Td" => {
                let tx = operands.first().and_then(as_number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(as_number).unwrap_or(0.0);
                if ty != 0.0 {
                    self.mark_line_end();
                }
                self.next_line(tx, ty);
            }
            "TD" => {
                let tx = operands.first().and_then(as_number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(as_number).unwrap_or(0.0);
                self.leading = -ty;
                if ty != 0.0 {
                    self.mark_line_end();
                }
                self.next_line(tx, ty);
            }
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => {
                self.mark_line_end();
                let leading = self.leading;
                self.next_line(0.0, -leading);
            }
            "Tj" => {
                if let Some(text) = operands.first().and_then(string_operand) {
                    let advance = metrics::width_of(&text, self.font_size);
                    self.show(text, advance);
                }
            }
            "'" | "\"" => {
                // `"` carries word/char spacing operands before the string;
                // the string is always last.
                self.mark_line_end();
                let leading = self.leading;
                self.next_line(0.0, -leading);
                if let Some(text) = operands.last().and_then(string_operand) {
                    let advance = metrics::width_of(&text, self.font_size);
                    self.show(text, advance);
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = operands.first() {
                    let mut text = String::new();
                    let mut advance = 0.0;
                    for element in elements {
                        match element {
                            Object::String(bytes, _) => {
                                let part = decode_latin1(bytes);
                                advance += metrics::width_of(&part, self.font_size);
                                text.push_str(&part);
                            }
                            other => {
                                if let Some(adjust) = as_number(other) {
                                    advance -= adjust / 1000.0 * self.font_size;
                                    if adjust < TJ_SPACE_THRESHOLD && !text.is_empty() {
                                        text.push(' ');
                                    }
                                }
                            }
                        }
                    }
                    self.show(text, advance);
                }
            }
            _ => {}
        }
    }
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut values = [0.0; 6];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = as_number(operand)?;
    }
    Some(Matrix(values))
}

fn string_operand(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_latin1(bytes)),
        _ => None,
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Walk one page's content operations and collect glyph runs.
pub(crate) fn collect_runs(operations: &[Operation]) -> Vec<GlyphRun> {
    let mut walker = TextWalker::new();
    for operation in operations {
        walker.op(operation);
    }
    walker.runs
}
