//! Positioned text extraction from PDF pages.
//!
//! Walks each page's content stream with `lopdf`, turns every show-text
//! operator into a positioned run, and merges runs sharing a baseline into
//! one block per visual line. Blocks come out sorted top-to-bottom, then
//! left-to-right, which approximates reading order for single-column
//! eligibility reports.

use std::collections::BTreeMap;
use std::io::Cursor;

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ExtractError, Result};

/// Baselines closer than this (in points) belong to the same line.
const LINE_TOLERANCE: f32 = 2.0;

/// Gap (in ems) above which two runs are treated as separate columns.
const COLUMN_GAP_EM: f32 = 1.5;

/// Gap (in ems) above which two runs get a separating space.
const WORD_GAP_EM: f32 = 0.15;

/// Average glyph width (in ems) used when no font metrics are available.
const AVG_GLYPH_EM: f32 = 0.5;

/// TJ adjustments below this (thousandths of an em) are rendered as a space.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// One layout-detected span of text on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedBlock {
    pub text: String,
    /// Left edge in points.
    pub x: f32,
    /// Distance from the top of the page in points.
    pub y: f32,
}

impl PositionedBlock {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

/// Text content of a single page.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-indexed page number.
    pub number: u32,
    pub blocks: Vec<PositionedBlock>,
    /// Raw text lines in reading order, used by the table extractor.
    pub lines: Vec<String>,
}

/// Load a PDF from memory and extract positioned text for every page.
///
/// Any load or decode failure is fatal for the whole document.
pub fn extract_pages(data: &[u8]) -> Result<Vec<PageText>> {
    let doc = Document::load_from(Cursor::new(data)).map_err(ExtractError::PdfLoad)?;
    let page_ids = doc.get_pages();
    info!("Loaded PDF with {} pages ({} bytes)", page_ids.len(), data.len());

    let mut pages = Vec::with_capacity(page_ids.len());
    for (number, page_id) in page_ids {
        let runs = page_runs(&doc, page_id)
            .map_err(|source| ExtractError::PageContent { page: number, source })?;
        let height = page_height(&doc, page_id);
        let blocks = runs_to_blocks(runs, height);
        debug!("Page {}: {} blocks", number, blocks.len());

        let lines = blocks.iter().map(|b| b.text.clone()).collect();
        pages.push(PageText {
            number,
            blocks,
            lines,
        });
    }

    Ok(pages)
}

// ============================================================================
// Content stream walk
// ============================================================================

#[derive(Debug, Clone)]
struct TextRun {
    text: String,
    x: f32,
    y: f32,
    size: f32,
}

impl TextRun {
    fn estimated_width(&self) -> f32 {
        self.text.chars().count() as f32 * self.size * AVG_GLYPH_EM
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 12.0,
            leading: 0.0,
        }
    }
}

struct TextWalker<'a> {
    encodings: BTreeMap<Vec<u8>, Encoding<'a>>,
    stack: Vec<GraphicsState>,
    state: GraphicsState,
    text_matrix: Matrix,
    line_matrix: Matrix,
    runs: Vec<TextRun>,
}

impl<'a> TextWalker<'a> {
    fn new(encodings: BTreeMap<Vec<u8>, Encoding<'a>>) -> Self {
        Self {
            encodings,
            stack: Vec::new(),
            state: GraphicsState::default(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            runs: Vec::new(),
        }
    }

    fn apply(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_from_operands(operands) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.state.font = Some(name.clone());
                }
                if let Some(size) = operands.get(1).and_then(as_f32) {
                    self.state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(as_f32) {
                    self.state.leading = leading;
                }
            }
            "Tm" => {
                if let Some(m) = matrix_from_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "Td" | "TD" => {
                let tx = operands.first().and_then(as_f32).unwrap_or(0.0);
                let ty = operands.get(1).and_then(as_f32).unwrap_or(0.0);
                if op.operator == "TD" {
                    self.state.leading = -ty;
                }
                self.move_line(tx, ty);
            }
            "T*" => self.next_line(),
            "Tj" | "TJ" => self.show(operands),
            "'" => {
                self.next_line();
                self.show(operands);
            }
            "\"" => {
                self.next_line();
                self.show(operands.get(2..).unwrap_or(&[]));
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&translate(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, operands: &[Object]) {
        let mut text = String::new();
        for operand in operands {
            self.collect_text(operand, &mut text);
        }
        if text.trim().is_empty() {
            return;
        }

        let rendering = multiply(&self.text_matrix, &self.state.ctm);
        let scale = (rendering[2] * rendering[2] + rendering[3] * rendering[3]).sqrt();
        let run = TextRun {
            text,
            x: rendering[4],
            y: rendering[5],
            size: (self.state.font_size * scale).abs().max(1.0),
        };

        // Advance past the run so a following show-text lands to its right.
        let advance = run.text.chars().count() as f32 * self.state.font_size * AVG_GLYPH_EM;
        self.text_matrix = multiply(&translate(advance, 0.0), &self.text_matrix);
        self.runs.push(run);
    }

    fn collect_text(&self, operand: &Object, out: &mut String) {
        match operand {
            Object::String(bytes, _) => out.push_str(&self.decode(bytes)),
            Object::Array(items) => {
                for item in items {
                    match item {
                        Object::Integer(_) | Object::Real(_) => {
                            let adjust = as_f32(item).unwrap_or(0.0);
                            if adjust < TJ_SPACE_THRESHOLD && !out.ends_with(' ') {
                                out.push(' ');
                            }
                        }
                        other => self.collect_text(other, out),
                    }
                }
            }
            _ => {}
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        self.state
            .font
            .as_ref()
            .and_then(|font| self.encodings.get(font))
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| bytes.iter().map(|&b| b as char).collect())
    }
}

fn page_runs(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<TextRun>> {
    let content = doc.get_and_decode_page_content(page_id)?;
    let fonts = doc.get_page_fonts(page_id)?;
    let encodings: BTreeMap<Vec<u8>, Encoding> = fonts
        .iter()
        .filter_map(|(name, font)| {
            font.get_font_encoding(doc)
                .ok()
                .map(|encoding| (name.clone(), encoding))
        })
        .collect();

    let mut walker = TextWalker::new(encodings);
    for op in &content.operations {
        walker.apply(op);
    }
    Ok(walker.runs)
}

fn page_height(doc: &Document, page_id: ObjectId) -> f32 {
    let mut current = Some(page_id);
    // MediaBox may be inherited from an ancestor Pages node.
    for _ in 0..16 {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_dictionary(id) else { break };
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let resolved = match media_box {
                Object::Reference(r) => doc.get_object(*r).ok(),
                other => Some(other),
            };
            if let Some(Ok(values)) = resolved.map(Object::as_array) {
                let nums: Vec<f32> = values.iter().filter_map(as_f32).collect();
                if nums.len() == 4 {
                    return (nums[3] - nums[1]).abs();
                }
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    DEFAULT_PAGE_HEIGHT
}

// ============================================================================
// Line assembly
// ============================================================================

fn runs_to_blocks(mut runs: Vec<TextRun>, page_height: f32) -> Vec<PositionedBlock> {
    for run in &mut runs {
        run.y = page_height - run.y;
    }
    runs.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<TextRun>> = Vec::new();
    for run in runs {
        match lines.last_mut() {
            Some(line) if (line[0].y - run.y).abs() <= LINE_TOLERANCE => line.push(run),
            _ => lines.push(vec![run]),
        }
    }

    let mut blocks: Vec<PositionedBlock> = lines
        .into_iter()
        .filter_map(|mut line| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            let text = join_runs(&line);
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(PositionedBlock::new(text, line[0].x, line[0].y))
        })
        .collect();

    blocks.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    blocks
}

fn join_runs(line: &[TextRun]) -> String {
    let mut text = String::new();
    let mut previous: Option<&TextRun> = None;

    for run in line {
        if let Some(prev) = previous {
            let gap = run.x - (prev.x + prev.estimated_width());
            let em = prev.size.max(run.size);
            if gap >= COLUMN_GAP_EM * em {
                text.truncate(text.trim_end().len());
                text.push_str("  ");
            } else if gap > WORD_GAP_EM * em && !text.ends_with(' ') && !run.text.starts_with(' ')
            {
                text.push(' ');
            }
        }
        text.push_str(&run.text);
        previous = Some(run);
    }

    text
}

// ============================================================================
// Matrix helpers
// ============================================================================

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn matrix_from_operands(operands: &[Object]) -> Option<Matrix> {
    let values: Vec<f32> = operands.iter().filter_map(as_f32).collect();
    values.try_into().ok()
}

fn as_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}
