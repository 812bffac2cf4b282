//! Text layout reconstruction.
//!
//! Turns a page's disjoint, independently-positioned glyph runs into one
//! linear string plus an index mapping every character back to its
//! originating run. Separators (`' '` / `'\n'`) are inferred from geometry:
//! PDFs encode glyph positioning, not semantics, so the reconstruction is an
//! approximation and the thresholds are tunable heuristics, not fixed law.

use crate::provider::{GlyphRun, PageRuns};

/// Tunable reconstruction heuristics.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Maximum shear relative to the dominant scale before a run is
    /// rejected as non-axis-aligned.
    pub shear_tolerance: f64,
    /// Vertical distance, in multiples of the larger font size, beyond
    /// which two runs are on different lines.
    pub line_break_factor: f64,
    /// Horizontal gap, in multiples of the larger average glyph width,
    /// beyond which a space is inserted between runs.
    pub word_gap_factor: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            shear_tolerance: 0.1,
            line_break_factor: 0.9,
            word_gap_factor: 0.25,
        }
    }
}

/// Reconstructed-string slice metadata for one usable glyph run.
///
/// `string_start`/`string_end` are byte offsets into [`PageText::text`];
/// horizontal interpolation converts to char counts before multiplying by
/// `avg_glyph_width`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    pub run_index: usize,
    pub string_start: usize,
    pub string_end: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub run_width: f64,
    pub avg_glyph_width: f64,
    pub font_size: f64,
    pub font_name: Option<String>,
}

/// One page's reconstructed text. Entries are sorted by `string_start`;
/// every character of `text` belongs to exactly one entry or is a separator
/// inserted between entries.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    pub page_index: usize,
    pub text: String,
    pub entries: Vec<TextEntry>,
}

/// Per-run values derived before the run is committed to the page string.
struct UsableRun {
    origin_x: f64,
    origin_y: f64,
    run_width: f64,
    avg_glyph_width: f64,
    font_size: f64,
}

/// Scale below which a transform component is treated as absent.
const MIN_SCALE: f64 = 1e-3;

/// Width estimate per glyph, in em, when the producer reports no advance.
const WIDTH_ESTIMATE_FACTOR: f64 = 0.5;

fn usable_run(run: &GlyphRun, config: &LayoutConfig) -> Option<UsableRun> {
    if run.text.is_empty() {
        return None;
    }
    let [a, b, c, d, e, f] = run.transform;
    if !run.transform.iter().all(|v| v.is_finite()) {
        return None;
    }

    // Sheared runs cannot be treated as axis-aligned text; exclude them
    // from search, matching, and replacement.
    let scale_ref = a.abs().max(d.abs()).max(1.0);
    if b.abs() > config.shear_tolerance * scale_ref || c.abs() > config.shear_tolerance * scale_ref
    {
        return None;
    }

    // Vertical scale first: the horizontal component alone is unreliable
    // when horizontal and vertical scaling differ, and using it naively
    // yields wrong-height replacement text.
    let font_size = if d.abs() > MIN_SCALE {
        d.abs()
    } else if a.abs() > MIN_SCALE {
        a.abs()
    } else {
        run.font_size.unwrap_or(0.0)
    };
    if font_size <= 0.0 {
        return None;
    }

    let char_count = run.text.chars().count() as f64;
    let run_width = match run.width {
        Some(w) if w > 0.0 => w,
        _ => font_size * char_count * WIDTH_ESTIMATE_FACTOR,
    };

    Some(UsableRun {
        origin_x: e,
        origin_y: f,
        run_width,
        avg_glyph_width: run_width / char_count,
        font_size,
    })
}

enum Separator {
    None,
    Space,
    Newline,
}

fn separator(
    prev: &TextEntry,
    prev_ends_line: bool,
    next: &UsableRun,
    config: &LayoutConfig,
) -> Separator {
    let line_gap = prev.font_size.max(next.font_size) * config.line_break_factor;
    if prev_ends_line || (next.origin_y - prev.origin_y).abs() > line_gap {
        return Separator::Newline;
    }
    let gap = next.origin_x - (prev.origin_x + prev.run_width);
    if gap > prev.avg_glyph_width.max(next.avg_glyph_width) * config.word_gap_factor {
        Separator::Space
    } else {
        Separator::None
    }
}

/// Produce one [`PageText`] from a page's glyph runs.
///
/// Deterministic: identical runs yield identical output. A page with zero
/// usable runs yields an empty `PageText`.
pub fn reconstruct_page(page: &PageRuns, config: &LayoutConfig) -> PageText {
    let mut text = String::new();
    let mut entries: Vec<TextEntry> = Vec::new();

    for (run_index, run) in page.runs.iter().enumerate() {
        let Some(usable) = usable_run(run, config) else {
            continue;
        };

        if let Some(prev) = entries.last() {
            let prev_ends_line = page.runs[prev.run_index].ends_line;
            match separator(prev, prev_ends_line, &usable, config) {
                Separator::Newline => text.push('\n'),
                Separator::Space => text.push(' '),
                Separator::None => {}
            }
        }

        let string_start = text.len();
        text.push_str(&run.text);
        entries.push(TextEntry {
            run_index,
            string_start,
            string_end: text.len(),
            origin_x: usable.origin_x,
            origin_y: usable.origin_y,
            run_width: usable.run_width,
            avg_glyph_width: usable.avg_glyph_width,
            font_size: usable.font_size,
            font_name: run.font_name.clone(),
        });
    }

    PageText {
        page_index: page.page_index,
        text,
        entries,
    }
}
