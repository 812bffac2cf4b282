//! Mapping match spans back to page-coordinate rectangles.
//!
//! A span is rejected (filtered, not an error) when a boundary falls in an
//! inserted separator or when the covered entries are not on the same visual
//! line — a rectangle cannot represent a multi-line match meaningfully.

use serde::{Deserialize, Serialize};

use crate::layout::{LayoutConfig, PageText, TextEntry};

/// Axis-aligned rectangle in page points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Origin-run data needed to re-derive an exact sub-span width during
/// replacement. Only present for single-run matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRefinement {
    pub run_text: String,
    pub run_width: f64,
    pub run_origin_x: f64,
}

/// One search hit with its page rectangle.
///
/// `id` is derived deterministically from page/run/offset/length, so
/// repeated searches over an unmodified document produce stable ids.
/// Produced by one search call, cached as "last find results", invalidated
/// by any successful mutation or new search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMatch {
    pub id: String,
    pub page_index: usize,
    /// Origin run index.
    pub entry_index: usize,
    /// Char offset of the match within the origin run.
    pub start_in_run: usize,
    /// Match length in chars.
    pub length: usize,
    pub rect: Rect,
    pub snippet: String,
    pub font_name: Option<String>,
    pub original_font_size: f64,
    pub multi_run: bool,
    pub matched_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RunRefinement>,
}

/// Characters of context on each side of the snippet.
const SNIPPET_CONTEXT: usize = 12;

/// Index of the entry containing byte offset `offset`, or `None` when the
/// offset falls in an inserted separator.
fn entry_at(entries: &[TextEntry], offset: usize) -> Option<usize> {
    let idx = entries.partition_point(|e| e.string_start <= offset);
    if idx == 0 {
        return None;
    }
    let candidate = idx - 1;
    (offset < entries[candidate].string_end).then_some(candidate)
}

fn make_snippet(text: &str, start: usize, end: usize) -> String {
    let before: String = {
        let chars: Vec<char> = text[..start].chars().rev().take(SNIPPET_CONTEXT).collect();
        chars.into_iter().rev().collect()
    };
    let after: String = text[end..].chars().take(SNIPPET_CONTEXT).collect();
    let raw = format!("{before}{}{after}", &text[start..end]);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert one `[start, end)` byte span of the reconstructed text into a
/// [`TextMatch`], or `None` when the span is geometrically unusable.
pub fn map_span(
    page: &PageText,
    start: usize,
    end: usize,
    page_width: f64,
    page_height: f64,
    config: &LayoutConfig,
) -> Option<TextMatch> {
    if end <= start {
        return None;
    }
    let start_idx = entry_at(&page.entries, start)?;
    let end_idx = entry_at(&page.entries, end - 1)?;

    let covered = &page.entries[start_idx..=end_idx];
    let max_font_size = covered.iter().fold(0.0_f64, |acc, e| acc.max(e.font_size));

    // Same-line constraint: multi-line matches are never produced.
    let first_y = covered[0].origin_y;
    let line_threshold = max_font_size * config.line_break_factor;
    if covered
        .iter()
        .any(|e| (e.origin_y - first_y).abs() > line_threshold)
    {
        return None;
    }

    let start_entry = &page.entries[start_idx];
    let end_entry = &page.entries[end_idx];

    let chars_before = page.text[start_entry.string_start..start].chars().count();
    let chars_through = page.text[end_entry.string_start..end].chars().count();

    let x0 = start_entry.origin_x + chars_before as f64 * start_entry.avg_glyph_width;
    let x1 = end_entry.origin_x + chars_through as f64 * end_entry.avg_glyph_width;
    let width = x1 - x0;
    if !width.is_finite() || width <= 0.0 {
        return None;
    }

    // Clamp into the page bounding box.
    let x = x0.clamp(0.0, page_width);
    let y = start_entry.origin_y.clamp(0.0, page_height);
    let rect = Rect {
        x,
        y,
        width: width.min(page_width - x),
        height: max_font_size.min(page_height - y),
    };
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }

    let matched_text = page.text[start..end].to_string();
    let length = matched_text.chars().count();
    let multi_run = start_idx != end_idx;

    let id = if multi_run {
        format!(
            "p{}:r{}-r{}:o{}:l{}",
            page.page_index, start_entry.run_index, end_entry.run_index, chars_before, length
        )
    } else {
        format!(
            "p{}:r{}:o{}:l{}",
            page.page_index, start_entry.run_index, chars_before, length
        )
    };

    // Single-run matches carry enough origin-run data for high-precision
    // width refinement during replacement; multi-run matches do not.
    let refinement = (!multi_run).then(|| RunRefinement {
        run_text: page.text[start_entry.string_start..start_entry.string_end].to_string(),
        run_width: start_entry.run_width,
        run_origin_x: start_entry.origin_x,
    });

    Some(TextMatch {
        id,
        page_index: page.page_index,
        entry_index: start_entry.run_index,
        start_in_run: chars_before,
        length,
        rect,
        snippet: make_snippet(&page.text, start, end),
        font_name: start_entry.font_name.clone(),
        original_font_size: start_entry.font_size,
        multi_run,
        matched_text,
        refinement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{reconstruct_page, LayoutConfig};
    use crate::matcher::{Matcher, SearchOptions};
    use crate::provider::{GlyphRun, PageRuns};

    fn run(text: &str, x: f64, y: f64, size: f64, width: f64) -> GlyphRun {
        GlyphRun {
            text: text.to_string(),
            transform: [size, 0.0, 0.0, size, x, y],
            width: Some(width),
            font_name: Some("F1".to_string()),
            font_size: Some(size),
            ends_line: false,
        }
    }

    fn page_text(runs: Vec<GlyphRun>) -> PageText {
        reconstruct_page(
            &PageRuns {
                page_index: 0,
                page_width: 612.0,
                page_height: 792.0,
                runs,
            },
            &LayoutConfig::default(),
        )
    }

    fn find(page: &PageText, term: &str) -> Vec<TextMatch> {
        let matcher = Matcher::new(&SearchOptions::new(term)).unwrap();
        matcher
            .spans(&page.text)
            .into_iter()
            .filter_map(|(s, e)| {
                map_span(page, s, e, 612.0, 792.0, &LayoutConfig::default())
            })
            .collect()
    }

    #[test]
    fn single_run_match_geometry() {
        let page = page_text(vec![run("Hello World", 72.0, 700.0, 12.0, 110.0)]);
        let matches = find(&page, "World");
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        // avg glyph width 10pt, match starts at char 6.
        assert!((m.rect.x - 132.0).abs() < 1e-9);
        assert!((m.rect.width - 50.0).abs() < 1e-9);
        assert!((m.rect.y - 700.0).abs() < 1e-9);
        assert!((m.rect.height - 12.0).abs() < 1e-9);
        assert_eq!(m.length, 5);
        assert_eq!(m.start_in_run, 6);
        assert!(!m.multi_run);
        assert!(m.refinement.is_some());
        assert_eq!(m.id, "p0:r0:o6:l5");
    }

    #[test]
    fn rect_stays_within_page() {
        let page = page_text(vec![run("Edge", 600.0, 780.0, 24.0, 80.0)]);
        let matches = find(&page, "Edge");
        assert_eq!(matches.len(), 1);
        let r = &matches[0].rect;
        assert!(r.x >= 0.0 && r.x + r.width <= 612.0);
        assert!(r.y >= 0.0 && r.y + r.height <= 792.0);
    }

    #[test]
    fn cross_line_span_is_rejected() {
        let mut first = run("Foo", 72.0, 700.0, 12.0, 30.0);
        first.ends_line = true;
        let page = page_text(vec![first, run("Bar", 72.0, 680.0, 12.0, 30.0)]);
        assert_eq!(page.text, "Foo\nBar");
        // The separator is '\n', so "Foo Bar" never matches; a span built
        // by hand across the break is rejected by the same-line test.
        assert!(find(&page, "Foo Bar").is_empty());
        let span_start = 0;
        let span_end = page.text.len();
        assert!(map_span(
            &page,
            span_start,
            span_end,
            612.0,
            792.0,
            &LayoutConfig::default()
        )
        .is_none());
    }

    #[test]
    fn boundary_in_separator_is_rejected() {
        let page = page_text(vec![
            run("Hello", 0.0, 700.0, 12.0, 50.0),
            run("World", 56.0, 700.0, 12.0, 50.0),
        ]);
        assert_eq!(page.text, "Hello World");
        // Span covering the inserted space at offset 5.
        assert!(map_span(&page, 5, 6, 612.0, 792.0, &LayoutConfig::default()).is_none());
        // Span ending inside the separator.
        assert!(map_span(&page, 3, 6, 612.0, 792.0, &LayoutConfig::default()).is_none());
    }

    #[test]
    fn multi_run_match_spans_entries_on_one_line() {
        let page = page_text(vec![
            run("Hello", 0.0, 700.0, 12.0, 50.0),
            run("World", 56.0, 700.0, 14.0, 50.0),
        ]);
        let matches = find(&page, "lo Wor");
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert!(m.multi_run);
        assert!(m.refinement.is_none());
        assert_eq!(m.id, "p0:r0-r1:o3:l6");
        // Height takes the larger covered font.
        assert!((m.rect.height - 14.0).abs() < 1e-9);
    }

    #[test]
    fn snippet_collapses_whitespace_and_trims_context() {
        let page = page_text(vec![run(
            "The quick brown fox jumps over the lazy dog",
            0.0,
            700.0,
            12.0,
            440.0,
        )]);
        let matches = find(&page, "jumps");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].snippet, "k brown fox jumps over the la");
    }

    #[test]
    fn ids_are_stable_across_searches() {
        let runs = vec![run("Hello World", 72.0, 700.0, 12.0, 110.0)];
        let a = find(&page_text(runs.clone()), "World");
        let b = find(&page_text(runs), "World");
        assert_eq!(a[0].id, b[0].id);
    }
}
