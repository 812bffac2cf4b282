//! Visual text replacement planning.
//!
//! Replacement never edits text objects in the content stream; it paints a
//! white erasure rectangle over the matched region and redraws the new text
//! on top, sized to fit. Per-match failures are values ([`SkipReason`]),
//! never errors — only page-level I/O failures abort a whole operation.

pub mod canvas;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, TextMatch};
use crate::metrics;

/// Minimum acceptable font scale on the bulk/full-replace path.
pub const MIN_SCALE_BULK: f64 = 0.60;
/// Minimum acceptable font scale on the refined single-run path.
pub const MIN_SCALE_REFINED: f64 = 0.85;

/// Calibration factor bounds reconciling the producer's reported run width
/// with the fallback font's measurement of the same text.
pub const CALIBRATION_MIN: f64 = 0.8;
pub const CALIBRATION_MAX: f64 = 1.25;

/// Replacement text may exceed the selection by this factor before the
/// draw size shrinks.
const FIT_ALLOWANCE: f64 = 1.05;

/// Why a single replacement was skipped. The page is left unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Fitting the replacement would need a scale below the minimum —
    /// refusing beats rendering illegibly small text.
    TextTooWide,
    /// The erasure rectangle would cover too much of the page; guards
    /// against corrupting large regions after a geometry miscalculation.
    EraseTooWide,
    /// The match could not be resolved against the current document.
    GenericFailure,
}

/// Result of one replacement attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaceOutcome {
    pub replaced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    /// Erasure rectangle, as an ephemeral flash cue for the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<Rect>,
}

impl ReplaceOutcome {
    pub(crate) fn replaced(flash: Rect) -> Self {
        Self {
            replaced: true,
            reason: None,
            flash: Some(flash),
        }
    }

    pub(crate) fn skipped(reason: SkipReason) -> Self {
        Self {
            replaced: false,
            reason: Some(reason),
            flash: None,
        }
    }
}

/// Counts reported by a bulk replace.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BulkReplaceOutcome {
    pub replacements: usize,
    pub skipped: usize,
}

/// The text draw half of a plan. Absent when the replacement is empty
/// (erase only — "delete").
#[derive(Debug, Clone)]
pub struct DrawOp {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// Derived, ephemeral plan for one replacement. Never persisted.
#[derive(Debug, Clone)]
pub struct ReplacementPlan {
    pub erase: Rect,
    pub draw: Option<DrawOp>,
}

/// Resolve one match into an erase + draw plan.
///
/// One function covers both paths: single-run matches carry refinement data
/// and re-derive the exact sub-span width through the calibrated width
/// table; multi-run matches keep the approximate rectangle. `min_scale` is
/// [`MIN_SCALE_REFINED`] or [`MIN_SCALE_BULK`] depending on the caller.
pub fn plan_replacement(
    m: &TextMatch,
    replacement: &str,
    min_scale: f64,
    page_width: f64,
    page_height: f64,
) -> Result<ReplacementPlan, SkipReason> {
    let font_size = m.original_font_size;
    let baseline = m.rect.y;
    let mut selection_x = m.rect.x;
    let mut selection_width = m.rect.width;

    if let Some(r) = &m.refinement {
        let measured_run = metrics::width_of(&r.run_text, font_size);
        if measured_run > 0.0 {
            let calibration = (r.run_width / measured_run).clamp(CALIBRATION_MIN, CALIBRATION_MAX);
            let prefix: String = r.run_text.chars().take(m.start_in_run).collect();
            let span: String = r
                .run_text
                .chars()
                .skip(m.start_in_run)
                .take(m.length)
                .collect();
            let refined_width = metrics::width_of(&span, font_size) * calibration;
            // Keep the approximate rectangle when refinement degenerates.
            if refined_width.is_finite() && refined_width > 0.0 {
                selection_x = r.run_origin_x + metrics::width_of(&prefix, font_size) * calibration;
                selection_width = refined_width;
            }
        }
    }

    if !(selection_width.is_finite() && selection_width > 0.0 && font_size > 0.0) {
        return Err(SkipReason::GenericFailure);
    }

    let mut draw_size = font_size;
    if !replacement.is_empty() {
        let measured = metrics::width_of(replacement, draw_size);
        if measured > selection_width * FIT_ALLOWANCE {
            let scale = selection_width / measured;
            if scale < min_scale {
                return Err(SkipReason::TextTooWide);
            }
            draw_size = font_size * scale;
        }
    }

    let pad_x = (selection_width * 0.05).max(2.0);
    let pad_y = (font_size * 0.1).max(1.0);
    let erase = Rect {
        x: selection_x - pad_x,
        y: baseline + metrics::descent(font_size) - pad_y,
        width: selection_width + 2.0 * pad_x,
        height: metrics::height_at(font_size) + 2.0 * pad_y,
    };
    if erase.width > page_width * 0.5 || erase.height > page_height * 0.1 {
        return Err(SkipReason::EraseTooWide);
    }

    let draw = (!replacement.is_empty()).then(|| {
        let drawn_width = metrics::width_of(replacement, draw_size);
        // Left-aligned, centered when narrower than the selection.
        let x = if drawn_width < selection_width {
            selection_x + (selection_width - drawn_width) / 2.0
        } else {
            selection_x
        };
        DrawOp {
            text: replacement.to_string(),
            x,
            y: baseline,
            size: draw_size,
        }
    });

    Ok(ReplacementPlan { erase, draw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RunRefinement;

    const PAGE_W: f64 = 612.0;
    const PAGE_H: f64 = 792.0;

    fn match_with(rect: Rect, refinement: Option<RunRefinement>) -> TextMatch {
        TextMatch {
            id: "p0:r0:o0:l4".to_string(),
            page_index: 0,
            entry_index: 0,
            start_in_run: 0,
            length: 4,
            rect,
            snippet: "test".to_string(),
            font_name: None,
            original_font_size: 12.0,
            multi_run: refinement.is_none(),
            matched_text: "test".to_string(),
            refinement,
        }
    }

    fn selection(width: f64) -> Rect {
        Rect {
            x: 100.0,
            y: 700.0,
            width,
            height: 12.0,
        }
    }

    #[test]
    fn too_wide_replacement_is_aborted() {
        // ~200pt of text against a 50pt selection: scale 0.25 < 0.60.
        let m = match_with(selection(50.0), None);
        let long = "W".repeat(18); // 18 × 944/1000 × 12 ≈ 204pt
        let err = plan_replacement(&m, &long, MIN_SCALE_BULK, PAGE_W, PAGE_H).unwrap_err();
        assert_eq!(err, SkipReason::TextTooWide);
    }

    #[test]
    fn slightly_wide_replacement_shrinks() {
        let m = match_with(selection(50.0), None);
        // ~57pt at size 12 → needs scale ≈ 0.88, above the bulk minimum.
        let plan = plan_replacement(&m, "mmmmmm", MIN_SCALE_BULK, PAGE_W, PAGE_H).unwrap();
        let draw = plan.draw.unwrap();
        assert!(draw.size < 12.0);
        assert!(draw.size >= 12.0 * MIN_SCALE_BULK);
    }

    #[test]
    fn refined_path_uses_stricter_minimum() {
        let refinement = RunRefinement {
            run_text: "test".to_string(),
            run_width: metrics::width_of("test", 12.0),
            run_origin_x: 100.0,
        };
        let m = match_with(selection(50.0), Some(refinement));
        // Needs a scale between 0.60 and 0.85: rejected on the refined path.
        let sel = metrics::width_of("test", 12.0);
        let replacement = "m".repeat((sel / metrics::width_of("m", 12.0) * 1.4) as usize + 1);
        let err =
            plan_replacement(&m, &replacement, MIN_SCALE_REFINED, PAGE_W, PAGE_H).unwrap_err();
        assert_eq!(err, SkipReason::TextTooWide);
        assert!(plan_replacement(&m, &replacement, MIN_SCALE_BULK, PAGE_W, PAGE_H).is_ok());
    }

    #[test]
    fn calibration_factor_is_clamped() {
        // Reported width triple the measured width would give factor 3.0;
        // the clamp caps the refined selection at 1.25 × measured.
        let measured = metrics::width_of("test", 12.0);
        let refinement = RunRefinement {
            run_text: "test".to_string(),
            run_width: measured * 3.0,
            run_origin_x: 100.0,
        };
        let m = match_with(selection(measured * 3.0), Some(refinement));
        let plan = plan_replacement(&m, "", MIN_SCALE_REFINED, PAGE_W, PAGE_H).unwrap();
        let expected = measured * CALIBRATION_MAX;
        let pad = (expected * 0.05).max(2.0);
        assert!((plan.erase.width - (expected + 2.0 * pad)).abs() < 1e-6);
    }

    #[test]
    fn oversized_erasure_is_aborted() {
        // Selection wider than half the page.
        let m = match_with(selection(320.0), None);
        let err = plan_replacement(&m, "x", MIN_SCALE_BULK, PAGE_W, PAGE_H).unwrap_err();
        assert_eq!(err, SkipReason::EraseTooWide);
    }

    #[test]
    fn empty_replacement_erases_without_drawing() {
        let m = match_with(selection(50.0), None);
        let plan = plan_replacement(&m, "", MIN_SCALE_BULK, PAGE_W, PAGE_H).unwrap();
        assert!(plan.draw.is_none());
        assert!(plan.erase.width > 50.0);
        assert!(plan.erase.height > 12.0);
    }

    #[test]
    fn narrow_replacement_is_centered() {
        let m = match_with(selection(100.0), None);
        let plan = plan_replacement(&m, "Hi", MIN_SCALE_BULK, PAGE_W, PAGE_H).unwrap();
        let draw = plan.draw.unwrap();
        let drawn = metrics::width_of("Hi", 12.0);
        assert!((draw.x - (100.0 + (100.0 - drawn) / 2.0)).abs() < 1e-9);
        assert!((draw.size - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn erasure_covers_ascent_and_descent() {
        let m = match_with(selection(50.0), None);
        let plan = plan_replacement(&m, "Hi", MIN_SCALE_BULK, PAGE_W, PAGE_H).unwrap();
        let top = plan.erase.y + plan.erase.height;
        let bottom = plan.erase.y;
        assert!(bottom < 700.0 + metrics::descent(12.0));
        assert!(top > 700.0 + metrics::ascent(12.0));
    }
}
