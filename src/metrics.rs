//! Fallback font metrics (Helvetica, standard-14).
//!
//! All width measurement in the engine goes through this table: fit checks,
//! width calibration, and the final draw all use the same numbers, so the
//! measurement source is deterministic. Widths are standard PostScript AFM
//! metrics in units of 1/1000 em.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Helvetica ascender in font units.
pub const ASCENDER: f64 = 718.0;
/// Helvetica descender in font units (negative, below baseline).
pub const DESCENDER: f64 = -207.0;

const UNITS_PER_EM: f64 = 1000.0;

/// Width used for characters outside the table.
const DEFAULT_WIDTH: f64 = 500.0;

/// The PDF name the replacement engine draws with.
pub const FALLBACK_FONT_NAME: &str = "Helvetica";

static WIDTHS: Lazy<HashMap<char, f64>> = Lazy::new(|| {
    let pairs: &[(char, f64)] = &[
        (' ', 278.0),
        ('!', 278.0),
        ('"', 355.0),
        ('#', 556.0),
        ('$', 556.0),
        ('%', 889.0),
        ('&', 667.0),
        ('\'', 191.0),
        ('(', 333.0),
        (')', 333.0),
        ('*', 389.0),
        ('+', 584.0),
        (',', 278.0),
        ('-', 333.0),
        ('.', 278.0),
        ('/', 278.0),
        ('0', 556.0),
        ('1', 556.0),
        ('2', 556.0),
        ('3', 556.0),
        ('4', 556.0),
        ('5', 556.0),
        ('6', 556.0),
        ('7', 556.0),
        ('8', 556.0),
        ('9', 556.0),
        (':', 278.0),
        (';', 278.0),
        ('<', 584.0),
        ('=', 584.0),
        ('>', 584.0),
        ('?', 556.0),
        ('@', 1015.0),
        ('A', 667.0),
        ('B', 667.0),
        ('C', 722.0),
        ('D', 722.0),
        ('E', 667.0),
        ('F', 611.0),
        ('G', 778.0),
        ('H', 722.0),
        ('I', 278.0),
        ('J', 500.0),
        ('K', 667.0),
        ('L', 556.0),
        ('M', 833.0),
        ('N', 722.0),
        ('O', 778.0),
        ('P', 667.0),
        ('Q', 778.0),
        ('R', 722.0),
        ('S', 667.0),
        ('T', 611.0),
        ('U', 722.0),
        ('V', 667.0),
        ('W', 944.0),
        ('X', 667.0),
        ('Y', 667.0),
        ('Z', 611.0),
        ('[', 278.0),
        ('\\', 278.0),
        (']', 278.0),
        ('^', 469.0),
        ('_', 556.0),
        ('`', 333.0),
        ('a', 556.0),
        ('b', 556.0),
        ('c', 500.0),
        ('d', 556.0),
        ('e', 556.0),
        ('f', 278.0),
        ('g', 556.0),
        ('h', 556.0),
        ('i', 222.0),
        ('j', 222.0),
        ('k', 500.0),
        ('l', 222.0),
        ('m', 833.0),
        ('n', 556.0),
        ('o', 556.0),
        ('p', 556.0),
        ('q', 556.0),
        ('r', 333.0),
        ('s', 500.0),
        ('t', 278.0),
        ('u', 556.0),
        ('v', 500.0),
        ('w', 722.0),
        ('x', 500.0),
        ('y', 500.0),
        ('z', 500.0),
        ('{', 334.0),
        ('|', 260.0),
        ('}', 334.0),
        ('~', 584.0),
    ];
    pairs.iter().copied().collect()
});

/// Width of a single character in font units (1/1000 em).
pub fn char_width(ch: char) -> f64 {
    *WIDTHS.get(&ch).unwrap_or(&DEFAULT_WIDTH)
}

/// Width of `text` in points at the given font size.
pub fn width_of(text: &str, size: f64) -> f64 {
    let units: f64 = text.chars().map(char_width).sum();
    units * size / UNITS_PER_EM
}

/// Ascender height in points at the given font size.
pub fn ascent(size: f64) -> f64 {
    ASCENDER * size / UNITS_PER_EM
}

/// Descender depth in points at the given font size (negative).
pub fn descent(size: f64) -> f64 {
    DESCENDER * size / UNITS_PER_EM
}

/// Total glyph-box height (ascender to descender) in points.
pub fn height_at(size: f64) -> f64 {
    (ASCENDER - DESCENDER) * size / UNITS_PER_EM
}
