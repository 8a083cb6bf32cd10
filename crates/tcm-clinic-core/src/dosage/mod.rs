//! Dosage parsing and prescription dosage calculation.
//!
//! Handles:
//! - Free-text dosage strings ("10g", "3.5 g", "6-9g") → grams
//! - Loosely-typed gram fields (numbers, numeric strings) → grams
//! - Scaling formulas and totalling prescriptions ([`calculator`])

mod calculator;

pub use calculator::*;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// First integer or decimal number in a string.
static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("Invalid dosage number regex"));

/// Extract grams from a free-text dosage string.
///
/// Takes the first numeric substring; ranges resolve to their lower bound.
/// Returns `None` when the text contains no number.
pub fn parse_dosage_grams(text: &str) -> Option<f64> {
    NUMBER_REGEX
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|g| g.is_finite())
}

/// Coerce a loosely-typed gram field to a number.
///
/// Numbers pass through; strings must be entirely numeric (after trimming).
/// Negative and non-finite weights are rejected.
pub fn coerce_grams(value: &Value) -> Option<f64> {
    let grams = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    grams.filter(|g| g.is_finite() && *g >= 0.0)
}

/// Coerce a loosely-typed identifier field to an integer.
///
/// Accepts integers, integral floats and numeric strings.
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Sum gram quantities, treating non-finite values as zero.
pub fn sum_grams<I>(grams: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    grams
        .into_iter()
        .map(|g| if g.is_finite() { g } else { 0.0 })
        .fold(0.0, |acc, g| acc + g)
}
