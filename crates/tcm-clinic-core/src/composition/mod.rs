//! Formula composition normalizer.
//!
//! Pipeline: Composition → Ingredient entries → Catalog resolution → Totals
//!
//! Historical formula records are dirty, so nothing here fails: parse errors,
//! unknown shapes, unmatched herbs and missing quantities all degrade to
//! defaults and are reported as [`CompositionDiagnostic`]s next to the result.

mod catalog;
mod ingredient;

pub use catalog::*;
pub use ingredient::*;

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dosage::sum_grams;
use crate::models::{Composition, Formula, FormulaHerb, FormulaWithHerbs, Herb};

/// Default similarity needed before a catalog name is offered as a suggestion.
pub const DEFAULT_SUGGESTION_THRESHOLD: f64 = 0.85;

/// A non-fatal data-quality finding from normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompositionDiagnostic {
    /// Composition text was not valid JSON
    #[serde(rename_all = "camelCase")]
    ParseFailed { message: String },
    /// Composition decoded to something other than a list
    #[serde(rename_all = "camelCase")]
    UnrecognizedComposition { found: String },
    /// A list entry was not an object and was skipped
    #[serde(rename_all = "camelCase")]
    UnrecognizedIngredient { index: usize, found: String },
    /// An entry matched nothing in the catalog; a placeholder was used
    #[serde(rename_all = "camelCase")]
    UnresolvedIngredient {
        index: usize,
        name: String,
        herb_id: Option<i64>,
        suggestion: Option<String>,
    },
    /// An entry had no usable gram quantity; zero was used
    #[serde(rename_all = "camelCase")]
    MissingQuantity {
        index: usize,
        name: String,
        dosage: Option<String>,
    },
}

impl fmt::Display for CompositionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseFailed { message } => write!(f, "composition is not valid JSON: {}", message),
            Self::UnrecognizedComposition { found } => {
                write!(f, "composition has type {}, expected a list", found)
            }
            Self::UnrecognizedIngredient { index, found } => {
                write!(f, "entry {} has type {}, expected an object; skipped", index, found)
            }
            Self::UnresolvedIngredient {
                index,
                name,
                suggestion,
                ..
            } => {
                write!(f, "entry {} ({:?}) not found in herb catalog", index, name)?;
                if let Some(s) = suggestion {
                    write!(f, "; did you mean {:?}?", s)?;
                }
                Ok(())
            }
            Self::MissingQuantity {
                index,
                name,
                dosage,
            } => match dosage {
                Some(d) => write!(f, "entry {} ({:?}) dosage {:?} has no number", index, name, d),
                None => write!(f, "entry {} ({:?}) has no grams or dosage", index, name),
            },
        }
    }
}

/// Normalization output: the resolved formula and everything worth flagging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFormula {
    pub formula: FormulaWithHerbs,
    pub diagnostics: Vec<CompositionDiagnostic>,
}

impl ProcessedFormula {
    /// True when normalization found nothing to report.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Discard diagnostics.
    pub fn into_formula(self) -> FormulaWithHerbs {
        self.formula
    }
}

/// Reconciles raw formula compositions against a herb catalog.
#[derive(Debug, Clone)]
pub struct CompositionNormalizer {
    suggestion_threshold: f64,
}

impl Default for CompositionNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionNormalizer {
    /// Create a normalizer with the default suggestion threshold.
    pub fn new() -> Self {
        Self {
            suggestion_threshold: DEFAULT_SUGGESTION_THRESHOLD,
        }
    }

    /// Set the similarity needed for an unresolved-name suggestion (clamped to 0..=1).
    pub fn with_suggestion_threshold(mut self, threshold: f64) -> Self {
        self.suggestion_threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_SUGGESTION_THRESHOLD
        };
        self
    }

    pub fn suggestion_threshold(&self) -> f64 {
        self.suggestion_threshold
    }

    /// Resolve a formula against an already-indexed catalog.
    pub fn process(&self, formula: &Formula, catalog: &HerbCatalog<'_>) -> ProcessedFormula {
        if formula.is_normalized() {
            debug!(formula_id = formula.id, "formula already carries herbs; returning as-is");
            return ProcessedFormula {
                formula: FormulaWithHerbs::new(
                    formula.clone(),
                    formula.herbs.clone(),
                    formula.total_grams,
                ),
                diagnostics: Vec::new(),
            };
        }

        let mut diagnostics = Vec::new();
        let entries = extract_entries(&formula.composition, &mut diagnostics);

        let mut herbs = Vec::with_capacity(entries.len());
        for (index, value) in entries.iter().enumerate() {
            match Ingredient::from_value(value) {
                Some(ingredient) => {
                    herbs.push(self.resolve(index, ingredient, catalog, &mut diagnostics));
                }
                None => {
                    let found = json_type_name(value).to_string();
                    warn!(formula_id = formula.id, index, found = %found, "skipping unrecognized composition entry");
                    diagnostics.push(CompositionDiagnostic::UnrecognizedIngredient { index, found });
                }
            }
        }

        let total = sum_grams(herbs.iter().map(|h: &FormulaHerb| h.grams));
        debug!(
            formula_id = formula.id,
            herbs = herbs.len(),
            total_grams = total,
            issues = diagnostics.len(),
            "normalized formula composition"
        );

        ProcessedFormula {
            formula: FormulaWithHerbs::new(formula.clone(), herbs, Some(total)),
            diagnostics,
        }
    }

    /// Index `herbs` and resolve a single formula.
    pub fn process_with_herbs(&self, formula: &Formula, herbs: &[Herb]) -> ProcessedFormula {
        self.process(formula, &HerbCatalog::new(herbs))
    }

    fn resolve(
        &self,
        index: usize,
        ingredient: Ingredient,
        catalog: &HerbCatalog<'_>,
        diagnostics: &mut Vec<CompositionDiagnostic>,
    ) -> FormulaHerb {
        if ingredient.quantity_source == QuantitySource::Unspecified {
            diagnostics.push(CompositionDiagnostic::MissingQuantity {
                index,
                name: ingredient.name.clone(),
                dosage: ingredient.dosage_text.clone(),
            });
        }

        if let Some((herb, kind)) = catalog.resolve(&ingredient) {
            debug!(index, name = %ingredient.name, herb_id = herb.id, ?kind, "resolved ingredient");
            return FormulaHerb::new(herb.clone(), ingredient.grams, ingredient.function);
        }

        let suggestion = catalog
            .suggest(&ingredient.name, self.suggestion_threshold)
            .map(|h| h.pinyin_name.clone());
        warn!(
            index,
            name = %ingredient.name,
            herb_id = ingredient.id,
            suggestion = suggestion.as_deref().unwrap_or(""),
            "ingredient not found in herb catalog; using placeholder"
        );
        diagnostics.push(CompositionDiagnostic::UnresolvedIngredient {
            index,
            name: ingredient.name.clone(),
            herb_id: ingredient.lookup_id(),
            suggestion,
        });

        let mut placeholder = Herb::placeholder(ingredient.id, ingredient.name);
        placeholder.chinese_name = ingredient.chinese_name;
        placeholder.latin_name = ingredient.latin_name;
        placeholder.english_name = ingredient.english_name;
        FormulaHerb::placeholder(placeholder, ingredient.grams, ingredient.function)
    }
}

/// Produce the canonical formula-with-herbs view of `formula`.
///
/// Never fails; see [`CompositionNormalizer::process`] for the diagnostics.
pub fn process_formula_with_herbs(formula: &Formula, herbs: &[Herb]) -> FormulaWithHerbs {
    CompositionNormalizer::new()
        .process_with_herbs(formula, herbs)
        .into_formula()
}

/// Total weight of a resolved formula in grams.
///
/// A positive cached total is trusted; otherwise the herb quantities are summed.
pub fn calculate_formula_total(formula: &FormulaWithHerbs) -> f64 {
    match formula.total_grams() {
        Some(total) if total > 0.0 => total,
        _ => sum_grams(formula.herbs().iter().map(FormulaHerb::grams_or_zero)),
    }
}

/// Turn a composition into a list of raw entries.
fn extract_entries<'c>(
    composition: &'c Composition,
    diagnostics: &mut Vec<CompositionDiagnostic>,
) -> Cow<'c, [Value]> {
    match composition {
        Composition::Entries(entries) => Cow::Borrowed(entries.as_slice()),
        Composition::Missing => Cow::Owned(Vec::new()),
        Composition::Unrecognized(value) => {
            let found = json_type_name(value).to_string();
            warn!(found = %found, "composition is not a list; treating as empty");
            diagnostics.push(CompositionDiagnostic::UnrecognizedComposition { found });
            Cow::Owned(Vec::new())
        }
        Composition::Encoded(text) => Cow::Owned(decode_entries(text, diagnostics)),
    }
}

/// Decode JSON composition text, unwrapping one level of double encoding.
fn decode_entries(text: &str, diagnostics: &mut Vec<CompositionDiagnostic>) -> Vec<Value> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut decoded = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "failed to parse composition JSON; treating as empty");
            diagnostics.push(CompositionDiagnostic::ParseFailed {
                message: e.to_string(),
            });
            return Vec::new();
        }
    };

    if let Value::String(inner) = &decoded {
        if let Ok(value) = serde_json::from_str::<Value>(inner) {
            decoded = value;
        }
    }

    match decoded {
        Value::Array(entries) => entries,
        Value::Null => Vec::new(),
        other => {
            let found = json_type_name(&other).to_string();
            warn!(found = %found, "composition JSON is not a list; treating as empty");
            diagnostics.push(CompositionDiagnostic::UnrecognizedComposition { found });
            Vec::new()
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
