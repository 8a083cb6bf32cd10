//! Formula models and the resolved formula-with-herbs view.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::herb::Herb;

/// How a formula's ingredient list arrived from upstream.
///
/// Historical imports store the list either as a structured array or as an
/// encoded JSON string; some records have nothing at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Composition {
    /// Already a sequence of raw ingredient records
    Entries(Vec<Value>),
    /// JSON text that should decode to a sequence of raw ingredient records
    Encoded(String),
    /// Null or absent
    #[default]
    Missing,
    /// Any other JSON value
    Unrecognized(Value),
}

impl Composition {
    /// Wrap raw JSON text.
    pub fn encoded(text: impl Into<String>) -> Self {
        Composition::Encoded(text.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Composition::Missing)
    }
}

/// A classical or modified formula (fang ji).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    /// Catalog identifier
    pub id: i64,
    /// Pinyin name, nominally unique (e.g., "Gui Zhi Tang")
    pub pinyin_name: String,
    pub chinese_name: Option<String>,
    pub english_name: Option<String>,
    pub category: Option<String>,
    /// Therapeutic actions (e.g., "Releases the exterior, harmonizes ying and wei")
    pub actions: Option<String>,
    pub indications: Option<String>,
    pub contraindications: Option<String>,
    /// Preparation and administration notes
    pub preparation: Option<String>,
    /// Classical source text
    pub source: Option<String>,
    /// Raw ingredient list as stored upstream
    #[serde(default)]
    pub composition: Composition,
    /// Precomputed resolved herbs, when the upstream record was already normalized
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub herbs: Vec<FormulaHerb>,
    /// Precomputed total weight in grams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_grams: Option<f64>,
}

impl Formula {
    /// Create a new formula with required fields.
    pub fn new(id: i64, pinyin_name: impl Into<String>, composition: Composition) -> Self {
        Self {
            id,
            pinyin_name: pinyin_name.into(),
            chinese_name: None,
            english_name: None,
            category: None,
            actions: None,
            indications: None,
            contraindications: None,
            preparation: None,
            source: None,
            composition,
            herbs: Vec::new(),
            total_grams: None,
        }
    }

    /// Whether the record already carries a resolved herb list.
    pub fn is_normalized(&self) -> bool {
        !self.herbs.is_empty()
    }
}

/// A catalog herb as it appears inside a formula.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormulaHerb {
    #[serde(flatten)]
    pub herb: Herb,
    /// Quantity in grams
    pub grams: f64,
    /// Share of the formula; numerically equal to grams under the 100 g convention
    pub percentage: f64,
    /// Role or function within the formula (e.g., "chief", "releases the exterior")
    #[serde(default)]
    pub function: String,
    /// Set when the ingredient matched nothing in the catalog
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved: bool,
}

impl FormulaHerb {
    pub fn new(herb: Herb, grams: f64, function: impl Into<String>) -> Self {
        Self {
            herb,
            grams,
            percentage: grams,
            function: function.into(),
            unresolved: false,
        }
    }

    /// Entry for an ingredient with no catalog match.
    pub fn placeholder(herb: Herb, grams: f64, function: impl Into<String>) -> Self {
        Self {
            unresolved: true,
            ..Self::new(herb, grams, function)
        }
    }

    /// Gram quantity with non-finite values treated as zero.
    pub fn grams_or_zero(&self) -> f64 {
        if self.grams.is_finite() {
            self.grams
        } else {
            0.0
        }
    }
}

/// A formula plus its resolved herbs and total weight.
///
/// Derived on demand and never persisted. Any mutation of the herb list
/// through this type clears the cached total so it is recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormulaWithHerbs {
    /// The formula's own fields (its `herbs`/`total_grams` are always empty here)
    #[serde(flatten)]
    pub formula: Formula,
    herbs: Vec<FormulaHerb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_grams: Option<f64>,
}

impl FormulaWithHerbs {
    /// Build from a formula and a resolved herb list.
    ///
    /// Any herbs or total carried on the formula record itself are discarded.
    pub fn new(mut formula: Formula, herbs: Vec<FormulaHerb>, total_grams: Option<f64>) -> Self {
        formula.herbs.clear();
        formula.total_grams = None;
        Self {
            formula,
            herbs,
            total_grams,
        }
    }

    pub fn herbs(&self) -> &[FormulaHerb] {
        &self.herbs
    }

    /// Cached total, if one was computed or supplied and not since invalidated.
    pub fn total_grams(&self) -> Option<f64> {
        self.total_grams
    }

    /// Append a herb. Clears the cached total.
    pub fn push_herb(&mut self, herb: FormulaHerb) {
        self.herbs.push(herb);
        self.total_grams = None;
    }

    /// Change the gram quantity of the herb at `index`. Clears the cached total.
    ///
    /// Returns false when the index is out of range.
    pub fn set_grams(&mut self, index: usize, grams: f64) -> bool {
        match self.herbs.get_mut(index) {
            Some(entry) => {
                entry.grams = grams;
                entry.percentage = grams;
                self.total_grams = None;
                true
            }
            None => false,
        }
    }

    /// Mutable access to the herb list. Clears the cached total.
    pub fn herbs_mut(&mut self) -> &mut Vec<FormulaHerb> {
        self.total_grams = None;
        &mut self.herbs
    }

    /// Entries that did not resolve against the catalog.
    pub fn placeholders(&self) -> impl Iterator<Item = &FormulaHerb> {
        self.herbs.iter().filter(|h| h.unresolved)
    }
}

impl From<FormulaWithHerbs> for Formula {
    /// Fold the resolved view back into a formula record, as an API would return it.
    fn from(resolved: FormulaWithHerbs) -> Self {
        let mut formula = resolved.formula;
        formula.herbs = resolved.herbs;
        formula.total_grams = resolved.total_grams;
        formula
    }
}
