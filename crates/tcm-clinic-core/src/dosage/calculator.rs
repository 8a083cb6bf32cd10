//! Formula scaling and prescription totals.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sum_grams;
use crate::composition::{CompositionNormalizer, HerbCatalog};
use crate::models::{Formula, FormulaWithHerbs, Herb, Prescription, PrescriptionItem};

/// Reference weight a formula's quantities are expressed against.
pub const DEFAULT_STANDARD_FORMULA_GRAMS: f64 = 100.0;

/// A formula herb rescaled to a target weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScaledHerb {
    pub herb_id: i64,
    pub pinyin_name: String,
    pub chinese_name: Option<String>,
    pub grams: f64,
    pub function: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved: bool,
}

/// Rescale every herb so the formula weighs `target_grams` in total.
///
/// A formula with no weight scales every herb to zero.
pub fn scale_formula(formula: &FormulaWithHerbs, target_grams: f64) -> Vec<ScaledHerb> {
    let total = crate::composition::calculate_formula_total(formula);
    let factor = if total > 0.0 && target_grams.is_finite() {
        target_grams / total
    } else {
        0.0
    };

    formula
        .herbs()
        .iter()
        .map(|entry| ScaledHerb {
            herb_id: entry.herb.id,
            pinyin_name: entry.herb.pinyin_name.clone(),
            chinese_name: entry.herb.chinese_name.clone(),
            grams: entry.grams_or_zero() * factor,
            function: entry.function.clone(),
            unresolved: entry.unresolved,
        })
        .collect()
}

/// Where a prescription line's weight came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineSource {
    /// Prescribed on its own
    Direct,
    /// Contributed by a formula item
    #[serde(rename_all = "camelCase")]
    Formula {
        formula_id: i64,
        formula_name: String,
    },
}

/// One herb in a prescription, merged across every item that contributes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DosageLine {
    pub herb_id: i64,
    pub pinyin_name: String,
    pub chinese_name: Option<String>,
    pub grams_per_packet: f64,
    /// grams_per_packet × packets
    pub total_grams: f64,
    pub sources: Vec<LineSource>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved: bool,
}

/// A prescription item whose herb or formula is not in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MissingReference {
    #[serde(rename_all = "camelCase")]
    Herb { herb_id: i64 },
    #[serde(rename_all = "camelCase")]
    Formula { formula_id: i64 },
}

/// Calculated weights for a whole prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDosage {
    pub prescription_id: String,
    pub packets: u32,
    pub lines: Vec<DosageLine>,
    pub per_packet_grams: f64,
    pub total_grams: f64,
    #[serde(default)]
    pub missing: Vec<MissingReference>,
}

impl PrescriptionDosage {
    pub fn line_for_herb(&self, herb_id: i64) -> Option<&DosageLine> {
        self.lines
            .iter()
            .find(|line| !line.unresolved && line.herb_id == herb_id)
    }

    /// True when every item resolved.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.lines.iter().all(|line| !line.unresolved)
    }
}

/// Expands prescriptions into merged per-herb weights.
#[derive(Debug, Clone)]
pub struct DosageCalculator {
    normalizer: CompositionNormalizer,
    standard_formula_grams: f64,
}

impl Default for DosageCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DosageCalculator {
    pub fn new() -> Self {
        Self {
            normalizer: CompositionNormalizer::new(),
            standard_formula_grams: DEFAULT_STANDARD_FORMULA_GRAMS,
        }
    }

    /// Weight used for formula items that carry no target of their own.
    pub fn with_standard_formula_grams(mut self, grams: f64) -> Self {
        if grams.is_finite() && grams > 0.0 {
            self.standard_formula_grams = grams;
        }
        self
    }

    pub fn with_normalizer(mut self, normalizer: CompositionNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn standard_formula_grams(&self) -> f64 {
        self.standard_formula_grams
    }

    /// Calculate per-packet and dispensed weights for a prescription.
    ///
    /// Unknown herbs and formulas are listed in `missing`; they never fail
    /// the calculation.
    pub fn calculate(
        &self,
        prescription: &Prescription,
        herbs: &[Herb],
        formulas: &[Formula],
    ) -> PrescriptionDosage {
        let catalog = HerbCatalog::new(herbs);
        let packets = prescription.packet_count();
        let mut lines: Vec<DosageLine> = Vec::new();
        let mut missing = Vec::new();

        for item in &prescription.items {
            match item {
                PrescriptionItem::Herb { herb_id, grams } => match catalog.by_id(*herb_id) {
                    Some(herb) => merge_line(
                        &mut lines,
                        Contribution {
                            herb_id: herb.id,
                            pinyin_name: &herb.pinyin_name,
                            chinese_name: herb.chinese_name.as_deref(),
                            grams: *grams,
                            unresolved: false,
                        },
                        LineSource::Direct,
                    ),
                    None => {
                        warn!(prescription_id = %prescription.id, herb_id, "prescribed herb not in catalog");
                        missing.push(MissingReference::Herb { herb_id: *herb_id });
                    }
                },
                PrescriptionItem::Formula {
                    formula_id,
                    target_grams,
                } => {
                    let Some(formula) = formulas.iter().find(|f| f.id == *formula_id) else {
                        warn!(prescription_id = %prescription.id, formula_id, "prescribed formula not found");
                        missing.push(MissingReference::Formula {
                            formula_id: *formula_id,
                        });
                        continue;
                    };

                    let resolved = self.normalizer.process(formula, &catalog).into_formula();
                    let target = target_grams.unwrap_or(self.standard_formula_grams);
                    for scaled in scale_formula(&resolved, target) {
                        merge_line(
                            &mut lines,
                            Contribution {
                                herb_id: scaled.herb_id,
                                pinyin_name: &scaled.pinyin_name,
                                chinese_name: scaled.chinese_name.as_deref(),
                                grams: scaled.grams,
                                unresolved: scaled.unresolved,
                            },
                            LineSource::Formula {
                                formula_id: formula.id,
                                formula_name: formula.pinyin_name.clone(),
                            },
                        );
                    }
                }
            }
        }

        for line in &mut lines {
            line.total_grams = line.grams_per_packet * f64::from(packets);
        }
        let per_packet_grams = sum_grams(lines.iter().map(|l| l.grams_per_packet));

        debug!(
            prescription_id = %prescription.id,
            lines = lines.len(),
            per_packet_grams,
            packets,
            missing = missing.len(),
            "calculated prescription dosage"
        );

        PrescriptionDosage {
            prescription_id: prescription.id.clone(),
            packets,
            lines,
            per_packet_grams,
            total_grams: per_packet_grams * f64::from(packets),
            missing,
        }
    }
}

/// Calculate prescription weights with default settings.
pub fn calculate_prescription(
    prescription: &Prescription,
    herbs: &[Herb],
    formulas: &[Formula],
) -> PrescriptionDosage {
    DosageCalculator::new().calculate(prescription, herbs, formulas)
}

struct Contribution<'a> {
    herb_id: i64,
    pinyin_name: &'a str,
    chinese_name: Option<&'a str>,
    grams: f64,
    unresolved: bool,
}

/// Catalog herbs merge by id; unresolved ones by name, since their ids are unreliable.
fn merge_line(lines: &mut Vec<DosageLine>, c: Contribution<'_>, source: LineSource) {
    let grams = if c.grams.is_finite() { c.grams } else { 0.0 };

    let existing = lines.iter_mut().find(|line| {
        line.unresolved == c.unresolved
            && if c.unresolved {
                line.pinyin_name.eq_ignore_ascii_case(c.pinyin_name)
            } else {
                line.herb_id == c.herb_id
            }
    });

    match existing {
        Some(line) => {
            line.grams_per_packet += grams;
            if !line.sources.contains(&source) {
                line.sources.push(source);
            }
        }
        None => lines.push(DosageLine {
            herb_id: c.herb_id,
            pinyin_name: c.pinyin_name.to_string(),
            chinese_name: c.chinese_name.map(str::to_string),
            grams_per_packet: grams,
            total_grams: 0.0,
            sources: vec![source],
            unresolved: c.unresolved,
        }),
    }
}
