//! Data-quality audit over the formula catalog.

use serde::{Deserialize, Serialize};

use crate::composition::{calculate_formula_total, CompositionDiagnostic, CompositionNormalizer, HerbCatalog};
use crate::models::{Formula, Herb};

/// Audit of every formula's composition against the herb catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Report metadata
    pub metadata: AuditMetadata,
    /// One entry per formula, in catalog order
    pub formulas: Vec<FormulaAudit>,
}

/// Audit report metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditMetadata {
    /// Report timestamp
    pub generated_at: String,
    pub formula_count: usize,
    pub herb_count: usize,
    /// Formulas with at least one diagnostic
    pub formulas_with_issues: usize,
    /// Diagnostics across all formulas
    pub issue_count: usize,
}

/// Normalization outcome for a single formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaAudit {
    pub formula_id: i64,
    pub pinyin_name: String,
    pub herb_count: usize,
    pub total_grams: f64,
    /// Herbs that matched nothing in the catalog
    pub unresolved_count: usize,
    pub diagnostics: Vec<CompositionDiagnostic>,
}

impl FormulaAudit {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl AuditReport {
    /// Audit with default normalizer settings.
    pub fn build(formulas: &[Formula], herbs: &[Herb]) -> Self {
        Self::build_with(&CompositionNormalizer::new(), formulas, herbs)
    }

    /// Audit using a configured normalizer. The catalog is indexed once.
    pub fn build_with(normalizer: &CompositionNormalizer, formulas: &[Formula], herbs: &[Herb]) -> Self {
        let catalog = HerbCatalog::new(herbs);

        let audits: Vec<FormulaAudit> = formulas
            .iter()
            .map(|formula| {
                let processed = normalizer.process(formula, &catalog);
                FormulaAudit {
                    formula_id: formula.id,
                    pinyin_name: formula.pinyin_name.clone(),
                    herb_count: processed.formula.herbs().len(),
                    total_grams: calculate_formula_total(&processed.formula),
                    unresolved_count: processed.formula.placeholders().count(),
                    diagnostics: processed.diagnostics,
                }
            })
            .collect();

        Self {
            metadata: AuditMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                formula_count: audits.len(),
                herb_count: herbs.len(),
                formulas_with_issues: audits.iter().filter(|a| !a.is_clean()).count(),
                issue_count: audits.iter().map(|a| a.diagnostics.len()).sum(),
            },
            formulas: audits,
        }
    }

    /// True when no formula produced a diagnostic.
    pub fn is_clean(&self) -> bool {
        self.metadata.issue_count == 0
    }

    /// Formulas that need attention.
    pub fn issues(&self) -> impl Iterator<Item = &FormulaAudit> {
        self.formulas.iter().filter(|a| !a.is_clean())
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
