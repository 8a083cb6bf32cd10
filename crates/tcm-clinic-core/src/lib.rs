//! TCM Clinic Core Library
//!
//! Local herb and formula catalog with composition normalization and
//! prescription dosage calculation.
//!
//! # Architecture
//!
//! ```text
//!   Herb import ──────────────┐           Formula import
//!                             │                  │
//!                             ▼                  ▼
//!                    ┌─────────────────────────────────┐
//!                    │  SQLite store (herbs + FTS5,    │
//!                    │  formulas stored as received)   │
//!                    └────────────────┬────────────────┘
//!                                     │ read
//!                                     ▼
//!         Composition → Ingredient entries → Catalog resolution → Totals
//!                                     │
//!                     ┌───────────────┼────────────────┐
//!                     ▼               ▼                ▼
//!              Formula view     Prescription       Catalog
//!             (with herbs)        dosage            audit
//!                                     │
//!                                     ▼
//!                            Prescription sheet
//!                               (JSON / CSV)
//! ```
//!
//! # Core Principle
//!
//! **Normalization never fails.** Malformed compositions degrade to empty or
//! placeholder data and are reported as diagnostics, never as errors.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 search
//! - [`models`]: Domain types (Herb, Formula, Patient, Prescription, etc.)
//! - [`composition`]: Composition normalizer and herb catalog lookup
//! - [`dosage`]: Dosage parsing, formula scaling and prescription totals
//! - [`export`]: Prescription sheets and catalog audits
//! - [`config`]: Startup configuration

pub mod composition;
pub mod config;
pub mod db;
pub mod dosage;
pub mod export;
pub mod models;

// Re-export commonly used types
pub use composition::{
    calculate_formula_total, process_formula_with_herbs, CompositionDiagnostic,
    CompositionNormalizer, HerbCatalog, ProcessedFormula,
};
pub use config::{ClinicConfig, ConfigError};
pub use db::{Database, DbError};
pub use dosage::{calculate_prescription, scale_formula, DosageCalculator, PrescriptionDosage};
pub use export::{AuditReport, PrescriptionSheet};
pub use models::{
    Composition, Formula, FormulaHerb, FormulaWithHerbs, Herb, Patient, Prescription,
    PrescriptionItem,
};

use std::sync::{Arc, Mutex};

use tracing::info;

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::LockPoisoned(e.to_string())
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic service over a single database.
#[derive(Clone)]
pub struct TcmClinic {
    db: Arc<Mutex<Database>>,
    config: ClinicConfig,
}

impl TcmClinic {
    /// Open or create the database named by `config`.
    pub fn open(config: ClinicConfig) -> ClinicResult<Self> {
        let db = Database::open(config.db_path())?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }

    /// Create an in-memory clinic with default settings (for testing).
    pub fn open_in_memory() -> ClinicResult<Self> {
        Self::open_in_memory_with(ClinicConfig::default())
    }

    /// Create an in-memory clinic; the config's database path is ignored.
    pub fn open_in_memory_with(config: ClinicConfig) -> ClinicResult<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    fn normalizer(&self) -> CompositionNormalizer {
        CompositionNormalizer::new().with_suggestion_threshold(self.config.suggestion_threshold())
    }

    fn calculator(&self) -> DosageCalculator {
        DosageCalculator::new()
            .with_normalizer(self.normalizer())
            .with_standard_formula_grams(self.config.standard_formula_grams())
    }

    // =========================================================================
    // Herb Operations
    // =========================================================================

    /// Add or update a herb.
    pub fn upsert_herb(&self, herb: &Herb) -> ClinicResult<()> {
        let db = self.db.lock()?;
        db.upsert_herb(herb)?;
        Ok(())
    }

    /// Add or update many herbs atomically. Returns the number written.
    pub fn import_herbs(&self, herbs: &[Herb]) -> ClinicResult<usize> {
        let db = self.db.lock()?;
        db.in_transaction(|db| {
            for herb in herbs {
                db.upsert_herb(herb)?;
            }
            Ok(())
        })?;
        info!(count = herbs.len(), "imported herbs");
        Ok(herbs.len())
    }

    pub fn get_herb(&self, id: i64) -> ClinicResult<Option<Herb>> {
        let db = self.db.lock()?;
        Ok(db.get_herb(id)?)
    }

    pub fn get_herb_by_pinyin(&self, pinyin_name: &str) -> ClinicResult<Option<Herb>> {
        let db = self.db.lock()?;
        Ok(db.get_herb_by_pinyin(pinyin_name)?)
    }

    pub fn list_herbs(&self) -> ClinicResult<Vec<Herb>> {
        let db = self.db.lock()?;
        Ok(db.list_herbs()?)
    }

    /// Search herbs by pinyin, Chinese, English or Latin name.
    pub fn search_herbs(&self, query: &str, limit: usize) -> ClinicResult<Vec<Herb>> {
        let db = self.db.lock()?;
        Ok(db.search_herbs(query, limit)?)
    }

    pub fn delete_herb(&self, id: i64) -> ClinicResult<bool> {
        let db = self.db.lock()?;
        Ok(db.delete_herb(id)?)
    }

    // =========================================================================
    // Formula Operations
    // =========================================================================

    /// Add or update a formula. The composition is stored as received.
    pub fn upsert_formula(&self, formula: &Formula) -> ClinicResult<()> {
        let db = self.db.lock()?;
        db.upsert_formula(formula)?;
        Ok(())
    }

    /// Add or update many formulas atomically. Returns the number written.
    pub fn import_formulas(&self, formulas: &[Formula]) -> ClinicResult<usize> {
        let db = self.db.lock()?;
        db.in_transaction(|db| {
            for formula in formulas {
                db.upsert_formula(formula)?;
            }
            Ok(())
        })?;
        info!(count = formulas.len(), "imported formulas");
        Ok(formulas.len())
    }

    pub fn get_formula(&self, id: i64) -> ClinicResult<Option<Formula>> {
        let db = self.db.lock()?;
        Ok(db.get_formula(id)?)
    }

    pub fn get_formula_by_pinyin(&self, pinyin_name: &str) -> ClinicResult<Option<Formula>> {
        let db = self.db.lock()?;
        Ok(db.get_formula_by_pinyin(pinyin_name)?)
    }

    /// Look a formula up by numeric id or, failing that, by pinyin name.
    pub fn find_formula(&self, key: &str) -> ClinicResult<Option<Formula>> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ClinicError::InvalidInput("formula key cannot be empty".into()));
        }

        let db = self.db.lock()?;
        if let Ok(id) = key.parse::<i64>() {
            if let Some(formula) = db.get_formula(id)? {
                return Ok(Some(formula));
            }
        }
        Ok(db.get_formula_by_pinyin(key)?)
    }

    pub fn list_formulas(&self) -> ClinicResult<Vec<Formula>> {
        let db = self.db.lock()?;
        Ok(db.list_formulas()?)
    }

    pub fn delete_formula(&self, id: i64) -> ClinicResult<bool> {
        let db = self.db.lock()?;
        Ok(db.delete_formula(id)?)
    }

    /// Resolve a stored formula against the current herb catalog.
    pub fn formula_with_herbs(&self, id: i64) -> ClinicResult<ProcessedFormula> {
        let (formula, herbs) = {
            let db = self.db.lock()?;
            let formula = db
                .get_formula(id)?
                .ok_or_else(|| ClinicError::NotFound(format!("formula {}", id)))?;
            (formula, db.list_herbs()?)
        };
        Ok(self.normalizer().process_with_herbs(&formula, &herbs))
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create and store a new patient.
    pub fn create_patient(&self, name: &str) -> ClinicResult<Patient> {
        if name.trim().is_empty() {
            return Err(ClinicError::InvalidInput("patient name cannot be empty".into()));
        }
        let patient = Patient::new(name.trim());
        let db = self.db.lock()?;
        db.insert_patient(&patient)?;
        Ok(patient)
    }

    pub fn insert_patient(&self, patient: &Patient) -> ClinicResult<()> {
        let db = self.db.lock()?;
        db.insert_patient(patient)?;
        Ok(())
    }

    /// Update an existing patient; unknown patients are an error.
    pub fn update_patient(&self, patient: &Patient) -> ClinicResult<()> {
        let db = self.db.lock()?;
        if !db.update_patient(patient)? {
            return Err(ClinicError::NotFound(format!("patient {}", patient.id)));
        }
        Ok(())
    }

    pub fn get_patient(&self, id: &str) -> ClinicResult<Option<Patient>> {
        let db = self.db.lock()?;
        Ok(db.get_patient(id)?)
    }

    pub fn search_patients(&self, query: &str, limit: usize) -> ClinicResult<Vec<Patient>> {
        let db = self.db.lock()?;
        Ok(db.search_patients(query, limit)?)
    }

    pub fn list_patients(&self) -> ClinicResult<Vec<Patient>> {
        let db = self.db.lock()?;
        Ok(db.list_patients()?)
    }

    // =========================================================================
    // Prescription Operations
    // =========================================================================

    pub fn insert_prescription(&self, prescription: &Prescription) -> ClinicResult<()> {
        let db = self.db.lock()?;
        db.insert_prescription(prescription)?;
        Ok(())
    }

    pub fn get_prescription(&self, id: &str) -> ClinicResult<Option<Prescription>> {
        let db = self.db.lock()?;
        Ok(db.get_prescription(id)?)
    }

    pub fn list_prescriptions_for_patient(&self, patient_id: &str) -> ClinicResult<Vec<Prescription>> {
        let db = self.db.lock()?;
        Ok(db.list_prescriptions_for_patient(patient_id)?)
    }

    pub fn delete_prescription(&self, id: &str) -> ClinicResult<bool> {
        let db = self.db.lock()?;
        Ok(db.delete_prescription(id)?)
    }

    /// Calculate per-packet and dispensed weights for a stored prescription.
    pub fn prescription_dosage(&self, id: &str) -> ClinicResult<PrescriptionDosage> {
        let (_, _, dosage) = self.load_prescription(id)?;
        Ok(dosage)
    }

    /// Load a prescription, its patient and its calculated dosage under one lock.
    fn load_prescription(&self, id: &str) -> ClinicResult<(Prescription, Patient, PrescriptionDosage)> {
        let (prescription, patient, herbs, formulas) = {
            let db = self.db.lock()?;
            let prescription = db
                .get_prescription(id)?
                .ok_or_else(|| ClinicError::NotFound(format!("prescription {}", id)))?;
            let patient = db.get_patient(&prescription.patient_id)?.ok_or_else(|| {
                ClinicError::NotFound(format!("patient {}", prescription.patient_id))
            })?;

            let mut formulas = Vec::new();
            for formula_id in prescription.formula_ids() {
                if let Some(formula) = db.get_formula(formula_id)? {
                    formulas.push(formula);
                }
            }
            (prescription, patient, db.list_herbs()?, formulas)
        };

        let dosage = self.calculator().calculate(&prescription, &herbs, &formulas);
        Ok((prescription, patient, dosage))
    }

    fn prescription_sheet(&self, id: &str) -> ClinicResult<PrescriptionSheet> {
        let (prescription, patient, dosage) = self.load_prescription(id)?;
        Ok(PrescriptionSheet::build(&prescription, &patient, &dosage))
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export a prescription sheet as JSON.
    pub fn export_prescription_json(&self, id: &str) -> ClinicResult<String> {
        Ok(self.prescription_sheet(id)?.to_json()?)
    }

    /// Export a prescription sheet as CSV.
    pub fn export_prescription_csv(&self, id: &str) -> ClinicResult<String> {
        Ok(self.prescription_sheet(id)?.to_csv())
    }

    /// Normalize every stored formula and report data-quality issues.
    pub fn audit(&self) -> ClinicResult<AuditReport> {
        let (formulas, herbs) = {
            let db = self.db.lock()?;
            (db.list_formulas()?, db.list_herbs()?)
        };
        let report = AuditReport::build_with(&self.normalizer(), &formulas, &herbs);
        info!(
            formulas = report.metadata.formula_count,
            issues = report.metadata.issue_count,
            "audited formula catalog"
        );
        Ok(report)
    }
}
