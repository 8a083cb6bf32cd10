//! Prescription models.

use serde::{Deserialize, Serialize};

/// One line of a prescription: a single herb or a whole formula.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PrescriptionItem {
    /// A single herb at a fixed weight per packet
    #[serde(rename_all = "camelCase")]
    Herb { herb_id: i64, grams: f64 },
    /// A formula, optionally scaled to a target weight per packet
    #[serde(rename_all = "camelCase")]
    Formula {
        formula_id: i64,
        /// Total grams per packet; `None` uses the standard formula weight
        target_grams: Option<f64>,
    },
}

/// A prescription written for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// Unique prescription ID
    pub id: String,
    /// Patient ID
    pub patient_id: String,
    /// Herbs and formulas making up one packet
    pub items: Vec<PrescriptionItem>,
    /// Number of packets (daily decoctions) dispensed
    pub packets: u32,
    /// TCM pattern diagnosis (e.g., "wind-cold exterior, ying-wei disharmony")
    pub diagnosis: Option<String>,
    /// Administration instructions
    pub instructions: Option<String>,
    pub notes: Option<String>,
    /// Practitioner who wrote the prescription
    pub prescribed_by: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Prescription {
    /// Create a new one-packet prescription for a patient.
    pub fn new(patient_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.into(),
            items: Vec::new(),
            packets: 1,
            diagnosis: None,
            instructions: None,
            notes: None,
            prescribed_by: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Add a single herb.
    pub fn add_herb(&mut self, herb_id: i64, grams: f64) -> &mut Self {
        self.items.push(PrescriptionItem::Herb { herb_id, grams });
        self
    }

    /// Add a formula, optionally scaled to a target weight.
    pub fn add_formula(&mut self, formula_id: i64, target_grams: Option<f64>) -> &mut Self {
        self.items.push(PrescriptionItem::Formula {
            formula_id,
            target_grams,
        });
        self
    }

    /// Packet count, never less than one.
    pub fn packet_count(&self) -> u32 {
        self.packets.max(1)
    }

    /// Formula IDs referenced by this prescription, in item order.
    pub fn formula_ids(&self) -> Vec<i64> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PrescriptionItem::Formula { formula_id, .. } => Some(*formula_id),
                PrescriptionItem::Herb { .. } => None,
            })
            .collect()
    }
}
