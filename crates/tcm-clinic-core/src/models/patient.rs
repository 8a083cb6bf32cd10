//! Patient models.

use serde::{Deserialize, Serialize};

/// A clinic patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// UUID generated locally
    pub id: String,
    /// Full name
    pub name: String,
    pub gender: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    /// TCM body constitution (e.g., "qi deficiency", "damp-heat")
    pub constitution: Option<String>,
    /// Allergies and sensitivities, checked when prescribing
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Additional notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            gender: None,
            date_of_birth: None,
            phone: None,
            constitution: None,
            allergies: Vec::new(),
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Check whether the patient has a recorded allergy to a herb name.
    pub fn is_allergic_to(&self, herb_name: &str) -> bool {
        let wanted = herb_name.to_lowercase();
        self.allergies.iter().any(|a| a.to_lowercase() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("Li Wei");
        assert_eq!(patient.name, "Li Wei");
        assert_eq!(patient.id.len(), 36); // UUID format
        assert_eq!(patient.created_at, patient.updated_at);
    }

    #[test]
    fn test_allergy_check() {
        let mut patient = Patient::new("Li Wei");
        patient.allergies = vec!["Ban Xia".into()];
        assert!(patient.is_allergic_to("ban xia"));
        assert!(!patient.is_allergic_to("Gui Zhi"));
    }
}
