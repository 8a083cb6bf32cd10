//! Herb catalog models.

use serde::{Deserialize, Serialize};

/// A single entry in the herb catalog (materia medica).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Herb {
    /// Catalog identifier
    pub id: i64,
    /// Pinyin name, nominally unique (e.g., "Gui Zhi")
    pub pinyin_name: String,
    /// Chinese characters (e.g., "桂枝")
    #[serde(default)]
    pub chinese_name: Option<String>,
    /// Pharmaceutical Latin name (e.g., "Ramulus Cinnamomi")
    #[serde(default)]
    pub latin_name: Option<String>,
    /// Common English name
    #[serde(default)]
    pub english_name: Option<String>,
    /// Materia medica category (e.g., "Warm, acrid herbs that release the exterior")
    #[serde(default)]
    pub category: Option<String>,
    /// Thermal nature (cold, cool, neutral, warm, hot)
    #[serde(default)]
    pub nature: Option<String>,
    /// Flavors (e.g., ["acrid", "sweet"])
    #[serde(default)]
    pub flavor: Vec<String>,
    /// Toxicity note, absent for non-toxic herbs
    #[serde(default)]
    pub toxicity: Option<String>,
    /// Channels entered (e.g., ["Heart", "Lung", "Bladder"])
    #[serde(default)]
    pub meridians: Vec<String>,
    /// Free-text dosage range (e.g., "3-9g")
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub indications: Vec<String>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    #[serde(default)]
    pub cautions: Vec<String>,
    #[serde(default)]
    pub pharmacology: Vec<String>,
    #[serde(default)]
    pub research: Option<String>,
}

impl Herb {
    /// Create a new herb with required fields.
    pub fn new(id: i64, pinyin_name: impl Into<String>) -> Self {
        Self {
            id,
            pinyin_name: pinyin_name.into(),
            ..Default::default()
        }
    }

    /// Minimal stand-in for an ingredient that matched nothing in the catalog.
    ///
    /// Carries identity only; catalog attributes (meridians, indications, etc.) stay empty.
    pub fn placeholder(id: i64, name: impl Into<String>) -> Self {
        Self::new(id, name)
    }
}
