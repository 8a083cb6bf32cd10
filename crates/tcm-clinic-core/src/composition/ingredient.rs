//! Raw ingredient records and their canonical form.
//!
//! Upstream composition entries use several key spellings for the same
//! thing (`herb`/`name`/`pinyinName`, `herbId`/`id`, `grams`/`dosage`).
//! They are mapped once, here, to a single [`Ingredient`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dosage::{coerce_grams, coerce_id, parse_dosage_grams};

const HERB_KEYS: &[&str] = &["herb"];
const NAME_KEYS: &[&str] = &["name"];
const PINYIN_KEYS: &[&str] = &["pinyinName", "pinyin_name"];
const HERB_ID_KEYS: &[&str] = &["herbId", "herb_id"];
const ID_KEYS: &[&str] = &["id"];
const GRAMS_KEYS: &[&str] = &["grams"];
const DOSAGE_KEYS: &[&str] = &["dosage"];
const FUNCTION_KEYS: &[&str] = &["function"];
const CHINESE_NAME_KEYS: &[&str] = &["chineseName", "chinese_name"];
const LATIN_NAME_KEYS: &[&str] = &["latinName", "latin_name"];
const ENGLISH_NAME_KEYS: &[&str] = &["englishName", "english_name"];

/// A composition entry exactly as found upstream.
///
/// Borrows the entry's JSON object. Every field is optional, and a field may
/// appear under more than one spelling in the same entry.
#[derive(Debug, Clone, Copy)]
pub struct RawIngredient<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawIngredient<'a> {
    /// View a JSON value as a raw entry. `None` unless it is an object.
    pub fn new(value: &'a Value) -> Option<Self> {
        value.as_object().map(|fields| Self { fields })
    }

    /// Every non-null value stored under any of `keys`, in key order.
    fn values(&self, keys: &'static [&'static str]) -> impl Iterator<Item = &'a Value> + 'a {
        let fields = self.fields;
        keys.iter()
            .filter_map(move |key| fields.get(*key))
            .filter(|v| !v.is_null())
    }

    /// First non-empty text under any of `keys`.
    fn text(&self, keys: &'static [&'static str]) -> Option<String> {
        self.values(keys).find_map(text_value)
    }

    /// The `herb` field when it holds an embedded herb record.
    fn embedded_herb(&self) -> Option<RawIngredient<'a>> {
        self.values(HERB_KEYS).find_map(RawIngredient::new)
    }
}

/// Where an ingredient's gram quantity came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuantitySource {
    /// A numeric `grams` field
    Grams,
    /// Parsed out of a free-text `dosage` field
    Dosage,
    /// Nothing usable; grams defaulted to zero
    Unspecified,
}

/// Canonical ingredient after boundary normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    /// Display name; empty when the entry named nothing
    pub name: String,
    /// Candidate identifier; 0 means "no identifier"
    pub id: i64,
    pub grams: f64,
    pub quantity_source: QuantitySource,
    /// Original dosage text, kept for diagnostics
    pub dosage_text: Option<String>,
    pub function: String,
    pub chinese_name: Option<String>,
    pub latin_name: Option<String>,
    pub english_name: Option<String>,
}

impl Ingredient {
    /// Normalize a single composition entry.
    ///
    /// Returns `None` for entries that are not JSON objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        RawIngredient::new(value).map(|raw| Self::from_raw(&raw))
    }

    /// Map a raw entry to canonical form.
    pub fn from_raw(raw: &RawIngredient<'_>) -> Self {
        let embedded = raw.embedded_herb();

        let name = raw
            .text(HERB_KEYS)
            .or_else(|| embedded.and_then(|h| h.text(PINYIN_KEYS)))
            .or_else(|| embedded.and_then(|h| h.text(NAME_KEYS)))
            .or_else(|| raw.text(NAME_KEYS))
            .or_else(|| raw.text(PINYIN_KEYS))
            .unwrap_or_default();

        let embedded_ids = embedded.into_iter().flat_map(|h| h.values(ID_KEYS));
        let id = raw
            .values(HERB_ID_KEYS)
            .chain(raw.values(ID_KEYS))
            .chain(embedded_ids)
            .filter_map(coerce_id)
            .find(|id| *id != 0)
            .unwrap_or(0);

        let dosage_text = raw.text(DOSAGE_KEYS);
        let grams = raw.values(GRAMS_KEYS).find_map(coerce_grams);
        let (grams, quantity_source) = match grams {
            // A zero weight is treated like an absent one and falls through to dosage
            Some(g) if g != 0.0 => (g, QuantitySource::Grams),
            _ => match dosage_text.as_deref().and_then(parse_dosage_grams) {
                Some(g) => (g, QuantitySource::Dosage),
                None => (0.0, QuantitySource::Unspecified),
            },
        };

        Self {
            name,
            id,
            grams,
            quantity_source,
            dosage_text,
            function: raw.text(FUNCTION_KEYS).unwrap_or_default(),
            chinese_name: raw.text(CHINESE_NAME_KEYS),
            latin_name: raw.text(LATIN_NAME_KEYS),
            english_name: raw.text(ENGLISH_NAME_KEYS),
        }
    }

    /// Identifier usable for catalog lookup (positive only).
    pub fn lookup_id(&self) -> Option<i64> {
        (self.id > 0).then_some(self.id)
    }
}

/// Non-empty text from a string or number value.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_priority() {
        let ing = Ingredient::from_value(&json!({
            "herb": "Gui Zhi", "name": "Cinnamon", "pinyinName": "gui zhi"
        }))
        .unwrap();
        assert_eq!(ing.name, "Gui Zhi");

        let ing = Ingredient::from_value(&json!({"name": "", "pinyinName": "Bai Shao"})).unwrap();
        assert_eq!(ing.name, "Bai Shao");

        let ing = Ingredient::from_value(&json!({"grams": 3})).unwrap();
        assert_eq!(ing.name, "");
    }

    #[test]
    fn test_identifier_priority() {
        let ing = Ingredient::from_value(&json!({"herbId": 4, "id": 9})).unwrap();
        assert_eq!(ing.id, 4);

        let ing = Ingredient::from_value(&json!({"herbId": 0, "id": 9})).unwrap();
        assert_eq!(ing.id, 9);

        let ing = Ingredient::from_value(&json!({"herbId": "12"})).unwrap();
        assert_eq!(ing.lookup_id(), Some(12));

        let ing = Ingredient::from_value(&json!({"herb": "Gan Cao"})).unwrap();
        assert_eq!(ing.id, 0);
        assert_eq!(ing.lookup_id(), None);

        let ing = Ingredient::from_value(&json!({"id": -3})).unwrap();
        assert_eq!(ing.lookup_id(), None);
    }

    #[test]
    fn test_embedded_herb_record() {
        let ing = Ingredient::from_value(&json!({
            "herb": {"id": 2, "pinyinName": "Bai Shao"}, "grams": 9
        }))
        .unwrap();
        assert_eq!(ing.name, "Bai Shao");
        assert_eq!(ing.id, 2);
    }

    #[test]
    fn test_quantity_sources() {
        let ing = Ingredient::from_value(&json!({"herb": "A", "grams": 5})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (5.0, QuantitySource::Grams));

        let ing = Ingredient::from_value(&json!({"herb": "A", "grams": "7.5"})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (7.5, QuantitySource::Grams));

        let ing = Ingredient::from_value(&json!({"herb": "A", "dosage": "3.5 g"})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (3.5, QuantitySource::Dosage));

        let ing = Ingredient::from_value(&json!({"herb": "A", "grams": 0, "dosage": "6g"})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (6.0, QuantitySource::Dosage));

        let ing = Ingredient::from_value(&json!({"herb": "A", "dosage": "as needed"})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (0.0, QuantitySource::Unspecified));
        assert_eq!(ing.dosage_text.as_deref(), Some("as needed"));
    }

    #[test]
    fn test_function_and_names() {
        let ing = Ingredient::from_value(&json!({
            "herb": "Gui Zhi",
            "function": "chief",
            "chineseName": "桂枝",
            "latin_name": "Ramulus Cinnamomi"
        }))
        .unwrap();
        assert_eq!(ing.function, "chief");
        assert_eq!(ing.chinese_name.as_deref(), Some("桂枝"));
        assert_eq!(ing.latin_name.as_deref(), Some("Ramulus Cinnamomi"));
        assert!(ing.english_name.is_none());

        let ing = Ingredient::from_value(&json!({"herb": "Gui Zhi"})).unwrap();
        assert_eq!(ing.function, "");
    }

    #[test]
    fn test_duplicate_key_spellings() {
        let ing = Ingredient::from_value(&json!({
            "pinyinName": "Gui Zhi", "pinyin_name": "gui zhi", "grams": 9
        }))
        .unwrap();
        assert_eq!(ing.name, "Gui Zhi");
        assert_eq!(ing.grams, 9.0);

        let ing = Ingredient::from_value(&json!({
            "herb": "Gui Zhi", "grams": 9, "herb_id": 1, "herbId": 1
        }))
        .unwrap();
        assert_eq!(ing.lookup_id(), Some(1));

        // A blank camelCase value does not hide the snake_case one
        let ing = Ingredient::from_value(&json!({
            "chineseName": "", "chinese_name": "白芍", "herbId": null, "herb_id": "2"
        }))
        .unwrap();
        assert_eq!(ing.chinese_name.as_deref(), Some("白芍"));
        assert_eq!(ing.id, 2);
    }

    #[test]
    fn test_invalid_grams_fall_through() {
        let ing = Ingredient::from_value(&json!({"herb": "A", "grams": -5, "dosage": "3g"})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (3.0, QuantitySource::Dosage));

        let ing = Ingredient::from_value(&json!({"herb": "A", "grams": "-2.5"})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (0.0, QuantitySource::Unspecified));

        let ing = Ingredient::from_value(&json!({"herb": "A", "grams": [9]})).unwrap();
        assert_eq!((ing.grams, ing.quantity_source), (0.0, QuantitySource::Unspecified));
    }

    #[test]
    fn test_non_object_entries_rejected() {
        assert!(Ingredient::from_value(&json!("Gui Zhi 9g")).is_none());
        assert!(Ingredient::from_value(&json!(["Gui Zhi", 9])).is_none());
        assert!(Ingredient::from_value(&json!(null)).is_none());
    }
}
