//! Herb catalog lookup.
//!
//! Resolution priority:
//! 1. Exact identifier (positive ids only)
//! 2. Exact pinyin name
//! 3. Case-insensitive pinyin name
//!
//! Duplicate ids or names resolve to the first catalog entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use super::Ingredient;
use crate::models::Herb;

/// Which rule matched an ingredient to a catalog herb.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    Id,
    PinyinExact,
    PinyinIgnoreCase,
}

/// Read-only index over a herb catalog snapshot.
pub struct HerbCatalog<'a> {
    herbs: &'a [Herb],
    by_id: HashMap<i64, usize>,
    by_pinyin: HashMap<&'a str, usize>,
    by_pinyin_lower: HashMap<String, usize>,
}

impl<'a> HerbCatalog<'a> {
    /// Index a catalog snapshot. The slice is borrowed, never modified.
    pub fn new(herbs: &'a [Herb]) -> Self {
        let mut by_id = HashMap::with_capacity(herbs.len());
        let mut by_pinyin = HashMap::with_capacity(herbs.len());
        let mut by_pinyin_lower = HashMap::with_capacity(herbs.len());

        for (index, herb) in herbs.iter().enumerate() {
            by_id.entry(herb.id).or_insert(index);
            by_pinyin.entry(herb.pinyin_name.as_str()).or_insert(index);
            by_pinyin_lower
                .entry(herb.pinyin_name.to_lowercase())
                .or_insert(index);
        }

        Self {
            herbs,
            by_id,
            by_pinyin,
            by_pinyin_lower,
        }
    }

    pub fn len(&self) -> usize {
        self.herbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.herbs.is_empty()
    }

    pub fn herbs(&self) -> &'a [Herb] {
        self.herbs
    }

    pub fn by_id(&self, id: i64) -> Option<&'a Herb> {
        self.by_id.get(&id).map(|&i| &self.herbs[i])
    }

    pub fn by_pinyin_exact(&self, name: &str) -> Option<&'a Herb> {
        self.by_pinyin.get(name).map(|&i| &self.herbs[i])
    }

    pub fn by_pinyin_ignore_case(&self, name: &str) -> Option<&'a Herb> {
        self.by_pinyin_lower
            .get(&name.to_lowercase())
            .map(|&i| &self.herbs[i])
    }

    /// Resolve an ingredient to a catalog herb.
    pub fn resolve(&self, ingredient: &Ingredient) -> Option<(&'a Herb, MatchKind)> {
        if let Some(herb) = ingredient.lookup_id().and_then(|id| self.by_id(id)) {
            return Some((herb, MatchKind::Id));
        }

        if ingredient.name.is_empty() {
            return None;
        }

        if let Some(herb) = self.by_pinyin_exact(&ingredient.name) {
            return Some((herb, MatchKind::PinyinExact));
        }

        self.by_pinyin_ignore_case(&ingredient.name)
            .map(|herb| (herb, MatchKind::PinyinIgnoreCase))
    }

    /// Closest catalog herb by pinyin name, if similar enough.
    ///
    /// Used only to annotate diagnostics; never to resolve.
    pub fn suggest(&self, name: &str, threshold: f64) -> Option<&'a Herb> {
        if name.trim().is_empty() {
            return None;
        }
        let query = name.to_lowercase();

        self.herbs
            .iter()
            .map(|herb| (herb, jaro_winkler(&query, &herb.pinyin_name.to_lowercase())))
            .filter(|(_, score)| *score >= threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(herb, _)| herb)
    }
}
