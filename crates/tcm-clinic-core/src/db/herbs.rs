//! Herb catalog database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Herb;

const HERB_COLUMNS: &str = r#"
    h.id, h.pinyin_name, h.chinese_name, h.latin_name, h.english_name,
    h.category, h.nature, h.flavor, h.toxicity, h.meridians, h.dosage,
    h.indications, h.contraindications, h.cautions, h.pharmacology, h.research
"#;

impl Database {
    /// Insert or update a herb, keyed by id.
    pub fn upsert_herb(&self, herb: &Herb) -> DbResult<()> {
        if herb.pinyin_name.trim().is_empty() {
            return Err(DbError::Constraint(format!(
                "herb {} has an empty pinyin name",
                herb.id
            )));
        }

        self.conn.execute(
            r#"
            INSERT INTO herbs (
                id, pinyin_name, chinese_name, latin_name, english_name,
                category, nature, flavor, toxicity, meridians, dosage,
                indications, contraindications, cautions, pharmacology, research, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                pinyin_name = excluded.pinyin_name,
                chinese_name = excluded.chinese_name,
                latin_name = excluded.latin_name,
                english_name = excluded.english_name,
                category = excluded.category,
                nature = excluded.nature,
                flavor = excluded.flavor,
                toxicity = excluded.toxicity,
                meridians = excluded.meridians,
                dosage = excluded.dosage,
                indications = excluded.indications,
                contraindications = excluded.contraindications,
                cautions = excluded.cautions,
                pharmacology = excluded.pharmacology,
                research = excluded.research,
                updated_at = datetime('now')
            "#,
            params![
                herb.id,
                herb.pinyin_name,
                herb.chinese_name,
                herb.latin_name,
                herb.english_name,
                herb.category,
                herb.nature,
                serde_json::to_string(&herb.flavor)?,
                herb.toxicity,
                serde_json::to_string(&herb.meridians)?,
                herb.dosage,
                serde_json::to_string(&herb.indications)?,
                serde_json::to_string(&herb.contraindications)?,
                serde_json::to_string(&herb.cautions)?,
                serde_json::to_string(&herb.pharmacology)?,
                herb.research,
            ],
        )?;
        Ok(())
    }

    /// Get a herb by id.
    pub fn get_herb(&self, id: i64) -> DbResult<Option<Herb>> {
        let sql = format!("SELECT {} FROM herbs h WHERE h.id = ?", HERB_COLUMNS);
        self.conn
            .query_row(&sql, [id], HerbRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a herb by pinyin name: exact match first, then case-insensitive.
    pub fn get_herb_by_pinyin(&self, pinyin_name: &str) -> DbResult<Option<Herb>> {
        let sql = format!(
            r#"
            SELECT {} FROM herbs h
            WHERE h.pinyin_name = ?1 COLLATE NOCASE
            ORDER BY (h.pinyin_name = ?1) DESC, h.id
            LIMIT 1
            "#,
            HERB_COLUMNS
        );
        self.conn
            .query_row(&sql, [pinyin_name], HerbRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get every herb, ordered by id.
    ///
    /// This is the catalog snapshot handed to the composition normalizer.
    pub fn list_herbs(&self) -> DbResult<Vec<Herb>> {
        let sql = format!("SELECT {} FROM herbs h ORDER BY h.id", HERB_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], HerbRow::from_row)?;

        let mut herbs = Vec::new();
        for row in rows {
            herbs.push(row?.try_into()?);
        }
        Ok(herbs)
    }

    /// Search herbs by any name form using FTS5 (BM25 ranking).
    pub fn search_herbs(&self, query: &str, limit: usize) -> DbResult<Vec<Herb>> {
        // Escape special FTS5 characters and add prefix matching
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {}, bm25(herbs_fts) as rank
            FROM herbs h
            JOIN herbs_fts fts ON h.id = fts.rowid
            WHERE herbs_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
            HERB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![escaped_query, limit as i64], HerbRow::from_row)?;

        let mut herbs = Vec::new();
        for row in rows {
            herbs.push(row?.try_into()?);
        }
        Ok(herbs)
    }

    /// Delete a herb.
    pub fn delete_herb(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM herbs WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct HerbRow {
    id: i64,
    pinyin_name: String,
    chinese_name: Option<String>,
    latin_name: Option<String>,
    english_name: Option<String>,
    category: Option<String>,
    nature: Option<String>,
    flavor: String,
    toxicity: Option<String>,
    meridians: String,
    dosage: Option<String>,
    indications: String,
    contraindications: String,
    cautions: String,
    pharmacology: String,
    research: Option<String>,
}

impl HerbRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pinyin_name: row.get(1)?,
            chinese_name: row.get(2)?,
            latin_name: row.get(3)?,
            english_name: row.get(4)?,
            category: row.get(5)?,
            nature: row.get(6)?,
            flavor: row.get(7)?,
            toxicity: row.get(8)?,
            meridians: row.get(9)?,
            dosage: row.get(10)?,
            indications: row.get(11)?,
            contraindications: row.get(12)?,
            cautions: row.get(13)?,
            pharmacology: row.get(14)?,
            research: row.get(15)?,
        })
    }
}

impl TryFrom<HerbRow> for Herb {
    type Error = DbError;

    fn try_from(row: HerbRow) -> Result<Self, Self::Error> {
        Ok(Herb {
            id: row.id,
            pinyin_name: row.pinyin_name,
            chinese_name: row.chinese_name,
            latin_name: row.latin_name,
            english_name: row.english_name,
            category: row.category,
            nature: row.nature,
            flavor: serde_json::from_str(&row.flavor)?,
            toxicity: row.toxicity,
            meridians: serde_json::from_str(&row.meridians)?,
            dosage: row.dosage,
            indications: serde_json::from_str(&row.indications)?,
            contraindications: serde_json::from_str(&row.contraindications)?,
            cautions: serde_json::from_str(&row.cautions)?,
            pharmacology: serde_json::from_str(&row.pharmacology)?,
            research: row.research,
        })
    }
}

/// Escape special FTS5 characters and prepare query for prefix matching.
fn escape_fts_query(query: &str) -> String {
    // Remove special FTS5 operators and add wildcard for prefix matching
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn gui_zhi() -> Herb {
        let mut herb = Herb::new(1, "Gui Zhi");
        herb.chinese_name = Some("桂枝".into());
        herb.latin_name = Some("Ramulus Cinnamomi".into());
        herb.english_name = Some("Cinnamon Twig".into());
        herb.nature = Some("warm".into());
        herb.flavor = vec!["acrid".into(), "sweet".into()];
        herb.meridians = vec!["Heart".into(), "Lung".into(), "Bladder".into()];
        herb.dosage = Some("3-9g".into());
        herb
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();
        db.upsert_herb(&gui_zhi()).unwrap();

        let retrieved = db.get_herb(1).unwrap().unwrap();
        assert_eq!(retrieved, gui_zhi());
        assert!(db.get_herb(2).unwrap().is_none());
    }

    #[test]
    fn test_upsert_updates() {
        let db = setup_db();

        let mut herb = gui_zhi();
        db.upsert_herb(&herb).unwrap();

        herb.english_name = Some("Cassia Twig".into());
        db.upsert_herb(&herb).unwrap();

        let retrieved = db.get_herb(1).unwrap().unwrap();
        assert_eq!(retrieved.english_name.as_deref(), Some("Cassia Twig"));
        assert_eq!(db.list_herbs().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_pinyin_rejected() {
        let db = setup_db();
        let result = db.upsert_herb(&Herb::new(5, "  "));
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_get_by_pinyin() {
        let db = setup_db();
        db.upsert_herb(&Herb::new(3, "Sheng Jiang")).unwrap();
        db.upsert_herb(&Herb::new(4, "sheng jiang")).unwrap();

        assert_eq!(db.get_herb_by_pinyin("sheng jiang").unwrap().unwrap().id, 4);
        assert_eq!(db.get_herb_by_pinyin("Sheng Jiang").unwrap().unwrap().id, 3);
        assert_eq!(db.get_herb_by_pinyin("SHENG JIANG").unwrap().unwrap().id, 3);
        assert!(db.get_herb_by_pinyin("Gan Jiang").unwrap().is_none());
    }

    #[test]
    fn test_search_herbs() {
        let db = setup_db();
        db.upsert_herb(&gui_zhi()).unwrap();

        let mut bai_shao = Herb::new(2, "Bai Shao");
        bai_shao.english_name = Some("White Peony Root".into());
        db.upsert_herb(&bai_shao).unwrap();

        // Search by pinyin
        let results = db.search_herbs("gui zhi", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);

        // Search by English name
        let results = db.search_herbs("peony", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);

        // Prefix search
        let results = db.search_herbs("cinna", 10).unwrap();
        assert_eq!(results.len(), 1);

        // Operators are stripped rather than interpreted
        assert!(db.search_herbs("\"*", 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_herb() {
        let db = setup_db();
        db.upsert_herb(&gui_zhi()).unwrap();

        assert!(db.delete_herb(1).unwrap());
        assert!(!db.delete_herb(1).unwrap());
        assert!(db.search_herbs("gui", 10).unwrap().is_empty());
    }

    #[test]
    fn test_escape_fts_query() {
        assert_eq!(escape_fts_query("gui zhi"), "gui* zhi*");
        assert_eq!(escape_fts_query("gui\"-zhi"), "guizhi*");
        assert_eq!(escape_fts_query(""), "");
    }
}
