//! Formula database operations.
//!
//! Compositions are stored as the JSON value they arrived as. Normalization
//! happens on read, never on write.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Formula;

const FORMULA_COLUMNS: &str = r#"
    id, pinyin_name, chinese_name, english_name, category, actions,
    indications, contraindications, preparation, source,
    composition, herbs, total_grams
"#;

impl Database {
    /// Insert or update a formula, keyed by id.
    pub fn upsert_formula(&self, formula: &Formula) -> DbResult<()> {
        if formula.pinyin_name.trim().is_empty() {
            return Err(DbError::Constraint(format!(
                "formula {} has an empty pinyin name",
                formula.id
            )));
        }

        self.conn.execute(
            r#"
            INSERT INTO formulas (
                id, pinyin_name, chinese_name, english_name, category, actions,
                indications, contraindications, preparation, source,
                composition, herbs, total_grams, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                pinyin_name = excluded.pinyin_name,
                chinese_name = excluded.chinese_name,
                english_name = excluded.english_name,
                category = excluded.category,
                actions = excluded.actions,
                indications = excluded.indications,
                contraindications = excluded.contraindications,
                preparation = excluded.preparation,
                source = excluded.source,
                composition = excluded.composition,
                herbs = excluded.herbs,
                total_grams = excluded.total_grams,
                updated_at = datetime('now')
            "#,
            params![
                formula.id,
                formula.pinyin_name,
                formula.chinese_name,
                formula.english_name,
                formula.category,
                formula.actions,
                formula.indications,
                formula.contraindications,
                formula.preparation,
                formula.source,
                serde_json::to_string(&formula.composition)?,
                serde_json::to_string(&formula.herbs)?,
                formula.total_grams,
            ],
        )?;
        Ok(())
    }

    /// Get a formula by id.
    pub fn get_formula(&self, id: i64) -> DbResult<Option<Formula>> {
        let sql = format!("SELECT {} FROM formulas WHERE id = ?", FORMULA_COLUMNS);
        self.conn
            .query_row(&sql, [id], FormulaRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a formula by pinyin name: exact match first, then case-insensitive.
    pub fn get_formula_by_pinyin(&self, pinyin_name: &str) -> DbResult<Option<Formula>> {
        let sql = format!(
            r#"
            SELECT {} FROM formulas
            WHERE pinyin_name = ?1 COLLATE NOCASE
            ORDER BY (pinyin_name = ?1) DESC, id
            LIMIT 1
            "#,
            FORMULA_COLUMNS
        );
        self.conn
            .query_row(&sql, [pinyin_name], FormulaRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get every formula, ordered by id.
    pub fn list_formulas(&self) -> DbResult<Vec<Formula>> {
        let sql = format!("SELECT {} FROM formulas ORDER BY id", FORMULA_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], FormulaRow::from_row)?;

        let mut formulas = Vec::new();
        for row in rows {
            formulas.push(row?.try_into()?);
        }
        Ok(formulas)
    }

    /// Delete a formula.
    pub fn delete_formula(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM formulas WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct FormulaRow {
    id: i64,
    pinyin_name: String,
    chinese_name: Option<String>,
    english_name: Option<String>,
    category: Option<String>,
    actions: Option<String>,
    indications: Option<String>,
    contraindications: Option<String>,
    preparation: Option<String>,
    source: Option<String>,
    composition: String,
    herbs: String,
    total_grams: Option<f64>,
}

impl FormulaRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pinyin_name: row.get(1)?,
            chinese_name: row.get(2)?,
            english_name: row.get(3)?,
            category: row.get(4)?,
            actions: row.get(5)?,
            indications: row.get(6)?,
            contraindications: row.get(7)?,
            preparation: row.get(8)?,
            source: row.get(9)?,
            composition: row.get(10)?,
            herbs: row.get(11)?,
            total_grams: row.get(12)?,
        })
    }
}

impl TryFrom<FormulaRow> for Formula {
    type Error = DbError;

    fn try_from(row: FormulaRow) -> Result<Self, Self::Error> {
        Ok(Formula {
            id: row.id,
            pinyin_name: row.pinyin_name,
            chinese_name: row.chinese_name,
            english_name: row.english_name,
            category: row.category,
            actions: row.actions,
            indications: row.indications,
            contraindications: row.contraindications,
            preparation: row.preparation,
            source: row.source,
            composition: serde_json::from_str(&row.composition)?,
            herbs: serde_json::from_str(&row.herbs)?,
            total_grams: row.total_grams,
        })
    }
}
