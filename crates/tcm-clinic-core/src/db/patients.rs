//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Patient;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, name, gender, date_of_birth, phone, constitution,
                allergies, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                patient.id,
                patient.name,
                patient.gender,
                patient.date_of_birth,
                patient.phone,
                patient.constitution,
                serde_json::to_string(&patient.allergies)?,
                patient.notes,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                gender = ?3,
                date_of_birth = ?4,
                phone = ?5,
                constitution = ?6,
                allergies = ?7,
                notes = ?8,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.name,
                patient.gender,
                patient.date_of_birth,
                patient.phone,
                patient.constitution,
                serde_json::to_string(&patient.allergies)?,
                patient.notes,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, gender, date_of_birth, phone, constitution,
                       allergies, notes, created_at, updated_at
                FROM patients
                WHERE id = ?
                "#,
                [id],
                PatientRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search patients by name (prefix match).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = format!("{}%", query);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, gender, date_of_birth, phone, constitution,
                   allergies, notes, created_at, updated_at
            FROM patients
            WHERE name LIKE ?
            ORDER BY name
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![pattern, limit as i64], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List all patients.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, gender, date_of_birth, phone, constitution,
                   allergies, notes, created_at, updated_at
            FROM patients
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }
}

struct PatientRow {
    id: String,
    name: String,
    gender: Option<String>,
    date_of_birth: Option<String>,
    phone: Option<String>,
    constitution: Option<String>,
    allergies: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            gender: row.get(2)?,
            date_of_birth: row.get(3)?,
            phone: row.get(4)?,
            constitution: row.get(5)?,
            allergies: row.get(6)?,
            notes: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.id,
            name: row.name,
            gender: row.gender,
            date_of_birth: row.date_of_birth,
            phone: row.phone,
            constitution: row.constitution,
            allergies: serde_json::from_str(&row.allergies)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut patient = Patient::new("Li Wei");
        patient.constitution = Some("qi deficiency".into());
        patient.allergies = vec!["Ban Xia".into()];

        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved, patient);
        assert!(db.get_patient("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let db = setup_db();
        let patient = Patient::new("Li Wei");
        db.insert_patient(&patient).unwrap();
        assert!(matches!(db.insert_patient(&patient), Err(DbError::Sqlite(_))));
    }

    #[test]
    fn test_update_patient() {
        let db = setup_db();

        let mut patient = Patient::new("Li Wei");
        db.insert_patient(&patient).unwrap();

        patient.phone = Some("555-0100".into());
        patient.notes = Some("Prefers granules".into());
        assert!(db.update_patient(&patient).unwrap());

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.phone, Some("555-0100".into()));
        assert_eq!(retrieved.notes, Some("Prefers granules".into()));

        assert!(!db.update_patient(&Patient::new("Nobody")).unwrap());
    }

    #[test]
    fn test_search_and_list_patients() {
        let db = setup_db();

        db.insert_patient(&Patient::new("Wang Fang")).unwrap();
        db.insert_patient(&Patient::new("Wang Lei")).unwrap();
        db.insert_patient(&Patient::new("Zhang Min")).unwrap();

        let results = db.search_patients("Wang", 10).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|p| p.name.starts_with("Wang")));

        let names: Vec<String> = db.list_patients().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Wang Fang", "Wang Lei", "Zhang Min"]);
    }
}
