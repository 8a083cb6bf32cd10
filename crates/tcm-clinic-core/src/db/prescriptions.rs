//! Prescription database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Prescription;

impl Database {
    /// Insert a new prescription. The patient must already exist.
    pub fn insert_prescription(&self, prescription: &Prescription) -> DbResult<()> {
        if self.get_patient(&prescription.patient_id)?.is_none() {
            return Err(DbError::Constraint(format!(
                "prescription {} references unknown patient {}",
                prescription.id, prescription.patient_id
            )));
        }

        self.conn.execute(
            r#"
            INSERT INTO prescriptions (
                id, patient_id, items, packets, diagnosis, instructions,
                notes, prescribed_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                prescription.id,
                prescription.patient_id,
                serde_json::to_string(&prescription.items)?,
                prescription.packet_count(),
                prescription.diagnosis,
                prescription.instructions,
                prescription.notes,
                prescription.prescribed_by,
                prescription.created_at,
                prescription.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a prescription by ID.
    pub fn get_prescription(&self, id: &str) -> DbResult<Option<Prescription>> {
        self.conn
            .query_row(
                r#"
                SELECT id, patient_id, items, packets, diagnosis, instructions,
                       notes, prescribed_by, created_at, updated_at
                FROM prescriptions
                WHERE id = ?
                "#,
                [id],
                PrescriptionRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all prescriptions for a patient, newest first.
    pub fn list_prescriptions_for_patient(&self, patient_id: &str) -> DbResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, items, packets, diagnosis, instructions,
                   notes, prescribed_by, created_at, updated_at
            FROM prescriptions
            WHERE patient_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], PrescriptionRow::from_row)?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(row?.try_into()?);
        }
        Ok(prescriptions)
    }

    /// Delete a prescription.
    pub fn delete_prescription(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM prescriptions WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    id: String,
    patient_id: String,
    items: String,
    packets: u32,
    diagnosis: Option<String>,
    instructions: Option<String>,
    notes: Option<String>,
    prescribed_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PrescriptionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            items: row.get(2)?,
            packets: row.get(3)?,
            diagnosis: row.get(4)?,
            instructions: row.get(5)?,
            notes: row.get(6)?,
            prescribed_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        Ok(Prescription {
            id: row.id,
            patient_id: row.patient_id,
            items: serde_json::from_str(&row.items)?,
            packets: row.packets,
            diagnosis: row.diagnosis,
            instructions: row.instructions,
            notes: row.notes,
            prescribed_by: row.prescribed_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PrescriptionItem};

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Li Wei");
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, patient) = setup_db();

        let mut rx = Prescription::new(&patient.id);
        rx.packets = 7;
        rx.diagnosis = Some("wind-cold exterior".into());
        rx.add_formula(1, Some(42.0)).add_herb(6, 6.0);
        db.insert_prescription(&rx).unwrap();

        let retrieved = db.get_prescription(&rx.id).unwrap().unwrap();
        assert_eq!(retrieved, rx);
        assert_eq!(
            retrieved.items[1],
            PrescriptionItem::Herb {
                herb_id: 6,
                grams: 6.0
            }
        );
    }

    #[test]
    fn test_unknown_patient_rejected() {
        let (db, _) = setup_db();
        let rx = Prescription::new("no-such-patient");
        assert!(matches!(
            db.insert_prescription(&rx),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_zero_packets_stored_as_one() {
        let (db, patient) = setup_db();
        let mut rx = Prescription::new(&patient.id);
        rx.packets = 0;
        db.insert_prescription(&rx).unwrap();

        assert_eq!(db.get_prescription(&rx.id).unwrap().unwrap().packets, 1);
    }

    #[test]
    fn test_list_for_patient_and_delete() {
        let (db, patient) = setup_db();
        let other = Patient::new("Zhang Min");
        db.insert_patient(&other).unwrap();

        let first = Prescription::new(&patient.id);
        let second = Prescription::new(&patient.id);
        db.insert_prescription(&first).unwrap();
        db.insert_prescription(&second).unwrap();
        db.insert_prescription(&Prescription::new(&other.id)).unwrap();

        let listed = db.list_prescriptions_for_patient(&patient.id).unwrap();
        assert_eq!(listed.len(), 2);

        assert!(db.delete_prescription(&first.id).unwrap());
        assert!(!db.delete_prescription(&first.id).unwrap());
        let listed = db.list_prescriptions_for_patient(&patient.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, second.id);
    }
}
