//! Prescription sheet export for dispensing.

use serde::{Deserialize, Serialize};

use crate::dosage::{DosageLine, LineSource, MissingReference, PrescriptionDosage};
use crate::models::{Patient, Prescription};

/// Dispensing sheet for a single prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionSheet {
    /// Export metadata
    pub metadata: SheetMetadata,
    /// One line per herb, merged across items
    pub lines: Vec<SheetLine>,
    pub per_packet_grams: f64,
    pub total_grams: f64,
    /// Items that could not be dispensed
    pub missing: Vec<MissingReference>,
    /// Herb names the patient has a recorded allergy to
    pub allergy_warnings: Vec<String>,
}

/// Prescription sheet metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetMetadata {
    pub prescription_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub diagnosis: Option<String>,
    pub instructions: Option<String>,
    pub prescribed_by: Option<String>,
    pub packets: u32,
    /// Prescription creation timestamp
    pub prescribed_at: String,
    /// Export timestamp
    pub exported_at: String,
}

/// Single herb line on the sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetLine {
    pub herb_id: i64,
    pub pinyin_name: String,
    pub chinese_name: Option<String>,
    pub grams_per_packet: f64,
    pub total_grams: f64,
    /// Human-readable origin, e.g. "Gui Zhi Tang; direct"
    pub source: String,
    pub unresolved: bool,
}

impl SheetLine {
    fn from_dosage(line: &DosageLine) -> Self {
        let source = line
            .sources
            .iter()
            .map(|s| match s {
                LineSource::Direct => "direct".to_string(),
                LineSource::Formula { formula_name, .. } => formula_name.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            herb_id: line.herb_id,
            pinyin_name: line.pinyin_name.clone(),
            chinese_name: line.chinese_name.clone(),
            grams_per_packet: round_grams(line.grams_per_packet),
            total_grams: round_grams(line.total_grams),
            source,
            unresolved: line.unresolved,
        }
    }
}

impl PrescriptionSheet {
    /// Build a sheet from a prescription, its patient and its calculated dosage.
    pub fn build(prescription: &Prescription, patient: &Patient, dosage: &PrescriptionDosage) -> Self {
        let lines: Vec<SheetLine> = dosage.lines.iter().map(SheetLine::from_dosage).collect();

        let mut allergy_warnings: Vec<String> = lines
            .iter()
            .filter(|line| patient.is_allergic_to(&line.pinyin_name))
            .map(|line| line.pinyin_name.clone())
            .collect();
        allergy_warnings.dedup();

        Self {
            metadata: SheetMetadata {
                prescription_id: prescription.id.clone(),
                patient_id: patient.id.clone(),
                patient_name: patient.name.clone(),
                diagnosis: prescription.diagnosis.clone(),
                instructions: prescription.instructions.clone(),
                prescribed_by: prescription.prescribed_by.clone(),
                packets: dosage.packets,
                prescribed_at: prescription.created_at.clone(),
                exported_at: chrono::Utc::now().to_rfc3339(),
            },
            lines,
            per_packet_grams: round_grams(dosage.per_packet_grams),
            total_grams: round_grams(dosage.total_grams),
            missing: dosage.missing.clone(),
            allergy_warnings,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("prescription_id,patient_name,herb_id,pinyin_name,chinese_name,grams_per_packet,packets,total_grams,source\n");

        // Lines
        for line in &self.lines {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                escape_csv(&self.metadata.prescription_id),
                escape_csv(&self.metadata.patient_name),
                line.herb_id,
                escape_csv(&line.pinyin_name),
                escape_csv(line.chinese_name.as_deref().unwrap_or("")),
                line.grams_per_packet,
                self.metadata.packets,
                line.total_grams,
                escape_csv(&line.source),
            ));
        }

        csv
    }
}

/// Round to a tenth of a gram, the precision of a dispensary scale.
fn round_grams(grams: f64) -> f64 {
    (grams * 10.0).round() / 10.0
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dosage::calculate_prescription;
    use crate::models::{Composition, Formula, Herb};
    use serde_json::json;

    fn make_sheet() -> PrescriptionSheet {
        let herbs = vec![
            Herb::new(1, "Gui Zhi"),
            Herb::new(2, "Bai Shao"),
            Herb::new(6, "Ma Huang"),
        ];
        let formula = Formula::new(
            100,
            "Gui Zhi Tang, modified",
            Composition::Entries(vec![
                json!({"herb": "Gui Zhi", "grams": 9}),
                json!({"herb": "Bai Shao", "grams": 9}),
            ]),
        );

        let mut patient = Patient::new("Li Wei");
        patient.allergies = vec!["ma huang".into()];

        let mut rx = Prescription::new(&patient.id);
        rx.packets = 3;
        rx.diagnosis = Some("wind-cold".into());
        rx.add_formula(100, Some(18.0)).add_herb(1, 1.0).add_herb(6, 3.0);

        let dosage = calculate_prescription(&rx, &herbs, &[formula]);
        PrescriptionSheet::build(&rx, &patient, &dosage)
    }

    #[test]
    fn test_sheet_build() {
        let sheet = make_sheet();

        assert_eq!(sheet.metadata.patient_name, "Li Wei");
        assert_eq!(sheet.metadata.packets, 3);
        assert_eq!(sheet.lines.len(), 3);
        assert_eq!(sheet.lines[0].grams_per_packet, 10.0);
        assert_eq!(sheet.lines[0].total_grams, 30.0);
        assert_eq!(sheet.lines[0].source, "Gui Zhi Tang, modified; direct");
        assert_eq!(sheet.per_packet_grams, 22.0);
        assert_eq!(sheet.total_grams, 66.0);
        assert_eq!(sheet.allergy_warnings, vec!["Ma Huang"]);
    }

    #[test]
    fn test_sheet_json() {
        let json = make_sheet().to_json().unwrap();
        assert!(json.contains("Gui Zhi"));
        assert!(json.contains("wind-cold"));
    }

    #[test]
    fn test_sheet_csv() {
        let csv = make_sheet().to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4); // Header + 3 herbs
        assert!(lines[0].starts_with("prescription_id"));
        assert!(lines[1].contains(",Gui Zhi,"));
        assert!(lines[1].ends_with("\"Gui Zhi Tang, modified; direct\""));
        assert!(lines[3].contains(",Ma Huang,"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_round_grams() {
        assert_eq!(round_grams(3.3333), 3.3);
        assert_eq!(round_grams(2.25), 2.3);
        assert_eq!(round_grams(0.0), 0.0);
    }
}
