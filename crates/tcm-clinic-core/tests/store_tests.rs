//! Integration tests for the file-backed clinic store.

use serde_json::json;
use tcm_clinic_core::dosage::MissingReference;
use tcm_clinic_core::{
    calculate_formula_total, process_formula_with_herbs, ClinicConfig, Composition, Formula, Herb,
    Prescription, TcmClinic,
};
use tempfile::TempDir;

fn open(dir: &TempDir) -> TcmClinic {
    let config = ClinicConfig::default()
        .with_db_path(dir.path().join("clinic.db"))
        .unwrap();
    TcmClinic::open(config).unwrap()
}

fn herbs() -> Vec<Herb> {
    let mut gui_zhi = Herb::new(1, "Gui Zhi");
    gui_zhi.chinese_name = Some("桂枝".into());
    gui_zhi.english_name = Some("Cinnamon Twig".into());
    gui_zhi.latin_name = Some("Ramulus Cinnamomi".into());
    gui_zhi.meridians = vec!["Heart".into(), "Lung".into(), "Bladder".into()];

    let mut bai_shao = Herb::new(2, "Bai Shao");
    bai_shao.english_name = Some("White Peony Root".into());

    let mut gan_cao = Herb::new(5, "Gan Cao");
    gan_cao.english_name = Some("Licorice Root".into());

    vec![gui_zhi, bai_shao, gan_cao]
}

fn formulas() -> Vec<Formula> {
    vec![
        Formula::new(
            10,
            "Gui Zhi Tang",
            Composition::encoded(
                r#"[{"herb":"Gui Zhi","grams":9},{"herb":"Bai Shao","dosage":"9g"},{"herbId":5,"grams":6}]"#,
            ),
        ),
        Formula::new(
            11,
            "Shao Yao Gan Cao Tang",
            Composition::Entries(vec![
                json!({"herb": "bai shao", "grams": 12}),
                json!({"herb": "Gan Cao", "grams": 12}),
            ]),
        ),
        Formula::new(
            12,
            "Lost Formula",
            Composition::Entries(vec![json!({"herb": "Huang Qin", "grams": 9})]),
        ),
    ]
}

#[test]
fn test_catalog_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let clinic = open(&dir);
        assert_eq!(clinic.import_herbs(&herbs()).unwrap(), 3);
        assert_eq!(clinic.import_formulas(&formulas()).unwrap(), 3);
    }

    let clinic = open(&dir);
    assert_eq!(clinic.list_herbs().unwrap(), herbs());
    assert_eq!(clinic.list_formulas().unwrap(), formulas());
}

#[test]
fn test_stored_formulas_normalize_like_in_memory() {
    let dir = TempDir::new().unwrap();
    let clinic = open(&dir);
    clinic.import_herbs(&herbs()).unwrap();
    clinic.import_formulas(&formulas()).unwrap();

    for formula in formulas() {
        let stored = clinic.formula_with_herbs(formula.id).unwrap().into_formula();
        let direct = process_formula_with_herbs(&formula, &herbs());
        assert_eq!(stored, direct, "formula {} differs after storage", formula.id);
    }

    let gui_zhi_tang = clinic.formula_with_herbs(10).unwrap();
    assert!(gui_zhi_tang.is_clean());
    assert_eq!(calculate_formula_total(&gui_zhi_tang.formula), 24.0);
    assert_eq!(gui_zhi_tang.formula.herbs()[0].herb.meridians.len(), 3);
}

#[test]
fn test_search_by_any_name_form() {
    let dir = TempDir::new().unwrap();
    let clinic = open(&dir);
    clinic.import_herbs(&herbs()).unwrap();

    let ids = |query: &str| -> Vec<i64> {
        clinic
            .search_herbs(query, 10)
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect()
    };

    assert_eq!(ids("gui"), vec![1]);
    assert_eq!(ids("peony"), vec![2]);
    assert_eq!(ids("Cinnamomi"), vec![1]);
    assert_eq!(ids("licorice root"), vec![5]);
    assert!(ids("huang").is_empty());

    // Catalog edits are reflected in the index
    let mut gan_cao = herbs().remove(2);
    gan_cao.english_name = Some("Liquorice".into());
    clinic.upsert_herb(&gan_cao).unwrap();
    assert!(ids("licorice").is_empty());
    assert_eq!(ids("liquorice"), vec![5]);
}

#[test]
fn test_prescription_end_to_end() {
    let dir = TempDir::new().unwrap();
    let clinic = open(&dir);
    clinic.import_herbs(&herbs()).unwrap();
    clinic.import_formulas(&formulas()).unwrap();

    let mut patient = clinic.create_patient("Zhang Min").unwrap();
    patient.allergies = vec!["Gan Cao".into()];
    clinic.update_patient(&patient).unwrap();

    let mut rx = Prescription::new(&patient.id);
    rx.packets = 7;
    rx.diagnosis = Some("ying-wei disharmony".into());
    rx.add_formula(10, Some(12.0))
        .add_formula(11, Some(6.0))
        .add_formula(12, Some(9.0))
        .add_formula(99, None)
        .add_herb(404, 3.0);
    clinic.insert_prescription(&rx).unwrap();

    let dosage = clinic.prescription_dosage(&rx.id).unwrap();
    assert_eq!(dosage.packets, 7);
    assert!(!dosage.is_complete());
    assert_eq!(
        dosage.missing,
        vec![
            MissingReference::Formula { formula_id: 99 },
            MissingReference::Herb { herb_id: 404 },
        ]
    );

    // Gui Zhi Tang scaled 24 -> 12, Shao Yao Gan Cao Tang 24 -> 6
    let bai_shao = dosage.line_for_herb(2).unwrap();
    assert!((bai_shao.grams_per_packet - 7.5).abs() < 1e-9);
    assert_eq!(bai_shao.sources.len(), 2);
    let gan_cao = dosage.line_for_herb(5).unwrap();
    assert!((gan_cao.grams_per_packet - 6.0).abs() < 1e-9);

    // The unresolved herb from "Lost Formula" is still dispensed
    let huang_qin = dosage.lines.iter().find(|l| l.pinyin_name == "Huang Qin").unwrap();
    assert!(huang_qin.unresolved);
    assert!((huang_qin.grams_per_packet - 9.0).abs() < 1e-9);

    assert!((dosage.per_packet_grams - 27.0).abs() < 1e-9);
    assert!((dosage.total_grams - 189.0).abs() < 1e-9);

    let sheet: serde_json::Value =
        serde_json::from_str(&clinic.export_prescription_json(&rx.id).unwrap()).unwrap();
    assert_eq!(sheet["metadata"]["diagnosis"], "ying-wei disharmony");
    assert_eq!(sheet["allergy_warnings"], json!(["Gan Cao"]));

    let listed = clinic.list_prescriptions_for_patient(&patient.id).unwrap();
    assert_eq!(listed, vec![rx]);
}
