//! Command implementations.
//!
//! Each command writes its result to `out` and returns whether the run was
//! successful, so `main` can map it to an exit code.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tcm_clinic_core::{Formula, Herb, TcmClinic};
use tracing::{info, warn};

use crate::cli::OutputFormatArg;

/// Load herbs from a JSON array file and upsert them.
pub fn import_herbs(clinic: &TcmClinic, file: &Path, out: &mut impl Write) -> Result<bool> {
    let herbs: Vec<Herb> = read_json_array(file)?;
    let count = clinic
        .import_herbs(&herbs)
        .with_context(|| format!("failed to import herbs from {}", file.display()))?;
    writeln!(out, "Imported {} herbs", count)?;
    Ok(true)
}

/// Load formulas from a JSON array file and upsert them.
///
/// Compositions are stored untouched; run `audit` to see what will not resolve.
pub fn import_formulas(clinic: &TcmClinic, file: &Path, out: &mut impl Write) -> Result<bool> {
    let formulas: Vec<Formula> = read_json_array(file)?;
    let count = clinic
        .import_formulas(&formulas)
        .with_context(|| format!("failed to import formulas from {}", file.display()))?;
    writeln!(out, "Imported {} formulas", count)?;
    Ok(true)
}

/// Print a formula's resolved view as JSON. Diagnostics go to the log.
pub fn show_formula(clinic: &TcmClinic, key: &str, out: &mut impl Write) -> Result<bool> {
    let Some(formula) = clinic.find_formula(key)? else {
        bail!("no formula matches {:?}", key);
    };

    let processed = clinic.formula_with_herbs(formula.id)?;
    for diagnostic in &processed.diagnostics {
        warn!(formula_id = formula.id, "{}", diagnostic);
    }

    writeln!(out, "{}", serde_json::to_string_pretty(&processed.formula)?)?;
    Ok(true)
}

/// Print matching herbs, one per line.
pub fn search(clinic: &TcmClinic, query: &str, limit: usize, out: &mut impl Write) -> Result<bool> {
    let herbs = clinic.search_herbs(query, limit)?;
    for herb in &herbs {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            herb.id,
            herb.pinyin_name,
            herb.chinese_name.as_deref().unwrap_or(""),
            herb.english_name.as_deref().unwrap_or("")
        )?;
    }
    info!(query, results = herbs.len(), "herb search");
    Ok(true)
}

/// Print the audit report as JSON. Unsuccessful when any issue was found.
pub fn audit(clinic: &TcmClinic, out: &mut impl Write) -> Result<bool> {
    let report = clinic.audit()?;
    writeln!(out, "{}", report.to_json()?)?;

    for entry in report.issues() {
        for diagnostic in &entry.diagnostics {
            warn!(formula_id = entry.formula_id, formula = %entry.pinyin_name, "{}", diagnostic);
        }
    }
    Ok(report.is_clean())
}

/// Print a prescription sheet.
pub fn prescription(
    clinic: &TcmClinic,
    id: &str,
    format: OutputFormatArg,
    out: &mut impl Write,
) -> Result<bool> {
    let rendered = match format {
        OutputFormatArg::Json => clinic.export_prescription_json(id)?,
        OutputFormatArg::Csv => clinic.export_prescription_csv(id)?,
    };
    write!(out, "{}", rendered)?;
    if format == OutputFormatArg::Json {
        writeln!(out)?;
    }
    Ok(true)
}

fn read_json_array<T: serde::de::DeserializeOwned>(file: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a valid JSON array", file.display()))
}
