//! Clinic runtime configuration.
//!
//! Resolved once at process startup and passed into [`crate::TcmClinic`].
//! Nothing below the entry point reads environment variables.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::composition::DEFAULT_SUGGESTION_THRESHOLD;
use crate::dosage::DEFAULT_STANDARD_FORMULA_GRAMS;

pub const ENV_DB_PATH: &str = "TCM_DB_PATH";
pub const ENV_SUGGESTION_THRESHOLD: &str = "TCM_SUGGESTION_THRESHOLD";
pub const ENV_STANDARD_FORMULA_GRAMS: &str = "TCM_STANDARD_FORMULA_GRAMS";

pub const DEFAULT_DB_PATH: &str = "tcm-clinic.db";

/// Configuration errors.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} is not a number: {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error("database path cannot be empty")]
    EmptyDbPath,
}

/// Clinic configuration resolved at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct ClinicConfig {
    db_path: PathBuf,
    suggestion_threshold: f64,
    standard_formula_grams: f64,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            suggestion_threshold: DEFAULT_SUGGESTION_THRESHOLD,
            standard_formula_grams: DEFAULT_STANDARD_FORMULA_GRAMS,
        }
    }
}

impl ClinicConfig {
    /// Create a validated `ClinicConfig`.
    pub fn new(
        db_path: PathBuf,
        suggestion_threshold: f64,
        standard_formula_grams: f64,
    ) -> Result<Self, ConfigError> {
        if db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }
        if !(0.0..=1.0).contains(&suggestion_threshold) {
            return Err(ConfigError::OutOfRange {
                name: ENV_SUGGESTION_THRESHOLD,
                expected: "between 0 and 1",
                value: suggestion_threshold,
            });
        }
        if !(standard_formula_grams.is_finite() && standard_formula_grams > 0.0) {
            return Err(ConfigError::OutOfRange {
                name: ENV_STANDARD_FORMULA_GRAMS,
                expected: "a positive weight",
                value: standard_formula_grams,
            });
        }

        Ok(Self {
            db_path,
            suggestion_threshold,
            standard_formula_grams,
        })
    }

    /// Resolve from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = get(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let suggestion_threshold = match get(ENV_SUGGESTION_THRESHOLD) {
            Some(v) => parse_number(ENV_SUGGESTION_THRESHOLD, &v)?,
            None => DEFAULT_SUGGESTION_THRESHOLD,
        };
        let standard_formula_grams = match get(ENV_STANDARD_FORMULA_GRAMS) {
            Some(v) => parse_number(ENV_STANDARD_FORMULA_GRAMS, &v)?,
            None => DEFAULT_STANDARD_FORMULA_GRAMS,
        };

        Self::new(db_path, suggestion_threshold, standard_formula_grams)
    }

    /// Replace the database path, e.g. from a command-line flag.
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let db_path = db_path.into();
        if db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }
        self.db_path = db_path;
        Ok(self)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn suggestion_threshold(&self) -> f64 {
        self.suggestion_threshold
    }

    pub fn standard_formula_grams(&self) -> f64 {
        self.standard_formula_grams
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::NotANumber {
            name,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClinicConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClinicConfig::default());
        assert_eq!(config.db_path(), Path::new("tcm-clinic.db"));
        assert_eq!(config.suggestion_threshold(), 0.85);
        assert_eq!(config.standard_formula_grams(), 100.0);
    }

    #[test]
    fn test_overrides() {
        let config = ClinicConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/clinic.db"),
            (ENV_SUGGESTION_THRESHOLD, "0.9"),
            (ENV_STANDARD_FORMULA_GRAMS, " 60 "),
        ]))
        .unwrap();
        assert_eq!(config.db_path(), Path::new("/var/lib/clinic.db"));
        assert_eq!(config.suggestion_threshold(), 0.9);
        assert_eq!(config.standard_formula_grams(), 60.0);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = ClinicConfig::from_lookup(lookup(&[(ENV_DB_PATH, "  ")])).unwrap();
        assert_eq!(config.db_path(), Path::new(DEFAULT_DB_PATH));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = ClinicConfig::from_lookup(lookup(&[(ENV_SUGGESTION_THRESHOLD, "1.5")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: ENV_SUGGESTION_THRESHOLD, .. }));

        let err = ClinicConfig::from_lookup(lookup(&[(ENV_STANDARD_FORMULA_GRAMS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: ENV_STANDARD_FORMULA_GRAMS, .. }));

        assert!(ClinicConfig::new(PathBuf::from("x.db"), f64::NAN, 100.0).is_err());
    }

    #[test]
    fn test_rejects_non_numbers() {
        let err = ClinicConfig::from_lookup(lookup(&[(ENV_SUGGESTION_THRESHOLD, "high")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotANumber {
                name: ENV_SUGGESTION_THRESHOLD,
                value: "high".into()
            }
        );
    }

    #[test]
    fn test_with_db_path() {
        let config = ClinicConfig::default().with_db_path("other.db").unwrap();
        assert_eq!(config.db_path(), Path::new("other.db"));
        assert_eq!(ClinicConfig::default().with_db_path(""), Err(ConfigError::EmptyDbPath));
    }
}
