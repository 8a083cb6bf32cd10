//! SQLite schema definition.

/// Complete database schema for the clinic store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Herb Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS herbs (
    id INTEGER PRIMARY KEY,
    pinyin_name TEXT NOT NULL,
    chinese_name TEXT,
    latin_name TEXT,
    english_name TEXT,
    category TEXT,
    nature TEXT,
    flavor TEXT NOT NULL DEFAULT '[]',            -- JSON array of strings
    toxicity TEXT,
    meridians TEXT NOT NULL DEFAULT '[]',         -- JSON array of strings
    dosage TEXT,
    indications TEXT NOT NULL DEFAULT '[]',       -- JSON array of strings
    contraindications TEXT NOT NULL DEFAULT '[]', -- JSON array of strings
    cautions TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    pharmacology TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    research TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_herbs_pinyin ON herbs(pinyin_name);
CREATE INDEX IF NOT EXISTS idx_herbs_pinyin_nocase ON herbs(pinyin_name COLLATE NOCASE);

-- FTS5 virtual table for full-text search over every name form
CREATE VIRTUAL TABLE IF NOT EXISTS herbs_fts USING fts5(
    pinyin_name,
    chinese_name,
    english_name,
    latin_name,
    content='herbs',
    content_rowid='id'
);

-- Triggers to keep FTS5 in sync with main table
CREATE TRIGGER IF NOT EXISTS herbs_ai AFTER INSERT ON herbs BEGIN
    INSERT INTO herbs_fts(rowid, pinyin_name, chinese_name, english_name, latin_name)
    VALUES (new.id, new.pinyin_name, new.chinese_name, new.english_name, new.latin_name);
END;

CREATE TRIGGER IF NOT EXISTS herbs_ad AFTER DELETE ON herbs BEGIN
    INSERT INTO herbs_fts(herbs_fts, rowid, pinyin_name, chinese_name, english_name, latin_name)
    VALUES ('delete', old.id, old.pinyin_name, old.chinese_name, old.english_name, old.latin_name);
END;

CREATE TRIGGER IF NOT EXISTS herbs_au AFTER UPDATE ON herbs BEGIN
    INSERT INTO herbs_fts(herbs_fts, rowid, pinyin_name, chinese_name, english_name, latin_name)
    VALUES ('delete', old.id, old.pinyin_name, old.chinese_name, old.english_name, old.latin_name);
    INSERT INTO herbs_fts(rowid, pinyin_name, chinese_name, english_name, latin_name)
    VALUES (new.id, new.pinyin_name, new.chinese_name, new.english_name, new.latin_name);
END;

-- ============================================================================
-- Formulas
-- ============================================================================

CREATE TABLE IF NOT EXISTS formulas (
    id INTEGER PRIMARY KEY,
    pinyin_name TEXT NOT NULL,
    chinese_name TEXT,
    english_name TEXT,
    category TEXT,
    actions TEXT,
    indications TEXT,
    contraindications TEXT,
    preparation TEXT,
    source TEXT,
    composition TEXT NOT NULL DEFAULT 'null',     -- JSON value exactly as received
    herbs TEXT NOT NULL DEFAULT '[]',             -- JSON array of precomputed FormulaHerb
    total_grams REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_formulas_pinyin ON formulas(pinyin_name);
CREATE INDEX IF NOT EXISTS idx_formulas_pinyin_nocase ON formulas(pinyin_name COLLATE NOCASE);

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    gender TEXT,
    date_of_birth TEXT,
    phone TEXT,
    constitution TEXT,
    allergies TEXT NOT NULL DEFAULT '[]',         -- JSON array of strings
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- ============================================================================
-- Prescriptions
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    items TEXT NOT NULL DEFAULT '[]',             -- JSON array of PrescriptionItem
    packets INTEGER NOT NULL DEFAULT 1 CHECK (packets >= 1),
    diagnosis TEXT,
    instructions TEXT,
    notes TEXT,
    prescribed_by TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id);
"#;
