//! SQLite schema definition.

/// Complete database schema for the validation store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- AI Outputs (sampled for expert review)
-- ============================================================================

CREATE TABLE IF NOT EXISTS ai_outputs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL DEFAULT (datetime('now')),
    input_text TEXT NOT NULL,
    input_type TEXT,
    condition TEXT,
    specialty TEXT NOT NULL DEFAULT 'neurology',
    ai_classification TEXT,
    ai_confidence TEXT,
    ai_evidence TEXT,
    ai_medication_analysis TEXT,
    ai_full_response TEXT,
    model_version TEXT,
    prompt_version TEXT,
    processing_time_ms INTEGER,
    validation_status TEXT NOT NULL DEFAULT 'pending',
    validation_priority INTEGER NOT NULL DEFAULT 1,
    selected_for_validation INTEGER NOT NULL DEFAULT 0,
    selection_date TEXT,
    session_id TEXT,
    user_context TEXT
);

CREATE INDEX IF NOT EXISTS idx_outputs_status ON ai_outputs(validation_status);
CREATE INDEX IF NOT EXISTS idx_outputs_selected ON ai_outputs(selected_for_validation);
CREATE INDEX IF NOT EXISTS idx_outputs_condition ON ai_outputs(condition);

-- ============================================================================
-- Reviewers (expert neurologists)
-- ============================================================================

CREATE TABLE IF NOT EXISTS reviewers (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    specialty TEXT,
    subspecialties TEXT NOT NULL DEFAULT '[]',    -- JSON array of strings
    certification_level TEXT,
    institution TEXT,
    total_validations INTEGER NOT NULL DEFAULT 0,
    agreement_rate REAL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_login TEXT
);

-- ============================================================================
-- Validations
-- ============================================================================

CREATE TABLE IF NOT EXISTS validations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    output_id INTEGER NOT NULL REFERENCES ai_outputs(id),
    reviewer_id TEXT NOT NULL,
    reviewer_name TEXT,
    reviewer_specialty TEXT,
    certification_level TEXT,
    validation_timestamp TEXT NOT NULL DEFAULT (datetime('now')),
    is_correct INTEGER NOT NULL,
    confidence_level TEXT NOT NULL DEFAULT 'medium',
    classification_correct INTEGER,
    confidence_appropriate INTEGER,
    evidence_accurate INTEGER,
    medication_appropriate INTEGER,
    comments TEXT,
    preferred_classification TEXT,
    preferred_confidence TEXT,
    preferred_evidence TEXT,
    preferred_medication TEXT,
    clinical_pearls TEXT,
    common_pitfalls TEXT,
    review_time_seconds INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_validations_output ON validations(output_id);
CREATE INDEX IF NOT EXISTS idx_validations_reviewer ON validations(reviewer_id);

-- Seed reviewer used when a submission names nobody
INSERT OR IGNORE INTO reviewers (
    id, email, name, specialty, certification_level
) VALUES (
    'demo_neuro', 'demo@vecta.ai', 'Dr. Demo Neurologist', 'general_neurology', 'attending'
);
"#;
