//! Vecta Core Library
//!
//! Expert review store, few-shot learning and guideline retrieval for a
//! clinical LLM analysis service.
//!
//! # Architecture
//!
//! ```text
//!  Analysis result ──(sampled)──▶ ai_outputs
//!                                     │
//!                           Expert Review Queue
//!                                     │
//!                          Neurologist validates
//!                                     │
//!                                validations
//!                                     │
//!                     ┌───────────────▼───────────────┐
//!                     │        Learning Cycle         │
//!                     │  learnable case → few-shot    │
//!                     │  expert answer wins           │
//!                     └───────────────┬───────────────┘
//!                                     │
//!                  ┌──────────────────┼──────────────────┐
//!                  ▼                  ▼                  ▼
//!             Few-shot           Static             RAG index
//!             examples          guidelines     (embedding cosine)
//!                  └──────────────────┼──────────────────┘
//!                                     ▼
//!                            Enhanced prompt context
//! ```
//!
//! # Core Principle
//!
//! **Only expert-approved cases become examples.** The AI's own answer is
//! kept only where the reviewer did not supply a correction.
//!
//! # Modules
//!
//! - [`db`]: SQLite validation store
//! - [`models`]: Domain types (AnalysisType, AiOutput, Validation, etc.)
//! - [`library`]: Few-shot examples and static guidelines
//! - [`rag`]: Guideline retrieval index
//! - [`learning`]: Learning cycle and history
//! - [`sanitize`]: PHI scrubbing and content checks

pub mod db;
pub mod learning;
pub mod library;
pub mod models;
pub mod rag;
pub mod sanitize;

// Re-export commonly used types
pub use db::{Database, ImprovementMetrics, ValidationStats};
pub use learning::{LearningConfig, LearningEngine, LearningReport};
pub use library::{ContextSources, FewShotLibrary, GuidelineCorpus, LibraryStatistics};
pub use models::{
    AiOutput, AnalysisType, Condition, Reviewer, Specialty, StructuredBullets, Validation,
};
pub use rag::{Embedder, GuidelineIndex, RagStats};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{info, warn};

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Library error: {0}")]
    Library(#[from] library::LibraryError),

    #[error("Learning error: {0}")]
    Learning(#[from] learning::LearningError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for CoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        CoreError::LockPoisoned(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// =========================================================================
// Shared Handle
// =========================================================================

/// Prompt-context sources that are reloaded after learning.
struct Knowledge {
    library: FewShotLibrary,
    guidelines: GuidelineCorpus,
    index: GuidelineIndex,
}

/// Thread-safe handle over the store and prompt-context sources.
pub struct VectaCore {
    db: Arc<Mutex<Database>>,
    knowledge: RwLock<Knowledge>,
    learning: Mutex<LearningEngine>,
    model: Option<Arc<dyn Embedder>>,
    data_dir: PathBuf,
}

impl VectaCore {
    /// Open the store at `db_path` and load context files from `data_dir`.
    ///
    /// Expects `few_shot_examples.json` and
    /// `guidelines/neurology_guidelines.json` under `data_dir`; missing
    /// files give empty sources.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(data_dir: P, db_path: Q) -> CoreResult<Self> {
        let db = Database::open(db_path.as_ref())?;
        Self::with_database(data_dir, db)
    }

    /// Use an already-open database.
    ///
    /// Guidelines are embedded with the sentence model when the
    /// `embeddings` feature is enabled and the model loads.
    pub fn with_database<P: AsRef<Path>>(data_dir: P, db: Database) -> CoreResult<Self> {
        let model = rag::default_model(data_dir.as_ref());
        Self::with_embedder(data_dir, db, model)
    }

    /// Use an already-open database and an explicit guideline embedder.
    ///
    /// `None` indexes guidelines with keyword vectors.
    pub fn with_embedder<P: AsRef<Path>>(
        data_dir: P,
        db: Database,
        model: Option<Arc<dyn Embedder>>,
    ) -> CoreResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let learning = LearningEngine::new(LearningConfig::in_data_dir(&data_dir))?;
        let knowledge = load_knowledge(&data_dir, model.clone())?;
        info!(
            data_dir = %data_dir.display(),
            examples = knowledge.library.len(),
            guideline_chunks = knowledge.index.len(),
            "Core initialised"
        );

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            knowledge: RwLock::new(knowledge),
            learning: Mutex::new(learning),
            model,
            data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ---------------------------------------------------------------------
    // Review queue
    // ---------------------------------------------------------------------

    /// Store an output for expert review and return its ID.
    pub fn record_output(&self, output: &AiOutput) -> CoreResult<i64> {
        let db = self.db.lock()?;
        Ok(db.insert_output(output)?)
    }

    pub fn get_output(&self, id: i64) -> CoreResult<Option<AiOutput>> {
        let db = self.db.lock()?;
        Ok(db.get_output(id)?)
    }

    pub fn next_validation_case(&self) -> CoreResult<Option<AiOutput>> {
        let db = self.db.lock()?;
        Ok(db.next_validation_case()?)
    }

    /// Record an expert validation and return its ID.
    pub fn submit_validation(&self, validation: &Validation) -> CoreResult<i64> {
        let mut db = self.db.lock()?;
        let id = db.insert_validation(validation)?;
        info!(
            output_id = validation.output_id,
            reviewer = %validation.reviewer_id,
            learnable = validation.is_learnable(),
            corrected = validation.has_corrections(),
            "Validation recorded"
        );
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Reviewers
    // ---------------------------------------------------------------------

    /// Register a reviewer, or update the profile stored under its ID.
    pub fn register_reviewer(&self, reviewer: &Reviewer) -> CoreResult<()> {
        let db = self.db.lock()?;
        Ok(db.upsert_reviewer(reviewer)?)
    }

    pub fn get_reviewer(&self, id: &str) -> CoreResult<Option<Reviewer>> {
        let db = self.db.lock()?;
        Ok(db.get_reviewer(id)?)
    }

    pub fn list_reviewers(&self) -> CoreResult<Vec<Reviewer>> {
        let db = self.db.lock()?;
        Ok(db.list_reviewers()?)
    }

    pub fn validation_stats(&self) -> CoreResult<ValidationStats> {
        let db = self.db.lock()?;
        Ok(db.validation_stats()?)
    }

    pub fn improvement_metrics(&self) -> CoreResult<ImprovementMetrics> {
        let db = self.db.lock()?;
        Ok(db.improvement_metrics()?)
    }

    pub fn count_correct_validations(&self) -> CoreResult<i64> {
        let db = self.db.lock()?;
        Ok(db.count_correct_validations()?)
    }

    // ---------------------------------------------------------------------
    // Learning
    // ---------------------------------------------------------------------

    /// Run a learning cycle, then reload the library and re-index guidelines.
    pub fn run_learning_cycle(&self) -> CoreResult<LearningReport> {
        let mut engine = self.learning.lock()?;
        let db = self.db.lock()?;
        let report = engine.run_cycle(&db)?;
        drop(db);
        drop(engine);

        self.reload()?;
        Ok(report)
    }

    /// Reload context files from disk.
    pub fn reload(&self) -> CoreResult<()> {
        let fresh = load_knowledge(&self.data_dir, self.model.clone())?;
        *self.knowledge.write()? = fresh;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Prompt context
    // ---------------------------------------------------------------------

    /// Few-shot, static guideline and retrieved context for a prompt.
    pub fn enhanced_context(
        &self,
        condition: Option<Condition>,
        analysis_type: AnalysisType,
        num_examples: usize,
        query: Option<&str>,
    ) -> CoreResult<String> {
        let knowledge = self.knowledge.read()?;
        let sources = ContextSources {
            library: &knowledge.library,
            guidelines: &knowledge.guidelines,
            rag: Some(&knowledge.index),
        };
        Ok(sources.enhanced_context(condition, analysis_type, num_examples, query))
    }

    pub fn library_statistics(&self) -> CoreResult<LibraryStatistics> {
        Ok(self.knowledge.read()?.library.statistics())
    }

    pub fn rag_stats(&self) -> CoreResult<RagStats> {
        Ok(self.knowledge.read()?.index.stats())
    }

    /// Rebuild the retrieval index from the guideline file.
    pub fn reindex_rag(&self) -> CoreResult<usize> {
        let mut knowledge = self.knowledge.write()?;
        Ok(knowledge.index.reindex()?)
    }
}

fn load_knowledge(data_dir: &Path, model: Option<Arc<dyn Embedder>>) -> CoreResult<Knowledge> {
    let library = FewShotLibrary::load(data_dir.join("few_shot_examples.json"))?;
    let guidelines =
        GuidelineCorpus::load(data_dir.join("guidelines").join("neurology_guidelines.json"))?;
    let index = GuidelineIndex::build_with(&guidelines, model).unwrap_or_else(|e| {
        warn!(error = %e, "Guideline embedding failed, using keyword index");
        GuidelineIndex::build(&guidelines)
    });
    Ok(Knowledge {
        library,
        guidelines,
        index,
    })
}
