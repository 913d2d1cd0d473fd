//! Persistent record of learning cycles.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::LearningResult;
use crate::db::ImprovementMetrics;

/// One completed learning cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningEvent {
    pub timestamp: String,
    pub cases_reviewed: usize,
    pub examples_added: usize,
    pub agreement_rate: f64,
    pub learnable_cases: i64,
    pub metrics: ImprovementMetrics,
}

/// Agreement rate sampled at the end of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatePoint {
    pub timestamp: String,
    pub rate: f64,
}

/// Contents of `learning_history.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LearningHistory {
    #[serde(default)]
    pub learning_events: Vec<LearningEvent>,
    #[serde(default)]
    pub total_examples_added: usize,
    #[serde(default)]
    pub last_learning_cycle: Option<String>,
    #[serde(default)]
    pub agreement_rate_history: Vec<RatePoint>,
}

impl LearningHistory {
    /// Load history, starting fresh when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> LearningResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> LearningResult<()> {
        crate::library::write_atomic(path.as_ref(), &serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Append a cycle and update the running totals.
    pub fn record(&mut self, event: LearningEvent) {
        self.total_examples_added += event.examples_added;
        self.last_learning_cycle = Some(event.timestamp.clone());
        self.agreement_rate_history.push(RatePoint {
            timestamp: event.timestamp.clone(),
            rate: event.agreement_rate,
        });
        self.learning_events.push(event);
    }
}
