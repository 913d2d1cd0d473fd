//! Background learning trigger.
//!
//! Polls the count of correct validations and runs a learning cycle when
//! enough new ones have arrived. A cycle also reloads the few-shot library
//! and rebuilds the guideline index.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use vecta_core::{CoreResult, LearningReport, VectaCore};

use crate::config::{LearningMode, LearningSchedule};

/// Decides when the correct-validation count warrants a learning cycle.
pub struct LearningScheduler {
    core: Arc<VectaCore>,
    schedule: LearningSchedule,
    last_count: i64,
}

impl LearningScheduler {
    pub fn new(core: Arc<VectaCore>, schedule: LearningSchedule) -> Self {
        Self {
            core,
            schedule,
            last_count: 0,
        }
    }

    pub fn last_count(&self) -> i64 {
        self.last_count
    }

    fn should_learn(&self, count: i64) -> bool {
        match self.schedule.mode {
            LearningMode::Interval => count > self.last_count,
            LearningMode::Threshold => count >= self.last_count + self.schedule.threshold.max(1),
        }
    }

    /// Check once. Returns the report when a cycle ran.
    pub fn check_and_learn(&mut self) -> CoreResult<Option<LearningReport>> {
        let count = self.core.count_correct_validations()?;
        if !self.should_learn(count) {
            debug!(count, last = self.last_count, "No new validations, skipping learning cycle");
            return Ok(None);
        }

        info!(
            new_validations = count - self.last_count,
            "Triggering automatic learning cycle"
        );
        let report = self.core.run_learning_cycle()?;
        if report.examples_added > 0 {
            info!(
                examples_added = report.examples_added,
                agreement_rate = report.current_agreement_rate,
                "Auto-learning added examples"
            );
        }
        self.last_count = count;
        Ok(Some(report))
    }

    /// Run checks forever on the configured period, starting immediately.
    pub fn spawn(self) -> JoinHandle<()> {
        let period = self.schedule.period();
        info!(mode = ?self.schedule.mode, period_secs = period.as_secs(), "Auto-learning scheduler started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut scheduler = self;

            loop {
                ticker.tick().await;
                let result = tokio::task::spawn_blocking(move || {
                    let outcome = scheduler.check_and_learn();
                    (scheduler, outcome)
                })
                .await;

                match result {
                    Ok((returned, outcome)) => {
                        scheduler = returned;
                        if let Err(e) = outcome {
                            error!(error = %e, "Auto-learning check failed");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Auto-learning task panicked, stopping scheduler");
                        return;
                    }
                }
            }
        })
    }
}
