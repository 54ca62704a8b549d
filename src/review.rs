use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{ItemId, MemoryModel, Rating, ReviewItem};
use crate::model::Scheduler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnswerOutcome {
    Answered {
        item_id: ItemId,
        rating: Rating,
        correct: bool,
    },
    Skipped {
        item_id: ItemId,
    },
    /// A repeat answer for an item already scheduled in this session. Counted
    /// separately and never rescheduled.
    Reinforced {
        item_id: ItemId,
        correct: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub skipped: usize,
    /// Repeat answers, kept out of `total` and `accuracy`.
    pub reinforced: usize,
    /// `correct / (correct + wrong)`; 0.0 when nothing was answered.
    pub accuracy: f32,
}

/// Feeds answers through the scheduler as they arrive and keeps the outcomes for
/// the end-of-session summary.
#[derive(Debug, Clone, Default)]
pub struct ReviewRecorder {
    scheduler: Scheduler,
    outcomes: Vec<AnswerOutcome>,
}

impl ReviewRecorder {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            outcomes: vec![],
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns the item's updated model and whether the answer counts as correct.
    pub fn record_answer(
        &mut self,
        item: &ReviewItem,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> (MemoryModel, bool) {
        let memory = self.scheduler.schedule(&item.memory, rating, now);
        let correct = rating.is_correct();
        self.outcomes.push(AnswerOutcome::Answered {
            item_id: item.id,
            rating,
            correct,
        });
        (memory, correct)
    }

    /// A skip leaves the item's memory untouched.
    pub fn record_skip(&mut self, item_id: ItemId) {
        self.outcomes.push(AnswerOutcome::Skipped { item_id });
    }

    pub fn record_reinforcement(&mut self, item_id: ItemId, correct: bool) {
        self.outcomes.push(AnswerOutcome::Reinforced { item_id, correct });
    }

    pub fn outcomes(&self) -> &[AnswerOutcome] {
        &self.outcomes
    }

    pub fn stats(&self) -> SessionStats {
        finalize(&self.outcomes)
    }
}

pub fn finalize(outcomes: &[AnswerOutcome]) -> SessionStats {
    let mut stats = outcomes
        .iter()
        .fold(SessionStats::default(), |mut stats, outcome| {
            match outcome {
                AnswerOutcome::Answered { correct: true, .. } => stats.correct += 1,
                AnswerOutcome::Answered { correct: false, .. } => stats.wrong += 1,
                AnswerOutcome::Skipped { .. } => stats.skipped += 1,
                AnswerOutcome::Reinforced { .. } => {
                    stats.reinforced += 1;
                    return stats;
                }
            }
            stats.total += 1;
            stats
        });
    let answered = stats.correct + stats.wrong;
    if answered > 0 {
        stats.accuracy = stats.correct as f32 / answered as f32;
    }
    stats
}
