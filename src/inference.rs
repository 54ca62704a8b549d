use chrono::{DateTime, Utc};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::memory::{MemoryModel, Rating};
use crate::model::Scheduler;

/// This is a slice for efficiency, but should always be [`PARAMETER_COUNT`] in length.
pub type Parameters = [f32];

pub const PARAMETER_COUNT: usize = 18;

/// - 0..=3: initial stability (days) for Again, Hard, Good, Easy
/// - 4, 5: initial difficulty for Again and its decrement per rating step
/// - 6, 7: difficulty step and mean reversion
/// - 8..=10, 15, 16: growth after a successful review (hard penalty, easy bonus)
/// - 11..=14: stability after a lapse
/// - 17: stability growth for Hard while learning
pub const DEFAULT_PARAMETERS: [f32; PARAMETER_COUNT] = [
    0.5, 1.18, 3.17, 15.69, 0.7, 0.15, 0.08, 0.01, 1.5458, 0.1192, 1.0193, 1.9395, 0.11, 0.2961,
    2.2698, 0.2315, 2.9898, 1.2,
];

/// The model an item would end up with for each possible answer.
#[derive(Debug, Clone, PartialEq)]
pub struct NextStates {
    pub again: MemoryModel,
    pub hard: MemoryModel,
    pub good: MemoryModel,
    pub easy: MemoryModel,
}

impl NextStates {
    pub fn get(&self, rating: Rating) -> &MemoryModel {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }
}

impl Scheduler {
    pub fn next_states(&self, model: &MemoryModel, now: DateTime<Utc>) -> NextStates {
        NextStates {
            again: self.schedule(model, Rating::Again, now),
            hard: self.schedule(model, Rating::Hard, now),
            good: self.schedule(model, Rating::Good, now),
            easy: self.schedule(model, Rating::Easy, now),
        }
    }

    /// Schedules independent answers in parallel. Output order matches input order.
    pub fn schedule_batch(
        &self,
        answers: &[(MemoryModel, Rating)],
        now: DateTime<Utc>,
    ) -> Vec<MemoryModel> {
        answers
            .par_iter()
            .map(|(model, rating)| self.schedule(model, *rating, now))
            .collect()
    }
}

/// [`Scheduler::schedule`] with the default weights and configuration.
pub fn schedule(model: &MemoryModel, rating: Rating, now: DateTime<Utc>) -> MemoryModel {
    Scheduler::default().schedule(model, rating, now)
}

pub fn current_retrievability(stability: f32, days_elapsed: f32) -> f32 {
    crate::model::power_forgetting_curve(days_elapsed.max(0.0), stability.max(0.5))
}
