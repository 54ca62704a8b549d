use std::cmp::Reverse;

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use log::debug;
use priority_queue::PriorityQueue;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{Result, SrsError};
use crate::memory::{MemoryModel, ReviewItem};

/// Review urgency of an item at a given moment. Later variants are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Tier {
    NotYetDue,
    Due,
    Overdue,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// How long past its due date an item must be to count as overdue.
    pub overdue_after_hours: i64,
    /// Pools up to this size are reviewed in full.
    pub review_everything_up_to: usize,
    /// `(largest pool size, session cap)` steps above `review_everything_up_to`, ascending.
    pub session_caps: Vec<(usize, usize)>,
    /// Cap for pools larger than every step in `session_caps`.
    pub large_pool_cap: usize,
    /// Not-yet-due items below this accuracy may pad a short session.
    pub low_accuracy_threshold: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            overdue_after_hours: 24,
            review_everything_up_to: 20,
            session_caps: vec![(50, 25), (100, 30)],
            large_pool_cap: 40,
            low_accuracy_threshold: 0.7,
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(SrsError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.overdue_after_hours <= 0 {
            return invalid("overdue threshold must be positive");
        }
        if self.large_pool_cap == 0 || self.session_caps.iter().any(|&(_, cap)| cap == 0) {
            return invalid("session caps must be positive");
        }
        let bounds = std::iter::once(self.review_everything_up_to)
            .chain(self.session_caps.iter().map(|&(bound, _)| bound));
        if !bounds.tuple_windows().all(|(a, b)| a < b) {
            return invalid("session cap steps must be strictly ascending");
        }
        if !(0.0..=1.0).contains(&self.low_accuracy_threshold) {
            return invalid("accuracy threshold must lie between 0 and 1");
        }
        Ok(())
    }

    /// Maximum session length for a pool of `pool_size` items.
    pub fn session_limit(&self, pool_size: usize) -> usize {
        if pool_size <= self.review_everything_up_to {
            return pool_size;
        }
        self.session_caps
            .iter()
            .find(|&&(bound, _)| pool_size <= bound)
            .map_or(self.large_pool_cap, |&(_, cap)| cap)
    }

    fn overdue_after(&self) -> Duration {
        Duration::hours(self.overdue_after_hours)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Priority {
    tier: Tier,
    urgency: i64,
    order: Reverse<usize>,
}

/// Builds the bounded, prioritized review list for one session.
#[derive(Debug, Clone, Default)]
pub struct CandidateSelector {
    config: SelectorConfig,
}

impl CandidateSelector {
    pub fn new(config: SelectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn classify(&self, model: &MemoryModel, now: DateTime<Utc>) -> Tier {
        if model.is_new() {
            return Tier::New;
        }
        match model.next_review_at {
            // Reviewed but never given a due date: treat as due right away.
            None => Tier::Due,
            Some(next) if next > now => Tier::NotYetDue,
            Some(next) if now - next > self.config.overdue_after() => Tier::Overdue,
            Some(_) => Tier::Due,
        }
    }

    /// Selects at most `min(limit, session_limit(pool size))` distinct items.
    ///
    /// New items come first, then overdue items (longest overdue first), then due
    /// items. Not-yet-due items only pad a short session, lowest accuracy first.
    /// `rng` shuffles the order inside the New and Due groups; which items are
    /// chosen never depends on it.
    pub fn select<R: Rng + ?Sized>(
        &self,
        pool: &[ReviewItem],
        now: DateTime<Utc>,
        limit: usize,
        rng: &mut R,
    ) -> Vec<ReviewItem> {
        let candidates = pool.iter().unique_by(|item| item.id).collect_vec();
        let cap = self.config.session_limit(candidates.len()).min(limit);
        if cap == 0 {
            return vec![];
        }

        let mut queue = PriorityQueue::with_capacity(candidates.len());
        for (index, item) in candidates.iter().enumerate() {
            let tier = self.classify(&item.memory, now);
            let urgency = match tier {
                Tier::Overdue => item
                    .memory
                    .next_review_at
                    .map_or(0, |next| (now - next).num_seconds()),
                Tier::NotYetDue => {
                    let accuracy = item.memory.accuracy();
                    if accuracy >= self.config.low_accuracy_threshold {
                        continue;
                    }
                    -((accuracy * 1000.0).round() as i64)
                }
                Tier::New | Tier::Due => 0,
            };
            queue.push(
                index,
                Priority {
                    tier,
                    urgency,
                    order: Reverse(index),
                },
            );
        }

        let mut selected = Vec::with_capacity(cap);
        while selected.len() < cap {
            let Some((index, priority)) = queue.pop() else {
                break;
            };
            selected.push((priority.tier, candidates[index]));
        }
        debug!(
            "selected {} of {} candidates (cap {}): {:?}",
            selected.len(),
            candidates.len(),
            cap,
            selected.iter().map(|(tier, _)| *tier).counts()
        );

        let mut ordered = Vec::with_capacity(selected.len());
        for (tier, group) in &selected.into_iter().chunk_by(|(tier, _)| *tier) {
            let mut group = group.map(|(_, item)| item.clone()).collect_vec();
            if matches!(tier, Tier::New | Tier::Due) {
                group.shuffle(rng);
            }
            ordered.extend(group);
        }
        ordered
    }
}

/// [`CandidateSelector::select`] with the default configuration.
pub fn select<R: Rng + ?Sized>(
    pool: &[ReviewItem],
    now: DateTime<Utc>,
    limit: usize,
    rng: &mut R,
) -> Vec<ReviewItem> {
    CandidateSelector::default().select(pool, now, limit, rng)
}
