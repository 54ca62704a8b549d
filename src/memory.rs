use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::{Result, SrsError};

pub type ItemId = i64;

pub(crate) const S_MIN: f32 = 0.5;
pub(crate) const S_MAX: f32 = 36500.0;
pub(crate) const D_MIN: f32 = 0.0;
pub(crate) const D_MAX: f32 = 1.0;

/// Where an item sits in its learning lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum LearningState {
    New,
    Learning,
    Review,
    Relearning,
}

/// The user's self-assessed answer quality, 1-4.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
#[repr(u8)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Anything but `Again` counts as a correct answer in session statistics.
    pub fn is_correct(self) -> bool {
        self != Rating::Again
    }

    pub fn from_correct(correct: bool) -> Self {
        if correct { Rating::Good } else { Rating::Again }
    }
}

impl TryFrom<u8> for Rating {
    type Error = SrsError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            _ => Err(SrsError::InvalidRating { value }),
        }
    }
}

/// Learning state of a single item. Only [`crate::Scheduler::schedule`] produces new
/// values of this type; everything else reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryModel {
    pub state: LearningState,
    /// Days until recall probability decays to the target retention.
    pub stability: f32,
    /// 0.0 (easy) to 1.0 (hard).
    pub difficulty: f32,
    pub last_review_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub repetition_count: u32,
    pub lapse_count: u32,
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryModel {
    /// A model for an item that has just entered the pool.
    pub fn new() -> Self {
        Self {
            state: LearningState::New,
            stability: S_MIN,
            difficulty: 0.5,
            last_review_at: None,
            next_review_at: None,
            repetition_count: 0,
            lapse_count: 0,
        }
    }

    pub fn is_new(&self) -> bool {
        self.state == LearningState::New && self.last_review_at.is_none()
    }

    /// Share of completed reviews that were not lapses; 1.0 before the first review.
    pub fn accuracy(&self) -> f32 {
        if self.repetition_count == 0 {
            return 1.0;
        }
        let lapses = self.lapse_count.min(self.repetition_count);
        1.0 - lapses as f32 / self.repetition_count as f32
    }

    /// Clamps numeric state read back from storage into its valid domain.
    /// Records written by older clients may carry out-of-range or non-finite values.
    pub fn sanitized(&self) -> Self {
        let stability = if self.stability.is_finite() {
            self.stability.clamp(S_MIN, S_MAX)
        } else {
            S_MIN
        };
        let difficulty = if self.difficulty.is_finite() {
            self.difficulty.clamp(D_MIN, D_MAX)
        } else {
            0.5
        };
        if stability != self.stability || difficulty != self.difficulty {
            log::warn!(
                "clamped corrupted memory state: stability {} -> {}, difficulty {} -> {}",
                self.stability,
                stability,
                self.difficulty,
                difficulty
            );
        }
        Self {
            stability,
            difficulty,
            ..self.clone()
        }
    }
}

/// Display data owned by the content collaborator. Never inspected for scheduling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemContent {
    pub word: String,
    pub sense: String,
    pub example: Option<String>,
    pub phonetic: Option<String>,
    /// Opaque reference the surrounding app resolves to playable audio.
    pub audio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: ItemId,
    pub content: ItemContent,
    pub memory: MemoryModel,
}

impl ReviewItem {
    pub fn new(id: ItemId, content: ItemContent) -> Self {
        Self {
            id,
            content,
            memory: MemoryModel::new(),
        }
    }

    pub fn has_example(&self) -> bool {
        self.content
            .example
            .as_deref()
            .is_some_and(|example| !example.trim().is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.content
            .audio
            .as_deref()
            .is_some_and(|audio| !audio.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn rating_round_trips_through_ordinal() -> Result<()> {
        for rating in Rating::iter() {
            assert_eq!(Rating::try_from(rating.ordinal())?, rating);
        }
        assert!(Rating::try_from(0).is_err());
        assert!(Rating::try_from(5).is_err());
        Ok(())
    }

    #[test]
    fn only_again_is_incorrect() {
        let correct = Rating::iter().map(Rating::is_correct).collect::<Vec<_>>();
        assert_eq!(correct, [false, true, true, true]);
        assert_eq!(Rating::from_correct(true), Rating::Good);
        assert_eq!(Rating::from_correct(false), Rating::Again);
    }

    #[test]
    fn sanitized_clamps_corrupted_values() {
        let model = MemoryModel {
            stability: -3.0,
            difficulty: 1.7,
            ..MemoryModel::new()
        }
        .sanitized();
        assert_eq!(model.stability, S_MIN);
        assert_eq!(model.difficulty, D_MAX);

        let model = MemoryModel {
            stability: f32::NAN,
            difficulty: f32::INFINITY,
            ..MemoryModel::new()
        }
        .sanitized();
        assert_eq!(model.stability, S_MIN);
        assert_eq!(model.difficulty, 0.5);
    }

    #[test]
    fn accuracy_counts_lapses() {
        assert_eq!(MemoryModel::new().accuracy(), 1.0);
        let model = MemoryModel {
            repetition_count: 4,
            lapse_count: 1,
            ..MemoryModel::new()
        };
        assert_eq!(model.accuracy(), 0.75);
    }

    #[test]
    fn blank_example_does_not_count() {
        let mut item = ReviewItem::new(
            1,
            ItemContent {
                word: "lucid".into(),
                sense: "clear".into(),
                example: Some("   ".into()),
                ..Default::default()
            },
        );
        assert!(!item.has_example());
        item.content.example = Some("A lucid explanation.".into());
        assert!(item.has_example());
    }
}
