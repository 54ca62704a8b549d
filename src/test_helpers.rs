use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::memory::{ItemContent, ItemId, LearningState, MemoryModel, ReviewItem};

pub(crate) trait TestHelper {
    fn assert_approx_eq<const N: usize>(&self, expected: [f32; N]);
}

impl TestHelper for [f32] {
    fn assert_approx_eq<const N: usize>(&self, expected: [f32; N]) {
        assert_eq!(self.len(), N, "length mismatch: {self:?} vs {expected:?}");
        for (i, (actual, expected)) in self.iter().zip(expected).enumerate() {
            let tolerance = 1e-4 * expected.abs().max(1.0);
            assert!(
                (actual - expected).abs() <= tolerance,
                "at index {i}: {actual} is not approximately {expected}"
            );
        }
    }
}

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub(crate) fn days(days: f32) -> Duration {
    Duration::seconds((days * 86_400.0).round() as i64)
}

pub(crate) fn review_model(stability: f32, difficulty: f32, last: DateTime<Utc>) -> MemoryModel {
    MemoryModel {
        state: LearningState::Review,
        stability,
        difficulty,
        last_review_at: Some(last),
        next_review_at: Some(last + days(stability)),
        repetition_count: 3,
        lapse_count: 0,
    }
}

pub(crate) fn content(word: &str) -> ItemContent {
    ItemContent {
        word: word.to_string(),
        sense: format!("meaning of {word}"),
        example: Some(format!("She used the word {word} twice.")),
        phonetic: None,
        audio: Some(format!("audio/{word}.mp3")),
    }
}

pub(crate) fn new_item(id: ItemId) -> ReviewItem {
    ReviewItem::new(id, content(&format!("word{id}")))
}

/// An item in review whose due date is `overdue_by` before `now`.
pub(crate) fn due_item(id: ItemId, now: DateTime<Utc>, overdue_by: Duration) -> ReviewItem {
    let next = now - overdue_by;
    let mut memory = review_model(5.0, 0.4, next - days(5.0));
    memory.next_review_at = Some(next);
    ReviewItem {
        memory,
        ..new_item(id)
    }
}

pub(crate) fn items_in_state(count: ItemId, state: LearningState) -> Vec<ReviewItem> {
    (1..=count)
        .map(|id| {
            let mut item = new_item(id);
            item.memory.state = state;
            if state != LearningState::New {
                item.memory.last_review_at = Some(fixed_now() - Duration::days(1));
            }
            item
        })
        .collect()
}
