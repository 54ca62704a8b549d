use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;

use crate::error::{Result, SrsError};
use crate::memory::{ItemContent, ItemId, MemoryModel, Rating, ReviewItem};
use crate::model::Scheduler;
use crate::question::{QuestionGenerator, Response, SessionQuestion};
use crate::review::{ReviewRecorder, SessionStats};
use crate::selection::CandidateSelector;

/// Persistence collaborator. Implementations must give the session single-writer
/// access to the items it loaded until it finishes.
pub trait ItemStore {
    fn load_pool(&self) -> Result<Vec<ReviewItem>>;

    fn save_memory(&mut self, id: ItemId, memory: &MemoryModel) -> Result<()>;
}

/// Content collaborator: fills in optional display data an item is missing.
/// It never sees or changes scheduling state.
pub trait ContentProvider {
    fn enrich(&self, content: &mut ItemContent);
}

/// A [`ContentProvider`] that leaves content as stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredContentOnly;

impl ContentProvider for StoredContentOnly {
    fn enrich(&self, _content: &mut ItemContent) {}
}

/// Everything needed to turn an item pool into a review session.
#[derive(Debug, Clone, Default)]
pub struct SessionPlanner {
    pub scheduler: Scheduler,
    pub selector: CandidateSelector,
    pub generator: QuestionGenerator,
}

impl SessionPlanner {
    /// Load the pool, enrich the chosen items, then build their questions.
    pub fn start<S, C, R>(
        &self,
        store: &S,
        content: &C,
        now: DateTime<Utc>,
        limit: usize,
        max_questions: usize,
        rng: &mut R,
    ) -> Result<Session>
    where
        S: ItemStore + ?Sized,
        C: ContentProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let pool = store.load_pool()?;
        let mut items = self.selector.select(&pool, now, limit, rng);
        for item in &mut items {
            content.enrich(&mut item.content);
        }
        let questions = self.generator.generate(&items, max_questions, rng);
        info!(
            "session started: {} of {} items selected, {} questions",
            items.len(),
            pool.len(),
            questions.len()
        );
        Ok(Session {
            items,
            questions,
            recorder: ReviewRecorder::new(self.scheduler.clone()),
            answered: BTreeSet::new(),
            scheduled: HashSet::new(),
            unsaved: BTreeSet::new(),
        })
    }
}

/// One review sitting. Each item is scheduled at most once: later answers for an
/// item that already moved (the recycled matching set, a repeated `answer`) only
/// count as reinforcement.
#[derive(Debug, Clone)]
pub struct Session {
    items: Vec<ReviewItem>,
    questions: Vec<SessionQuestion>,
    recorder: ReviewRecorder,
    answered: BTreeSet<usize>,
    scheduled: HashSet<ItemId>,
    unsaved: BTreeSet<ItemId>,
}

impl Session {
    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn questions(&self) -> &[SessionQuestion] {
        &self.questions
    }

    pub fn recorder(&self) -> &ReviewRecorder {
        &self.recorder
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.answered.contains(&index)
    }

    /// Items whose new memory model has not reached the store yet.
    pub fn unsaved_items(&self) -> Vec<ItemId> {
        self.unsaved.iter().copied().collect()
    }

    fn position(&self, item_id: ItemId) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(SrsError::UnknownItem { id: item_id })
    }

    /// Updates the in-session copy only.
    fn apply(&mut self, item_id: ItemId, rating: Rating, now: DateTime<Utc>) -> Result<bool> {
        let index = self.position(item_id)?;
        if !self.scheduled.insert(item_id) {
            let correct = rating.is_correct();
            debug!("item {item_id} already scheduled this session, recording reinforcement");
            self.recorder.record_reinforcement(item_id, correct);
            return Ok(correct);
        }
        let (memory, correct) = self.recorder.record_answer(&self.items[index], rating, now);
        self.items[index].memory = memory;
        self.unsaved.insert(item_id);
        Ok(correct)
    }

    /// Writes every unsaved item back. Items that fail stay unsaved, so calling
    /// this again retries them without rescheduling anything. Returns the first
    /// store error.
    pub fn flush<S: ItemStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        let mut result = Ok(());
        for item_id in std::mem::take(&mut self.unsaved) {
            let Some(item) = self.items.iter().find(|item| item.id == item_id) else {
                continue;
            };
            if let Err(err) = store.save_memory(item_id, &item.memory) {
                warn!("failed to save item {item_id}: {err}");
                self.unsaved.insert(item_id);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Schedules the answer and writes the item back before returning whether the
    /// answer was correct. The in-session copy is updated even if the write fails;
    /// [`Session::flush`] retries it.
    pub fn answer<S: ItemStore + ?Sized>(
        &mut self,
        store: &mut S,
        item_id: ItemId,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let correct = self.apply(item_id, rating, now)?;
        self.flush(store)?;
        Ok(correct)
    }

    /// Grades `response` against question `index` and records each covered item
    /// as Good when right and Again when wrong.
    ///
    /// Every covered item is graded and applied before anything is written, and the
    /// question is marked answered even if a write fails. A second call for the same
    /// question returns [`SrsError::QuestionAnswered`].
    pub fn answer_question<S: ItemStore + ?Sized>(
        &mut self,
        store: &mut S,
        index: usize,
        response: &Response,
        now: DateTime<Utc>,
    ) -> Result<Vec<(ItemId, bool)>> {
        let question = self
            .questions
            .get(index)
            .ok_or(SrsError::UnknownQuestion { index })?;
        if self.answered.contains(&index) {
            return Err(SrsError::QuestionAnswered { index });
        }
        let graded = question.grade(response);
        for &(item_id, _) in &graded {
            self.position(item_id)?;
        }
        self.answered.insert(index);
        for &(item_id, correct) in &graded {
            self.apply(item_id, Rating::from_correct(correct), now)?;
        }
        self.flush(store)?;
        Ok(graded)
    }

    pub fn skip(&mut self, item_id: ItemId) -> Result<()> {
        self.position(item_id)?;
        self.recorder.record_skip(item_id);
        Ok(())
    }

    pub fn finish(self) -> SessionStats {
        if !self.unsaved.is_empty() {
            warn!(
                "session finished with {} unsaved items: {:?}",
                self.unsaved.len(),
                self.unsaved
            );
        }
        let stats = self.recorder.stats();
        info!(
            "session finished: {}/{} correct, {} skipped, {} repeats",
            stats.correct, stats.total, stats.skipped, stats.reinforced
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LearningState;
    use crate::question::QuestionShape;
    use crate::test_helpers::{due_item, fixed_now, items_in_state};
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MemoryStore {
        items: BTreeMap<ItemId, ReviewItem>,
        fail_saves: bool,
        fail_on: Option<ItemId>,
    }

    impl MemoryStore {
        fn with(items: Vec<ReviewItem>) -> Self {
            Self {
                items: items.into_iter().map(|item| (item.id, item)).collect(),
                ..Default::default()
            }
        }

        fn repetitions(&self, id: ItemId) -> u32 {
            self.items[&id].memory.repetition_count
        }
    }

    impl ItemStore for MemoryStore {
        fn load_pool(&self) -> Result<Vec<ReviewItem>> {
            Ok(self.items.values().cloned().collect())
        }

        fn save_memory(&mut self, id: ItemId, memory: &MemoryModel) -> Result<()> {
            if self.fail_saves || self.fail_on == Some(id) {
                return Err(SrsError::Storage {
                    message: "disk full".to_string(),
                });
            }
            let item = self.items.get_mut(&id).ok_or(SrsError::UnknownItem { id })?;
            item.memory = memory.clone();
            Ok(())
        }
    }

    struct ExampleDictionary;

    impl ContentProvider for ExampleDictionary {
        fn enrich(&self, content: &mut ItemContent) {
            if content.example.is_none() {
                content.example = Some(format!("Look up {} again.", content.word));
            }
        }
    }

    fn correct_response(question: &SessionQuestion) -> Response {
        match question {
            SessionQuestion::MatchingSet { pairs, .. } => Response::Pairs(
                pairs
                    .iter()
                    .map(|pair| (pair.item_id, pair.sense.clone()))
                    .collect(),
            ),
            SessionQuestion::RecognitionForward { answer, .. }
            | SessionQuestion::RecognitionBackward { answer, .. }
            | SessionQuestion::ClozeFromExample { answer, .. }
            | SessionQuestion::SpellFromAudio { answer, .. } => Response::Text(answer.clone()),
        }
    }

    fn start(store: &MemoryStore, max_questions: usize, seed: u64) -> Result<Session> {
        let mut rng = StdRng::seed_from_u64(seed);
        SessionPlanner::default().start(
            store,
            &StoredContentOnly,
            fixed_now(),
            20,
            max_questions,
            &mut rng,
        )
    }

    #[test]
    fn fifteen_new_items_end_to_end() -> Result<()> {
        let now = fixed_now();
        let mut store = MemoryStore::with(items_in_state(15, LearningState::New));

        let mut session = start(&store, 15, 42)?;
        assert_eq!(session.items().len(), 15);
        assert_eq!(session.questions().len(), 10);
        assert_eq!(session.questions()[0].shape(), QuestionShape::MatchingSet);
        assert_eq!(session.questions()[0].covered_items().len(), 6);

        let ids = session.items().iter().map(|item| item.id).collect::<Vec<_>>();
        for (i, id) in ids.iter().enumerate() {
            let rating = if i % 5 == 0 { Rating::Again } else { Rating::Good };
            session.answer(&mut store, *id, rating, now)?;
        }
        for id in &ids {
            let saved = &store.items[id].memory;
            assert_eq!(saved.repetition_count, 1);
            assert_eq!(saved.state, LearningState::Learning);
        }

        let stats = session.finish();
        assert_eq!(stats.total, 15);
        assert_eq!(stats.correct, 12);
        assert_eq!(stats.wrong, 3);
        assert_eq!(stats.accuracy, 0.8);
        Ok(())
    }

    #[test]
    fn recycled_matching_set_does_not_reschedule() -> Result<()> {
        let now = fixed_now();
        let mut store = MemoryStore::with(items_in_state(14, LearningState::New));
        let mut session = start(&store, 30, 7)?;
        assert_eq!(session.questions().len(), 10);
        let closing = session.questions().last().cloned();
        assert_eq!(closing.as_ref().map(SessionQuestion::shape), Some(QuestionShape::MatchingSet));

        for index in 0..session.questions().len() {
            let response = correct_response(&session.questions()[index]);
            session.answer_question(&mut store, index, &response, now)?;
        }
        for item in store.items.values() {
            assert_eq!(item.memory.repetition_count, 1, "item {}", item.id);
            assert_eq!(item.memory.state, LearningState::Learning);
        }

        let stats = session.finish();
        assert_eq!((stats.total, stats.correct, stats.wrong), (14, 14, 0));
        assert_eq!(stats.reinforced, 6);
        assert_eq!(stats.accuracy, 1.0);
        Ok(())
    }

    #[test]
    fn repeated_answer_counts_as_reinforcement() -> Result<()> {
        let now = fixed_now();
        let mut store = MemoryStore::with(items_in_state(2, LearningState::New));
        let mut session = start(&store, 2, 3)?;

        assert!(session.answer(&mut store, 1, Rating::Good, now)?);
        assert!(!session.answer(&mut store, 1, Rating::Again, now)?);
        assert_eq!(store.repetitions(1), 1);
        assert_eq!(store.items[&1].memory.lapse_count, 0);

        let stats = session.finish();
        assert_eq!((stats.total, stats.correct, stats.reinforced), (1, 1, 1));
        Ok(())
    }

    #[test]
    fn question_cannot_be_answered_twice() -> Result<()> {
        let now = fixed_now();
        let mut store = MemoryStore::with(items_in_state(2, LearningState::New));
        let mut session = start(&store, 2, 5)?;
        let response = correct_response(&session.questions()[0]);

        session.answer_question(&mut store, 0, &response, now)?;
        assert!(session.is_answered(0));
        assert!(matches!(
            session.answer_question(&mut store, 0, &response, now),
            Err(SrsError::QuestionAnswered { index: 0 })
        ));

        let item_id = session.questions()[0].covered_items()[0];
        assert_eq!(store.repetitions(item_id), 1);
        assert_eq!(store.items[&item_id].memory.state, LearningState::Learning);
        let stats = session.finish();
        assert_eq!((stats.total, stats.correct), (1, 1));
        Ok(())
    }

    #[test]
    fn failed_write_inside_matching_set_is_retried_by_flush() -> Result<()> {
        let now = fixed_now();
        let mut store = MemoryStore::with(items_in_state(6, LearningState::New));
        let mut session = start(&store, 6, 4)?;
        let question = session.questions()[0].clone();
        assert_eq!(question.shape(), QuestionShape::MatchingSet);
        let covered = question.covered_items();
        let failing = covered[2];
        store.fail_on = Some(failing);

        let response = correct_response(&question);
        assert!(matches!(
            session.answer_question(&mut store, 0, &response, now),
            Err(SrsError::Storage { .. })
        ));
        // Every pair was applied, only the failed write is outstanding.
        assert_eq!(session.unsaved_items(), [failing]);
        for &id in &covered {
            let expected = if id == failing { 0 } else { 1 };
            assert_eq!(store.repetitions(id), expected);
        }
        assert!(matches!(
            session.answer_question(&mut store, 0, &response, now),
            Err(SrsError::QuestionAnswered { index: 0 })
        ));
        assert!(session.flush(&mut store).is_err());

        store.fail_on = None;
        session.flush(&mut store)?;
        assert!(session.unsaved_items().is_empty());
        assert!(covered.iter().all(|&id| store.repetitions(id) == 1));

        let stats = session.finish();
        assert_eq!((stats.total, stats.correct, stats.reinforced), (6, 6, 0));
        Ok(())
    }

    #[test]
    fn reviewed_items_are_not_reselected_until_due() -> Result<()> {
        let now = fixed_now();
        let mut rng = StdRng::seed_from_u64(1);
        let mut store = MemoryStore::with(vec![
            due_item(1, now, Duration::hours(3)),
            due_item(2, now, Duration::days(2)),
        ]);
        let planner = SessionPlanner::default();
        let mut session = planner.start(&store, &StoredContentOnly, now, 20, 10, &mut rng)?;
        assert_eq!(session.items().len(), 2);
        session.answer(&mut store, 1, Rating::Good, now)?;
        session.answer(&mut store, 2, Rating::Easy, now)?;
        session.finish();

        let later = now + Duration::hours(1);
        let session = planner.start(&store, &StoredContentOnly, later, 20, 10, &mut rng)?;
        assert!(session.items().is_empty());
        assert!(session.questions().is_empty());
        Ok(())
    }

    #[test]
    fn content_provider_fills_missing_examples() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(9);
        let mut items = items_in_state(3, LearningState::Review);
        for item in &mut items {
            item.content.example = None;
            item.memory.next_review_at = Some(fixed_now() - Duration::hours(1));
        }
        let store = MemoryStore::with(items);
        let session = SessionPlanner::default().start(
            &store,
            &ExampleDictionary,
            fixed_now(),
            20,
            10,
            &mut rng,
        )?;
        assert!(session.items().iter().all(ReviewItem::has_example));
        Ok(())
    }

    #[test]
    fn answer_question_grades_every_covered_item() -> Result<()> {
        let now = fixed_now();
        let mut store = MemoryStore::with(items_in_state(6, LearningState::New));
        let mut session = start(&store, 6, 4)?;
        let SessionQuestion::MatchingSet { pairs, .. } = session.questions()[0].clone() else {
            panic!("expected a matching set first");
        };
        let mut given = pairs
            .iter()
            .map(|pair| (pair.item_id, pair.sense.clone()))
            .collect::<Vec<_>>();
        given[0].1 = "nonsense".to_string();

        let graded = session.answer_question(&mut store, 0, &Response::Pairs(given), now)?;
        assert_eq!(graded.iter().filter(|(_, correct)| *correct).count(), 5);
        assert_eq!(store.items[&pairs[0].item_id].memory.stability, 0.5);

        let stats = session.finish();
        assert_eq!((stats.correct, stats.wrong), (5, 1));
        Ok(())
    }

    #[test]
    fn unknown_items_and_storage_failures_surface() -> Result<()> {
        let now = fixed_now();
        let mut store = MemoryStore::with(items_in_state(2, LearningState::New));
        let mut session = start(&store, 2, 4)?;

        assert!(matches!(
            session.answer(&mut store, 99, Rating::Good, now),
            Err(SrsError::UnknownItem { id: 99 })
        ));
        assert!(session.skip(99).is_err());
        assert!(matches!(
            session.answer_question(&mut store, 50, &Response::Text(String::new()), now),
            Err(SrsError::UnknownQuestion { index: 50 })
        ));

        store.fail_saves = true;
        assert!(matches!(
            session.answer(&mut store, 1, Rating::Good, now),
            Err(SrsError::Storage { .. })
        ));
        // The in-session copy still advanced.
        let item = session.items().iter().find(|item| item.id == 1).unwrap();
        assert_eq!(item.memory.repetition_count, 1);
        assert_eq!(session.unsaved_items(), [1]);

        session.skip(2)?;
        let stats = session.finish();
        assert_eq!((stats.total, stats.skipped), (2, 1));
        Ok(())
    }
}
