use itertools::Itertools;
use log::debug;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::{Result, SrsError};
use crate::memory::{ItemId, LearningState, ReviewItem};

pub(crate) const BLANK: &str = "____";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum QuestionShape {
    RecognitionForward,
    RecognitionBackward,
    ClozeFromExample,
    SpellFromAudio,
    MatchingSet,
}

impl QuestionShape {
    /// Single-item shapes an item in `state` may be asked with.
    pub fn allowed_for(state: LearningState) -> &'static [QuestionShape] {
        use QuestionShape::*;
        match state {
            LearningState::New | LearningState::Relearning => {
                &[RecognitionForward, RecognitionBackward]
            }
            LearningState::Learning => &[RecognitionForward, RecognitionBackward, ClozeFromExample],
            LearningState::Review => &[
                RecognitionForward,
                RecognitionBackward,
                ClozeFromExample,
                SpellFromAudio,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingPair {
    pub item_id: ItemId,
    pub word: String,
    pub sense: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionQuestion {
    /// Show the word, pick its meaning.
    RecognitionForward {
        item_id: ItemId,
        word: String,
        choices: Vec<String>,
        answer: String,
    },
    /// Show the meaning, pick the word.
    RecognitionBackward {
        item_id: ItemId,
        sense: String,
        choices: Vec<String>,
        answer: String,
    },
    /// Fill the blank in the item's example sentence.
    ClozeFromExample {
        item_id: ItemId,
        sentence: String,
        hint: String,
        answer: String,
    },
    /// Type the word after hearing it.
    SpellFromAudio {
        item_id: ItemId,
        audio: String,
        phonetic: Option<String>,
        answer: String,
    },
    /// Pair each word with its meaning; senses are displayed in `sense_order`.
    MatchingSet {
        pairs: Vec<MatchingPair>,
        sense_order: Vec<usize>,
    },
}

/// What the user submitted for a question.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Text(String),
    Pairs(Vec<(ItemId, String)>),
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

impl SessionQuestion {
    pub fn shape(&self) -> QuestionShape {
        match self {
            SessionQuestion::RecognitionForward { .. } => QuestionShape::RecognitionForward,
            SessionQuestion::RecognitionBackward { .. } => QuestionShape::RecognitionBackward,
            SessionQuestion::ClozeFromExample { .. } => QuestionShape::ClozeFromExample,
            SessionQuestion::SpellFromAudio { .. } => QuestionShape::SpellFromAudio,
            SessionQuestion::MatchingSet { .. } => QuestionShape::MatchingSet,
        }
    }

    /// Items an answer to this question is attributed to.
    pub fn covered_items(&self) -> Vec<ItemId> {
        match self {
            SessionQuestion::RecognitionForward { item_id, .. }
            | SessionQuestion::RecognitionBackward { item_id, .. }
            | SessionQuestion::ClozeFromExample { item_id, .. }
            | SessionQuestion::SpellFromAudio { item_id, .. } => vec![*item_id],
            SessionQuestion::MatchingSet { pairs, .. } => {
                pairs.iter().map(|pair| pair.item_id).collect()
            }
        }
    }

    /// Per-item correctness of `response`. Comparison ignores case and surrounding
    /// whitespace; a response of the wrong kind marks every covered item wrong.
    pub fn grade(&self, response: &Response) -> Vec<(ItemId, bool)> {
        match (self, response) {
            (SessionQuestion::MatchingSet { pairs, .. }, Response::Pairs(given)) => pairs
                .iter()
                .map(|pair| {
                    let correct = given.iter().any(|(id, sense)| {
                        *id == pair.item_id && normalize(sense) == normalize(&pair.sense)
                    });
                    (pair.item_id, correct)
                })
                .collect(),
            (
                SessionQuestion::RecognitionForward { item_id, answer, .. }
                | SessionQuestion::RecognitionBackward { item_id, answer, .. }
                | SessionQuestion::ClozeFromExample { item_id, answer, .. }
                | SessionQuestion::SpellFromAudio { item_id, answer, .. },
                Response::Text(text),
            ) => vec![(*item_id, normalize(text) == normalize(answer))],
            _ => self
                .covered_items()
                .into_iter()
                .map(|id| (id, false))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub matching_min: usize,
    pub matching_max: usize,
    /// Items that must already be covered before a second matching set is added.
    pub second_matching_after: usize,
    /// Options shown by recognition questions, answer included.
    pub choice_count: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            matching_min: 4,
            matching_max: 6,
            second_matching_after: 8,
            choice_count: 4,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.matching_min < 2 || self.matching_min > self.matching_max {
            return Err(SrsError::InvalidConfig {
                reason: "matching sets need 2 <= matching_min <= matching_max".to_string(),
            });
        }
        if self.choice_count == 0 {
            return Err(SrsError::InvalidConfig {
                reason: "recognition questions need at least one choice".to_string(),
            });
        }
        Ok(())
    }
}

/// Turns selected items into an ordered, mixed list of exercises.
#[derive(Debug, Clone, Default)]
pub struct QuestionGenerator {
    config: GeneratorConfig,
}

impl QuestionGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Builds at most `max_questions` worth of exercises from `items`.
    ///
    /// A matching set uses up one unit of `max_questions` per pair, every other
    /// question uses one. The list opens with a matching set when at least
    /// `matching_min` items are available, continues with one question per remaining
    /// item, and may close with a second matching set recycling individually asked
    /// items once enough material has been covered.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        items: &[ReviewItem],
        max_questions: usize,
        rng: &mut R,
    ) -> Vec<SessionQuestion> {
        let config = &self.config;
        let items = items.iter().unique_by(|item| item.id).collect_vec();
        let mut questions = vec![];
        let mut budget = max_questions;

        let opening = items.len().min(config.matching_max).min(budget);
        let rest = if opening >= config.matching_min {
            questions.push(matching_set(&items[..opening], rng));
            budget -= opening;
            &items[opening..]
        } else {
            &items[..]
        };

        let mut asked = vec![];
        for &item in rest {
            if budget == 0 {
                break;
            }
            questions.push(self.single(item, &items, rng));
            asked.push(item);
            budget -= 1;
        }

        let covered = items.len() - rest.len() + asked.len();
        let closing = asked.len().min(config.matching_max).min(budget);
        if covered >= config.second_matching_after && closing >= config.matching_min {
            let group = asked.choose_multiple(rng, closing).copied().collect_vec();
            questions.push(matching_set(&group, rng));
        }

        debug!(
            "generated {} questions covering {} of {} items",
            questions.len(),
            covered,
            items.len()
        );
        questions
    }

    fn single<R: Rng + ?Sized>(
        &self,
        item: &ReviewItem,
        items: &[&ReviewItem],
        rng: &mut R,
    ) -> SessionQuestion {
        let allowed = QuestionShape::allowed_for(item.memory.state);
        let shape = allowed
            .choose(rng)
            .copied()
            .unwrap_or(QuestionShape::RecognitionForward);
        let content = &item.content;

        match shape {
            QuestionShape::ClozeFromExample => {
                let sentence = content
                    .example
                    .as_deref()
                    .filter(|_| item.has_example())
                    .and_then(|example| blank_out(example, &content.word));
                if let Some(sentence) = sentence {
                    return SessionQuestion::ClozeFromExample {
                        item_id: item.id,
                        sentence,
                        hint: content.sense.clone(),
                        answer: content.word.clone(),
                    };
                }
                debug!("item {} has no usable example sentence, asking recognition", item.id);
            }
            QuestionShape::SpellFromAudio => {
                if let Some(audio) = content.audio.as_ref().filter(|_| item.has_audio()) {
                    return SessionQuestion::SpellFromAudio {
                        item_id: item.id,
                        audio: audio.clone(),
                        phonetic: content.phonetic.clone(),
                        answer: content.word.clone(),
                    };
                }
                debug!("item {} has no audio, asking recognition", item.id);
                return self.recognition_backward(item, items, rng);
            }
            QuestionShape::RecognitionBackward => {
                return self.recognition_backward(item, items, rng);
            }
            QuestionShape::RecognitionForward | QuestionShape::MatchingSet => {}
        }
        self.recognition_forward(item, items, rng)
    }

    fn recognition_forward<R: Rng + ?Sized>(
        &self,
        item: &ReviewItem,
        items: &[&ReviewItem],
        rng: &mut R,
    ) -> SessionQuestion {
        let answer = item.content.sense.clone();
        let others = items
            .iter()
            .map(|other| other.content.sense.as_str())
            .collect_vec();
        SessionQuestion::RecognitionForward {
            item_id: item.id,
            word: item.content.word.clone(),
            choices: self.choices(&answer, &others, rng),
            answer,
        }
    }

    fn recognition_backward<R: Rng + ?Sized>(
        &self,
        item: &ReviewItem,
        items: &[&ReviewItem],
        rng: &mut R,
    ) -> SessionQuestion {
        let answer = item.content.word.clone();
        let others = items
            .iter()
            .map(|other| other.content.word.as_str())
            .collect_vec();
        SessionQuestion::RecognitionBackward {
            item_id: item.id,
            sense: item.content.sense.clone(),
            choices: self.choices(&answer, &others, rng),
            answer,
        }
    }

    /// The answer plus distinct distractors drawn from `others`, shuffled.
    fn choices<R: Rng + ?Sized>(&self, answer: &str, others: &[&str], rng: &mut R) -> Vec<String> {
        let distractors = others
            .iter()
            .copied()
            .filter(|other| normalize(other) != normalize(answer) && !other.trim().is_empty())
            .unique_by(|other| normalize(other))
            .collect_vec();
        let mut choices = distractors
            .choose_multiple(rng, self.config.choice_count.saturating_sub(1))
            .map(|distractor| distractor.to_string())
            .collect_vec();
        choices.push(answer.to_string());
        choices.shuffle(rng);
        choices
    }
}

fn matching_set<R: Rng + ?Sized>(items: &[&ReviewItem], rng: &mut R) -> SessionQuestion {
    let pairs = items
        .iter()
        .map(|item| MatchingPair {
            item_id: item.id,
            word: item.content.word.clone(),
            sense: item.content.sense.clone(),
        })
        .collect_vec();
    let mut sense_order = (0..pairs.len()).collect_vec();
    sense_order.shuffle(rng);
    SessionQuestion::MatchingSet { pairs, sense_order }
}

/// Replaces the first whole-word occurrence of `word` in `example` (ASCII
/// case-insensitive). Matches inside a longer word do not count.
fn blank_out(example: &str, word: &str) -> Option<String> {
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_';
    let start = example.char_indices().map(|(i, _)| i).find(|&i| {
        let end = i + word.len();
        example
            .get(i..end)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(word))
            && !example[..i].chars().next_back().is_some_and(is_word_char)
            && !example[end..].chars().next().is_some_and(is_word_char)
    })?;
    Some(format!(
        "{}{}{}",
        &example[..start],
        BLANK,
        &example[start + word.len()..]
    ))
}

/// [`QuestionGenerator::generate`] with the default configuration.
pub fn generate<R: Rng + ?Sized>(
    items: &[ReviewItem],
    max_questions: usize,
    rng: &mut R,
) -> Vec<SessionQuestion> {
    QuestionGenerator::default().generate(items, max_questions, rng)
}
