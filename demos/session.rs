use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use vocab_srs::{
    ItemContent, ItemId, ItemStore, MemoryModel, Rating, Response, ReviewItem, SessionPlanner,
    SessionQuestion, SrsError, StoredContentOnly,
};

/// Keeps the whole deck in memory.
#[derive(Default)]
struct Deck {
    items: BTreeMap<ItemId, ReviewItem>,
}

impl ItemStore for Deck {
    fn load_pool(&self) -> vocab_srs::Result<Vec<ReviewItem>> {
        Ok(self.items.values().cloned().collect())
    }

    fn save_memory(&mut self, id: ItemId, memory: &MemoryModel) -> vocab_srs::Result<()> {
        let item = self.items.get_mut(&id).ok_or(SrsError::UnknownItem { id })?;
        item.memory = memory.clone();
        Ok(())
    }
}

const WORDS: [(&str, &str); 10] = [
    ("serendipity", "a happy accident"),
    ("ephemeral", "lasting a very short time"),
    ("ubiquitous", "found everywhere"),
    ("laconic", "using few words"),
    ("gregarious", "fond of company"),
    ("meticulous", "very careful about detail"),
    ("candid", "truthful and straightforward"),
    ("obstinate", "stubbornly refusing to change"),
    ("lucid", "clearly expressed"),
    ("frugal", "sparing with money"),
];

fn setup_logger() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

/// Answers every question correctly except the ones covering `forgotten`.
fn respond(question: &SessionQuestion, forgotten: &str) -> Response {
    match question {
        SessionQuestion::MatchingSet { pairs, .. } => Response::Pairs(
            pairs
                .iter()
                .map(|pair| (pair.item_id, pair.sense.clone()))
                .collect(),
        ),
        SessionQuestion::RecognitionForward { word, answer, .. } if word == forgotten => {
            Response::Text(format!("not {answer}"))
        }
        SessionQuestion::RecognitionForward { answer, .. }
        | SessionQuestion::RecognitionBackward { answer, .. }
        | SessionQuestion::ClozeFromExample { answer, .. }
        | SessionQuestion::SpellFromAudio { answer, .. } => Response::Text(answer.clone()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logger()?;

    let mut deck = Deck::default();
    for (id, (word, sense)) in WORDS.into_iter().enumerate() {
        let id = id as ItemId + 1;
        let content = ItemContent {
            word: word.to_string(),
            sense: sense.to_string(),
            example: None,
            phonetic: None,
            audio: None,
        };
        deck.items.insert(id, ReviewItem::new(id, content));
    }

    let planner = SessionPlanner::default();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut now = Utc::now();

    for day in 1..=3 {
        let mut session = planner.start(&deck, &StoredContentOnly, now, 20, 12, &mut rng)?;
        println!(
            "Day {day}: {} items, {} questions",
            session.items().len(),
            session.questions().len()
        );
        for index in 0..session.questions().len() {
            let response = respond(&session.questions()[index], "laconic");
            session.answer_question(&mut deck, index, &response, now)?;
        }
        // Anything the questions did not reach still gets a rating.
        let untouched = session
            .items()
            .iter()
            .filter(|item| item.memory.last_review_at != Some(now))
            .map(|item| item.id)
            .collect::<Vec<_>>();
        for id in untouched {
            session.answer(&mut deck, id, Rating::Good, now)?;
        }
        let stats = session.finish();
        println!("Day {day}: {stats:?}");
        now += Duration::days(1);
    }

    for item in deck.items.values() {
        println!(
            "{:<12} {:<10} due {:?}",
            item.content.word,
            item.memory.state,
            item.memory.next_review_at.map(|due| due.date_naive())
        );
    }
    Ok(())
}
