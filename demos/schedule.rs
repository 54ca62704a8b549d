use chrono::{Duration, Utc};
use vocab_srs::{ItemContent, LearningState, MemoryModel, Rating, ReviewItem, Scheduler};

fn print_next_states(scheduler: &Scheduler, memory: &MemoryModel) {
    let now = Utc::now();
    let next_states = scheduler.next_states(memory, now);
    for rating in [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy] {
        let next = next_states.get(rating);
        let due_in = next.next_review_at.map_or(Duration::zero(), |due| due - now);
        println!(
            "{rating:>5}: {} due in {:.2} days (stability {:.2}, difficulty {:.3})",
            next.state,
            due_in.num_minutes() as f32 / 1440.0,
            next.stability,
            next.difficulty
        );
    }
}

fn schedule_new_item() -> Result<(), Box<dyn std::error::Error>> {
    let mut item = ReviewItem::new(
        1,
        ItemContent {
            word: "serendipity".to_string(),
            sense: "a happy accident".to_string(),
            example: Some("Meeting her there was pure serendipity.".to_string()),
            phonetic: None,
            audio: None,
        },
    );

    // Default weights and configuration
    let scheduler = Scheduler::new(None)?;
    print_next_states(&scheduler, &item.memory);

    // Assume the answer was `good`
    item.memory = scheduler.schedule(&item.memory, Rating::Good, Utc::now());
    println!("Next review due: {:?}", item.memory.next_review_at);
    println!("Memory: {:?}", item.memory);
    Ok(())
}

fn schedule_review_item() -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();
    // Reviewed a week ago, due today
    let memory = MemoryModel {
        state: LearningState::Review,
        stability: 7.0,
        difficulty: 0.45,
        last_review_at: Some(now - Duration::days(7)),
        next_review_at: Some(now),
        repetition_count: 4,
        lapse_count: 1,
    };

    let scheduler = Scheduler::new(None)?;
    println!(
        "Retrievability now: {:.3}",
        scheduler.retrievability(&memory, now)
    );
    print_next_states(&scheduler, &memory);

    // Assume the answer was `again`
    let memory = scheduler.schedule(&memory, Rating::Again, now);
    println!("Next review due: {:?}", memory.next_review_at);
    println!("Memory: {memory:?}");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Scheduling a new item:");
    schedule_new_item()?;

    println!("\nScheduling a review item:");
    schedule_review_item()?;

    Ok(())
}
