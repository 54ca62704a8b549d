mod error;
mod inference;
mod memory;
mod model;
mod parameter_clipper;
mod question;
mod review;
mod selection;
mod session;
#[cfg(test)]
mod test_helpers;

pub use error::{Result, SrsError};
pub use inference::{
    DEFAULT_PARAMETERS, NextStates, PARAMETER_COUNT, Parameters, current_retrievability, schedule,
};
pub use memory::{ItemContent, ItemId, LearningState, MemoryModel, Rating, ReviewItem};
pub use model::{Scheduler, SchedulerConfig};
pub use question::{
    GeneratorConfig, MatchingPair, QuestionGenerator, QuestionShape, Response, SessionQuestion,
    generate,
};
pub use review::{AnswerOutcome, ReviewRecorder, SessionStats, finalize};
pub use selection::{CandidateSelector, SelectorConfig, Tier, select};
pub use session::{ContentProvider, ItemStore, Session, SessionPlanner, StoredContentOnly};
