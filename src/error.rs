use snafu::Snafu;

use crate::memory::ItemId;

#[derive(Snafu, Debug)]
pub enum SrsError {
    InvalidParameters,
    #[snafu(display("rating must be between 1 and 4, got {value}"))]
    InvalidRating {
        value: u8,
    },
    #[snafu(display("invalid configuration: {reason}"))]
    InvalidConfig {
        reason: String,
    },
    #[snafu(display("item {id} is not part of this session"))]
    UnknownItem {
        id: ItemId,
    },
    #[snafu(display("question {index} is not part of this session"))]
    UnknownQuestion {
        index: usize,
    },
    #[snafu(display("question {index} has already been answered"))]
    QuestionAnswered {
        index: usize,
    },
    #[snafu(display("storage failure: {message}"))]
    Storage {
        message: String,
    },
}

pub type Result<T, E = SrsError> = std::result::Result<T, E>;
