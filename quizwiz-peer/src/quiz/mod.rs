//! Quiz documents, authoring rules, storage and vote counting.

pub mod model;
pub mod store;
pub mod tally;

pub use model::{AnswerOption, OptionColor, OptionId, Question, Quiz, QuizError};
pub use store::{JsonFileStore, MemoryStore, QuizStore, StoreError};
pub use tally::{CastOutcome, VoteTally};
