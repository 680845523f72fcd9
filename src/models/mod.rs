mod generation;
mod session;
mod validation;

pub use generation::GenerationResult;
pub use session::{RunRecord, RunState, SessionRecord, Usage};
pub use validation::ValidationResult;
