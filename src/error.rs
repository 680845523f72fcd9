use crate::models::GenerationResult;

/// The QA agent judged the generated game incorrect. Ends the run; no
/// artifact is written.
#[derive(Debug, thiserror::Error)]
#[error("QA failed for code: {}", .generation.code())]
pub struct QaRejected {
    generation: GenerationResult,
    reasoning: String,
}

impl QaRejected {
    pub fn new(generation: GenerationResult, reasoning: String) -> Self {
        Self {
            generation,
            reasoning,
        }
    }

    /// The rejected developer output, kept for the run history.
    pub fn generation(&self) -> &GenerationResult {
        &self.generation
    }

    pub fn code(&self) -> &str {
        self.generation.code()
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
}
