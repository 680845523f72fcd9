use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::agent::Shape;

/// The QA agent's verdict on a generated game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    reasoning: String,
    /// Absent verdicts count as a failure.
    #[serde(default)]
    correct: bool,
}

impl ValidationResult {
    pub fn new(reasoning: String, correct: bool) -> Self {
        Self { reasoning, correct }
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn correct(&self) -> bool {
        self.correct
    }
}

impl Shape for ValidationResult {
    const NAME: &'static str = "QAOutput";

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {
                    "type": "string",
                    "description": "Explain your reasoning"
                },
                "correct": {
                    "type": "boolean",
                    "description": "Does the game pass your criteria?",
                    "default": false
                }
            },
            "required": ["reasoning"]
        })
    }
}
