use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::agent::Shape;

/// What the developer agent hands back for one game description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    reasoning: String,
    code: String,
    instructions: String,
}

impl GenerationResult {
    pub fn new(reasoning: String, code: String, instructions: String) -> Self {
        Self {
            reasoning,
            code,
            instructions,
        }
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

impl Shape for GenerationResult {
    const NAME: &'static str = "GameOutput";

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {
                    "type": "string",
                    "description": "Explain your reasoning"
                },
                "code": {
                    "type": "string",
                    "description": "The html5 code for the game"
                },
                "instructions": {
                    "type": "string",
                    "description": "Instructions how to play the game"
                }
            },
            "required": ["reasoning", "code", "instructions"]
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("code is empty".to_string());
        }
        Ok(())
    }
}
