//! Generate-then-validate pipeline.
//!
//! One run moves strictly forward through [`Stage`]s:
//!
//! ```text
//! Start -> Generating -> Generated | GenerationFailed
//!       -> Validating -> Validated | ValidationFailed
//!       -> Accepted | Rejected
//! ```
//!
//! Missing or malformed model output ends the run with a soft [`Outcome`].
//! A conforming QA verdict of `correct = false` ends it with [`QaRejected`].

use std::cell::Cell;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use strum::AsRefStr;
use tracing::{debug, info, warn};

use crate::agent::{Model, Parsed, Response, Role, roles};
use crate::artifact::ArtifactSink;
use crate::error::QaRejected;
use crate::models::{GenerationResult, RunState, Usage, ValidationResult};

pub const GENERATION_FAILED_MESSAGE: &str = "Sorry, could not generate a game.";
pub const VALIDATION_FAILED_MESSAGE: &str = "Sorry, could not QA the game.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Start,
    Generating,
    Generated,
    GenerationFailed,
    Validating,
    Validated,
    ValidationFailed,
    Accepted,
    Rejected,
}

/// How a run ended, short of QA rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted {
        generation: GenerationResult,
        validation: ValidationResult,
        artifact: PathBuf,
    },
    GenerationFailed {
        reason: String,
    },
    ValidationFailed {
        generation: GenerationResult,
        reason: String,
    },
}

impl Outcome {
    /// The line shown to the user: play instructions or which stage failed.
    pub fn message(&self) -> &str {
        match self {
            Outcome::Accepted { generation, .. } => generation.instructions(),
            Outcome::GenerationFailed { .. } => GENERATION_FAILED_MESSAGE,
            Outcome::ValidationFailed { .. } => VALIDATION_FAILED_MESSAGE,
        }
    }

    pub fn state(&self) -> RunState {
        match self {
            Outcome::Accepted { .. } => RunState::Accepted,
            Outcome::GenerationFailed { .. } => RunState::GenerationFailed,
            Outcome::ValidationFailed { .. } => RunState::ValidationFailed,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }
}

#[derive(Serialize)]
struct QaInput<'a> {
    game_description: &'a str,
    game_code: &'a str,
}

/// The prompt handed to the QA agent.
pub fn qa_prompt(description: &str, code: &str) -> Result<String> {
    serde_json::to_string_pretty(&QaInput {
        game_description: description,
        game_code: code,
    })
    .context("Failed to serialize QA input")
}

pub struct Pipeline<M> {
    model: M,
    developer: Role,
    qa: Role,
    sink: ArtifactSink,
    stage: Cell<Stage>,
    usage: Cell<Usage>,
}

impl<M: Model> Pipeline<M> {
    pub fn new(model: M, sink: ArtifactSink) -> Self {
        Self {
            model,
            developer: roles::developer(),
            qa: roles::qa(),
            sink,
            stage: Cell::new(Stage::Start),
            usage: Cell::new(Usage::default()),
        }
    }

    pub fn sink(&self) -> &ArtifactSink {
        &self.sink
    }

    /// Where the most recent run stopped.
    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    /// Tokens spent by the most recent run.
    pub fn usage(&self) -> Usage {
        self.usage.get()
    }

    fn enter(&self, stage: Stage) {
        debug!(stage = stage.as_ref(), "Pipeline stage");
        self.stage.set(stage);
    }

    fn invoke(&self, role: &Role, prompt: &str) -> Result<Response> {
        let response = self.model.invoke(role, prompt)?;
        self.usage.set(self.usage.get().add(response.usage()));
        Ok(response)
    }

    /// Ask the developer agent for a game.
    pub fn generate(&self, description: &str) -> Result<Parsed<GenerationResult>> {
        info!(description, "Game description");

        let parsed = self
            .invoke(&self.developer, description)?
            .parse::<GenerationResult>();

        match &parsed {
            Parsed::Valid(generation) => info!(code = generation.code(), "Game code"),
            other => warn!(reason = %other.describe(), "Developer agent returned no usable game"),
        }
        Ok(parsed)
    }

    /// Ask the QA agent whether `code` implements `description`.
    pub fn validate(&self, description: &str, code: &str) -> Result<Parsed<ValidationResult>> {
        info!("QA'ing the game code");

        let prompt = qa_prompt(description, code)?;
        let parsed = self.invoke(&self.qa, &prompt)?.parse::<ValidationResult>();

        match &parsed {
            Parsed::Valid(validation) => info!(
                correct = validation.correct(),
                reasoning = validation.reasoning(),
                "QA result"
            ),
            other => warn!(reason = %other.describe(), "QA agent returned no usable verdict"),
        }
        Ok(parsed)
    }

    /// Run the whole pipeline once for `description`.
    ///
    /// The artifact is cleared before anything else happens and written only
    /// when QA accepts the game. Model and filesystem errors propagate.
    pub fn run(&self, description: &str) -> Result<Outcome> {
        self.usage.set(Usage::default());
        self.enter(Stage::Start);
        self.sink.clear()?;

        self.enter(Stage::Generating);
        let generation = match self.generate(description)? {
            Parsed::Valid(generation) => generation,
            other => {
                self.enter(Stage::GenerationFailed);
                return Ok(Outcome::GenerationFailed {
                    reason: other.describe(),
                });
            }
        };
        self.enter(Stage::Generated);

        self.enter(Stage::Validating);
        let validation = match self.validate(description, generation.code())? {
            Parsed::Valid(validation) => validation,
            other => {
                self.enter(Stage::ValidationFailed);
                return Ok(Outcome::ValidationFailed {
                    generation,
                    reason: other.describe(),
                });
            }
        };
        self.enter(Stage::Validated);

        if !validation.correct() {
            self.enter(Stage::Rejected);
            return Err(QaRejected::new(generation, validation.reasoning().to_owned()).into());
        }

        self.sink.write(generation.code())?;
        self.enter(Stage::Accepted);

        Ok(Outcome::Accepted {
            generation,
            validation,
            artifact: self.sink.path().to_path_buf(),
        })
    }
}
