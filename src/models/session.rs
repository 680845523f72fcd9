use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{GenerationResult, ValidationResult};
use crate::store::atomic_write;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    Running,
    Accepted,
    GenerationFailed,
    ValidationFailed,
    Rejected,
    Errored,
}

/// Token counts reported by the model endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    #[must_use]
    pub fn add(self, other: Usage) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
        }
    }
}

/// One pass through the pipeline for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub state: RunState,
    pub started_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl RunRecord {
    pub fn start(run_id: String) -> Self {
        Self {
            run_id,
            state: RunState::Running,
            started_at: Timestamp::now(),
            finished_at: None,
            elapsed_ms: 0,
            artifact: None,
            error: None,
            usage: Usage::default(),
            generation: None,
            validation: None,
        }
    }

    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Timestamp::now());
    }
}

/// Run history for one game description, keyed by its session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

impl SessionRecord {
    pub fn new(session_id: String, description: String) -> Self {
        let now = Timestamp::now();
        Self {
            session_id,
            description,
            created_at: now,
            updated_at: now,
            runs: Vec::new(),
        }
    }

    pub fn last_run(&self) -> Option<&RunRecord> {
        self.runs.last()
    }

    /// Insert the run, replacing an earlier snapshot with the same id.
    pub fn upsert_run(&mut self, run: &RunRecord) {
        match self.runs.iter_mut().find(|r| r.run_id == run.run_id) {
            Some(existing) => *existing = run.clone(),
            None => self.runs.push(run.clone()),
        }
        self.updated_at = Timestamp::now();
    }

    pub fn file_path(&self, base: &Path) -> PathBuf {
        base.join(format!("{}.toml", self.session_id))
    }

    pub fn write_file(&self, base: &Path) -> Result<()> {
        let path = self.file_path(base);
        let content = toml::to_string(self).context("Failed to serialize session")?;
        atomic_write(&path, content.as_bytes())
    }
}
