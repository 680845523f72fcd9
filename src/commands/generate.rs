use std::time::Instant;

use anyhow::Result;
use console::{Term, style};
use serde::Serialize;
use tracing::{info, warn};

use crate::agent::Model;
use crate::error::QaRejected;
use crate::id::generate_id;
use crate::models::{RunRecord, RunState, ValidationResult};
use crate::pipeline::{Outcome, Pipeline};
use crate::store::{SessionStore, session_key};

/// A finished run that did not end in an error.
#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub session_id: String,
    pub message: String,
    pub run: RunRecord,
    #[serde(skip)]
    pub outcome: Outcome,
}

/// Ask for a description on the terminal, falling back to `default`.
pub fn prompt_description(default: &str) -> Result<String> {
    let term = Term::stderr();
    term.write_line(
        &style("Describe the game you want to make (keep it simple)")
            .bold()
            .to_string(),
    )?;
    term.write_line(&format!("{}", style(format!("[default: {default}]")).dim()))?;

    let line = term.read_line()?;
    let line = line.trim();
    Ok(if line.is_empty() {
        default.to_owned()
    } else {
        line.to_owned()
    })
}

fn apply_outcome(run: &mut RunRecord, outcome: &Outcome) {
    match outcome {
        Outcome::Accepted {
            generation,
            validation,
            artifact,
        } => {
            run.generation = Some(generation.clone());
            run.validation = Some(validation.clone());
            run.artifact = Some(artifact.display().to_string());
        }
        Outcome::GenerationFailed { reason } => run.error = Some(reason.clone()),
        Outcome::ValidationFailed { generation, reason } => {
            run.generation = Some(generation.clone());
            run.error = Some(reason.clone());
        }
    }
    run.finish(outcome.state());
}

fn apply_error(run: &mut RunRecord, err: &anyhow::Error) {
    if let Some(rejected) = err.downcast_ref::<QaRejected>() {
        run.generation = Some(rejected.generation().clone());
        run.validation = Some(ValidationResult::new(
            rejected.reasoning().to_owned(),
            false,
        ));
        run.error = Some(err.to_string());
        run.finish(RunState::Rejected);
    } else {
        run.error = Some(format!("{err:#}"));
        run.finish(RunState::Errored);
    }
}

/// Run the pipeline once and record the run in the description's session.
///
/// The run is recorded as `running` before the pipeline starts and updated
/// with its terminal state afterwards, rejected and errored runs included.
pub fn run<M: Model>(
    description: &str,
    pipeline: &Pipeline<M>,
    store: &mut SessionStore,
) -> Result<GenerateReport> {
    let session_id = session_key(description);
    let mut run = RunRecord::start(generate_id());
    store.record_run(&session_id, description, &run)?;
    info!(session = %session_id, run = %run.run_id, "Starting run");

    let started = Instant::now();
    let result = pipeline.run(description);
    run.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    run.usage = pipeline.usage();

    match &result {
        Ok(outcome) => apply_outcome(&mut run, outcome),
        Err(err) => apply_error(&mut run, err),
    }

    if let Err(store_err) = store.record_run(&session_id, description, &run) {
        if result.is_ok() {
            return Err(store_err);
        }
        warn!(error = %store_err, "Failed to record run");
    }

    let outcome = result?;
    info!(session = %session_id, run = %run.run_id, state = run.state.as_ref(), "Run finished");

    Ok(GenerateReport {
        session_id,
        message: outcome.message().to_owned(),
        run,
        outcome,
    })
}
