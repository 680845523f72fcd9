use std::path::Path;

use anyhow::Result;
use console::{Term, style};
use serde::Serialize;

use crate::agent::Role;
use crate::commands::generate::GenerateReport;
use crate::commands::history::HistoryResult;
use crate::models::{RunRecord, RunState, SessionRecord};

pub struct Output {
    term: Term,
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self {
            term: Term::stdout(),
            json,
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let output = serde_json::to_string_pretty(value)?;
        self.term.write_line(&output)?;
        Ok(())
    }

    fn state_label(state: RunState) -> String {
        let label = style(state.as_ref());
        let label = match state {
            RunState::Accepted => label.green(),
            RunState::Running => label.yellow(),
            RunState::GenerationFailed | RunState::ValidationFailed => label.yellow().dim(),
            RunState::Rejected | RunState::Errored => label.red(),
        };
        label.to_string()
    }

    pub fn generated(&self, report: &GenerateReport) -> Result<()> {
        if self.json {
            return self.print_json(report);
        }

        self.term.write_line(&format!(
            "{} {}",
            style("Session:").dim(),
            style(&report.session_id).cyan()
        ))?;
        self.term.write_line(&format!(
            "{} {} [{}]",
            style("Run:").dim(),
            style(&report.run.run_id).cyan().bold(),
            Self::state_label(report.run.state)
        ))?;
        if let Some(artifact) = &report.run.artifact {
            self.term
                .write_line(&format!("{} {artifact}", style("Game:").green()))?;
        }
        self.term.write_line("")?;
        self.term.write_line(&report.message)?;
        Ok(())
    }

    pub fn history(&self, result: &HistoryResult) -> Result<()> {
        match result {
            HistoryResult::Sessions(sessions) => self.sessions(sessions),
            HistoryResult::Session(session) => self.session(session),
        }
    }

    fn sessions(&self, sessions: &[SessionRecord]) -> Result<()> {
        if self.json {
            return self.print_json(sessions);
        }

        if sessions.is_empty() {
            self.term.write_line("No sessions found.")?;
            return Ok(());
        }

        for session in sessions {
            let last = session
                .last_run()
                .map(|run| Self::state_label(run.state))
                .unwrap_or_default();
            self.term.write_line(&format!(
                "{} [{}]",
                style(&session.session_id).cyan().bold(),
                last
            ))?;
            self.term
                .write_line(&format!("  Description: {}", session.description))?;
            self.term.write_line(&format!(
                "  Runs: {}  Updated: {}",
                session.runs.len(),
                style(&session.updated_at).dim()
            ))?;
            self.term.write_line("")?;
        }
        Ok(())
    }

    fn session(&self, session: &SessionRecord) -> Result<()> {
        if self.json {
            return self.print_json(session);
        }

        self.term.write_line(&format!(
            "Session: {}",
            style(&session.session_id).cyan().bold()
        ))?;
        self.term
            .write_line(&format!("  Description: {}", session.description))?;
        self.term
            .write_line(&format!("  Created: {}", session.created_at))?;
        self.term.write_line("")?;

        if session.runs.is_empty() {
            self.term.write_line("No runs recorded.")?;
            return Ok(());
        }

        self.term.write_line(&style("Runs:").bold().to_string())?;
        for run in &session.runs {
            self.print_run(run)?;
        }
        Ok(())
    }

    fn print_run(&self, run: &RunRecord) -> Result<()> {
        self.term.write_line(&format!(
            "  {} [{}] {}",
            style(&run.run_id).cyan(),
            Self::state_label(run.state),
            style(&run.started_at).dim()
        ))?;
        self.term.write_line(&format!(
            "    Tokens: {}  Elapsed: {}ms",
            run.usage.total(),
            run.elapsed_ms
        ))?;
        if let Some(validation) = &run.validation {
            self.term
                .write_line(&format!("    QA: {}", validation.reasoning()))?;
        }
        if let Some(artifact) = &run.artifact {
            self.term.write_line(&format!("    Game: {artifact}"))?;
        }
        if let Some(error) = &run.error {
            let first_line = error.lines().next().unwrap_or_default();
            self.term
                .write_line(&format!("    Error: {}", style(first_line).red()))?;
        }
        Ok(())
    }

    pub fn roles(&self, roles: &[Role]) -> Result<()> {
        if self.json {
            return self.print_json(roles);
        }

        for role in roles {
            self.term
                .write_line(&style(role.name()).cyan().bold().to_string())?;
            self.term
                .write_line(&format!("  Description: {}", role.description()))?;
            self.term.write_line("  Instructions:")?;
            for instruction in role.instructions() {
                self.term.write_line(&format!("    - {instruction}"))?;
            }
            self.term
                .write_line(&format!("  Output: {}", role.output_name()))?;
            self.term.write_line("")?;
        }
        Ok(())
    }

    pub fn config_written(&self, path: &Path, created: bool) -> Result<()> {
        if created {
            self.term.write_line(&format!(
                "{} {}",
                style("Wrote config:").green(),
                path.display()
            ))?;
        } else {
            self.term
                .write_line(&format!("Config already exists at {}", path.display()))?;
        }
        Ok(())
    }
}
