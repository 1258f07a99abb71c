//! In-memory fakes for tests.
//!
//! [`RecordingRunner`] stands in for [`TokioCommandRunner`] so builds can be
//! exercised without npm, yarn, or pnpm on the machine.
//!
//! [`TokioCommandRunner`]: crate::installer::TokioCommandRunner

use crate::error::BuildResult;
use crate::installer::{CommandRunner, ExecContext, InstallStep, StepOutput};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Scripted {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// Runner that records every step and answers from a script.
///
/// Commands without a scripted response succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<(InstallStep, ExecContext)>>,
    responses: Mutex<HashMap<String, Scripted>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for a command, matched on its display string
    /// (`"npm --version"`).
    pub fn respond(&self, command: &str, exit_code: i32, stdout: &str) -> &Self {
        self.responses.lock().unwrap().insert(
            command.to_string(),
            Scripted {
                exit_code,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    /// Script a failing command with the given stderr.
    pub fn fail(&self, command: &str, exit_code: i32, stderr: &str) -> &Self {
        self.responses.lock().unwrap().insert(
            command.to_string(),
            Scripted {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// Every step run so far, in order.
    pub fn steps(&self) -> Vec<InstallStep> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(step, _)| step.clone())
            .collect()
    }

    /// Display strings of every command run so far.
    pub fn commands(&self) -> Vec<String> {
        self.steps().iter().map(InstallStep::display).collect()
    }

    /// Contexts the steps ran in.
    pub fn contexts(&self) -> Vec<ExecContext> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, ctx)| ctx.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, step: &InstallStep, ctx: &ExecContext) -> BuildResult<StepOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((step.clone(), ctx.clone()));

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get(&step.display())
            .cloned()
            .unwrap_or(Scripted {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            });

        Ok(StepOutput {
            step_name: step.name.clone(),
            exit_code: scripted.exit_code,
            stdout: scripted.stdout,
            stderr: scripted.stderr,
            duration_ms: 0,
            success: scripted.exit_code == 0,
        })
    }
}
