use crate::env::{CondaResolver, EnvironmentResolver};
use crate::history::RunHistory;
use crate::process::{ProcessExit, ProcessSpawner, ProcessSpec, TokioSpawner};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use sunsetwx_core::{
    LaunchError, LaunchPlan, LaunchRecord, LaunchStatus, LauncherConfig, Result, StepKind,
    StepResult, StepStatus,
};
use tracing::{info, warn};

/// Runs the target script inside its environment, one step after another
#[derive(Clone)]
pub struct Launcher {
    plan: LaunchPlan,
    resolver: Arc<dyn EnvironmentResolver>,
    spawner: Arc<dyn ProcessSpawner>,
    history: Option<RunHistory>,
}

impl Launcher {
    pub fn new<R, S>(plan: LaunchPlan, resolver: R, spawner: S) -> Self
    where
        R: EnvironmentResolver + 'static,
        S: ProcessSpawner + 'static,
    {
        Self {
            plan,
            resolver: Arc::new(resolver),
            spawner: Arc::new(spawner),
            history: None,
        }
    }

    /// Build a launcher that resolves conda environments on this host and
    /// spawns real processes.
    pub fn from_config(config: &LauncherConfig) -> Result<Self> {
        let plan = LaunchPlan::from_config(config)?;
        let launcher = Self::new(
            plan,
            CondaResolver::discover(config.conda_root.as_deref()),
            TokioSpawner,
        );

        Ok(match &config.history_file {
            Some(path) => launcher.with_history(RunHistory::new(path)),
            None => launcher,
        })
    }

    pub fn with_history(mut self, history: RunHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    /// Execute the launch.
    ///
    /// Returns the record when the script ran, whatever its exit code. A
    /// failure before the script aborts the remaining steps and is returned
    /// as an error. The record is written to the history either way.
    pub async fn run(&self) -> Result<LaunchRecord> {
        let mut record = LaunchRecord::new(&self.plan);

        info!(
            launch_id = %record.id,
            environment = %self.plan.environment,
            script = %self.plan.script.display(),
            "Starting launch"
        );

        let outcome = self.execute_steps(&mut record).await;

        // Returning to the root happens on every exit path
        let timer = StepTimer::start(StepKind::ReturnToRoot);
        record.final_dir = self.plan.root.clone();
        record.steps.push(timer.finish(
            StepStatus::Success,
            Some(self.plan.root.display().to_string()),
        ));
        record.completed_at = Some(Utc::now());

        match &outcome {
            Ok(exit) => {
                record.exit_code = exit.exit_code();
                record.status = if exit.success() {
                    LaunchStatus::Success
                } else {
                    LaunchStatus::ScriptFailed
                };
            }
            Err(e) => {
                record.status = LaunchStatus::Aborted;
                record.exit_code = e.exit_code();
                record.error = Some(e.to_string());
                record.failure = Some(e.kind());
            }
        }

        if record.status == LaunchStatus::ScriptFailed {
            warn!(
                launch_id = %record.id,
                exit_code = record.exit_code,
                "Script exited with failure"
            );
        }
        info!(
            launch_id = %record.id,
            status = ?record.status,
            exit_code = record.exit_code,
            "Launch completed"
        );

        self.record_history(&record).await;

        outcome.map(|_| record)
    }

    async fn execute_steps(&self, record: &mut LaunchRecord) -> Result<ProcessExit> {
        // Root directory
        let timer = StepTimer::start(StepKind::EnterRoot);
        if let Err(e) = require_dir(&self.plan.root) {
            return Err(fail_step(record, timer, e));
        }
        record.steps.push(timer.finish(
            StepStatus::Success,
            Some(self.plan.root.display().to_string()),
        ));

        // Project directory and the script inside it
        let timer = StepTimer::start(StepKind::EnterProjectDir);
        if let Err(e) =
            require_dir(&self.plan.script_dir).and_then(|_| require_file(&self.plan.script))
        {
            return Err(fail_step(record, timer, e));
        }
        record.steps.push(timer.finish(
            StepStatus::Success,
            Some(self.plan.script_dir.display().to_string()),
        ));

        // Environment
        let timer = StepTimer::start(StepKind::ActivateEnvironment);
        let environment = match self.resolver.resolve(&self.plan.environment) {
            Ok(environment) => environment,
            Err(e) => return Err(fail_step(record, timer, e)),
        };
        record.steps.push(timer.finish(
            StepStatus::Success,
            Some(environment.interpreter.display().to_string()),
        ));

        // Script
        let timer = StepTimer::start(StepKind::RunScript);
        let spec = ProcessSpec {
            program: environment.interpreter.clone(),
            args: vec![self.plan.script.clone().into_os_string()],
            working_directory: self.plan.script_dir.clone(),
            env: environment.extra_env.clone(),
        };

        info!(
            launch_id = %record.id,
            interpreter = %spec.program.display(),
            "Running script"
        );

        let exit = match self.spawner.run(&spec).await {
            Ok(exit) => exit,
            Err(e) => return Err(fail_step(record, timer, e)),
        };

        let status = if exit.success() {
            StepStatus::Success
        } else {
            StepStatus::Failed
        };
        record.steps.push(timer.finish(
            status,
            Some(format!("exit code {}", exit.exit_code())),
        ));

        Ok(exit)
    }

    async fn record_history(&self, record: &LaunchRecord) {
        if let Some(history) = &self.history {
            if let Err(e) = history.append(record).await {
                warn!(
                    path = %history.path().display(),
                    error = %e,
                    "Failed to write launch history"
                );
            }
        }
    }
}

struct StepTimer {
    step: StepKind,
    started_at: DateTime<Utc>,
    instant: Instant,
}

impl StepTimer {
    fn start(step: StepKind) -> Self {
        Self {
            step,
            started_at: Utc::now(),
            instant: Instant::now(),
        }
    }

    fn finish(self, status: StepStatus, detail: Option<String>) -> StepResult {
        StepResult {
            step: self.step,
            status,
            detail,
            duration_ms: self.instant.elapsed().as_millis() as u64,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}

/// Record a failed step, mark the steps it prevents as skipped, and hand
/// the error back.
fn fail_step(record: &mut LaunchRecord, timer: StepTimer, err: LaunchError) -> LaunchError {
    let failed = timer.step;

    warn!(
        launch_id = %record.id,
        step = failed.name(),
        error = %err,
        "Launch step failed"
    );

    record
        .steps
        .push(timer.finish(StepStatus::Failed, Some(err.to_string())));

    let skipped = StepKind::ALL
        .iter()
        .skip_while(|s| **s != failed)
        .skip(1)
        .filter(|s| **s != StepKind::ReturnToRoot);
    for step in skipped {
        record
            .steps
            .push(StepTimer::start(*step).finish(StepStatus::Skipped, None));
    }

    err
}

fn require_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(LaunchError::DirectoryNotFound(path.to_path_buf()))
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(LaunchError::ScriptNotFound(path.to_path_buf()))
    }
}
