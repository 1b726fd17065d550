use crate::config::LauncherConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Absolute paths for one launch, computed once from the configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchPlan {
    pub root: PathBuf,
    pub script_dir: PathBuf,
    pub script: PathBuf,
    pub environment: String,
}

impl LaunchPlan {
    pub fn from_config(config: &LauncherConfig) -> crate::Result<Self> {
        config.validate()?;

        let root = config.root_dir.clone();
        let script_dir = root.join(&config.project_dir);
        let script = script_dir.join(&config.script);

        Ok(Self {
            root,
            script_dir,
            script,
            environment: config.environment.clone(),
        })
    }
}

/// The launcher's steps, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StepKind {
    EnterRoot,
    EnterProjectDir,
    ActivateEnvironment,
    RunScript,
    ReturnToRoot,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::EnterRoot,
        StepKind::EnterProjectDir,
        StepKind::ActivateEnvironment,
        StepKind::RunScript,
        StepKind::ReturnToRoot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StepKind::EnterRoot => "enter_root",
            StepKind::EnterProjectDir => "enter_project_dir",
            StepKind::ActivateEnvironment => "activate_environment",
            StepKind::RunScript => "run_script",
            StepKind::ReturnToRoot => "return_to_root",
        }
    }
}

/// Execution status of a step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Result of step execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: StepKind,
    pub status: StepStatus,
    pub detail: Option<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Overall status of a launch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LaunchStatus {
    Success,
    /// The script ran and exited non-zero
    ScriptFailed,
    /// A step before the script failed
    Aborted,
}

/// Which class of failure aborted a launch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureKind {
    Navigation,
    Environment,
    Execution,
    Configuration,
    Io,
}

impl FailureKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureKind::Navigation => 66,
            FailureKind::Environment => 69,
            FailureKind::Io => 74,
            FailureKind::Configuration => 78,
            FailureKind::Execution => 126,
        }
    }
}

/// Complete launch record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub id: Uuid,
    pub environment: String,
    pub script: PathBuf,
    pub status: LaunchStatus,
    pub steps: Vec<StepResult>,
    pub exit_code: i32,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub final_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LaunchRecord {
    pub fn new(plan: &LaunchPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            environment: plan.environment.clone(),
            script: plan.script.clone(),
            status: LaunchStatus::Aborted,
            steps: Vec::new(),
            exit_code: 0,
            error: None,
            failure: None,
            final_dir: plan.root.clone(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == kind)
    }

    pub fn ran_script(&self) -> bool {
        self.step(StepKind::RunScript)
            .map(|s| s.status != StepStatus::Skipped)
            .unwrap_or(false)
    }
}
