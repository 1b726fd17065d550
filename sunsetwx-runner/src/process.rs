use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use sunsetwx_core::{LaunchError, Result};
use tokio::process::Command;
use tracing::debug;

/// Everything needed to start one child process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_directory: PathBuf,
    pub env: Vec<(String, String)>,
}

/// How a child process finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code to report to our own caller. A child killed by a signal
    /// maps to `128 + signal` like a shell does.
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        }
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Starts a process and waits for it to finish.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessExit>;
}

/// Spawns real child processes with inherited stdio.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner;

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessExit> {
        debug!(
            program = %spec.program.display(),
            cwd = %spec.working_directory.display(),
            "Spawning process"
        );

        let status = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_directory)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| LaunchError::SpawnFailed {
                program: spec.program.clone(),
                source,
            })?;

        Ok(ProcessExit::from(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_passthrough() {
        for code in [0, 1, 2, 42, 255] {
            assert_eq!(ProcessExit::from_code(code).exit_code(), code);
        }
        assert!(ProcessExit::from_code(0).success());
        assert!(!ProcessExit::from_code(3).success());
    }

    #[test]
    fn test_signal_exit_code() {
        let exit = ProcessExit {
            code: None,
            signal: Some(15),
        };
        assert_eq!(exit.exit_code(), 143);
        assert!(!exit.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawner_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), "exit 7".into()],
            working_directory: dir.path().to_path_buf(),
            env: vec![],
        };

        let exit = TokioSpawner.run(&spec).await.unwrap();
        assert_eq!(exit.code, Some(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawner_uses_working_directory_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), "echo \"$LAUNCH_MARK\" > marker.txt".into()],
            working_directory: dir.path().to_path_buf(),
            env: vec![("LAUNCH_MARK".to_string(), "sunset".to_string())],
        };

        let exit = TokioSpawner.run(&spec).await.unwrap();
        assert!(exit.success());

        let content = std::fs::read_to_string(dir.path().join("marker.txt")).unwrap();
        assert_eq!(content.trim(), "sunset");
    }

    #[tokio::test]
    async fn test_spawner_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec {
            program: dir.path().join("no-such-python"),
            args: vec![],
            working_directory: dir.path().to_path_buf(),
            env: vec![],
        };

        let err = TokioSpawner.run(&spec).await.unwrap_err();
        assert!(matches!(err, LaunchError::SpawnFailed { .. }));
    }
}
