use crate::error::{LaunchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_VAR: &str = "SUNSETWX_LAUNCH_CONFIG";
pub const ROOT_VAR: &str = "SUNSETWX_ROOT";
pub const PROJECT_DIR_VAR: &str = "SUNSETWX_PROJECT_DIR";
pub const ENVIRONMENT_VAR: &str = "SUNSETWX_ENV";
pub const SCRIPT_VAR: &str = "SUNSETWX_SCRIPT";
pub const CONDA_ROOT_VAR: &str = "SUNSETWX_CONDA_ROOT";
pub const HISTORY_VAR: &str = "SUNSETWX_HISTORY";

pub const DEFAULT_PROJECT_DIR: &str = "SunsetWxBot";
pub const DEFAULT_ENVIRONMENT: &str = "sunsetwx";
pub const DEFAULT_SCRIPT: &str = "tweet_updates.py";

/// Launcher configuration. Every field has a default, so an empty
/// environment reproduces the fixed launch of the bot.
///
/// Behaviour is only fixed while none of the `SUNSETWX_*` variables above
/// is set. Any of them, or a TOML file named by `SUNSETWX_LAUNCH_CONFIG`,
/// changes the directories, environment or script the launcher uses, and
/// that includes variables inherited from the caller's shell or a crontab.
/// Nothing else in the environment is read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    pub root_dir: PathBuf,
    pub project_dir: PathBuf,
    pub environment: String,
    pub script: String,
    pub conda_root: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            root_dir: home_dir(),
            project_dir: PathBuf::from(DEFAULT_PROJECT_DIR),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            script: DEFAULT_SCRIPT.to_string(),
            conda_root: None,
            history_file: None,
        }
    }
}

impl LauncherConfig {
    /// Load from the process environment: optional TOML file first, then
    /// `SUNSETWX_*` overrides.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = match get(CONFIG_FILE_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(root) = get(ROOT_VAR) {
            config.root_dir = PathBuf::from(root);
        }
        if let Some(project_dir) = get(PROJECT_DIR_VAR) {
            config.project_dir = PathBuf::from(project_dir);
        }
        if let Some(environment) = get(ENVIRONMENT_VAR) {
            config.environment = environment;
        }
        if let Some(script) = get(SCRIPT_VAR) {
            config.script = script;
        }
        if let Some(conda_root) = get(CONDA_ROOT_VAR) {
            config.conda_root = Some(PathBuf::from(conda_root));
        }
        if let Some(history) = get(HISTORY_VAR) {
            config.history_file = Some(PathBuf::from(history));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LaunchError::InvalidConfiguration(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LaunchError::InvalidConfiguration(format!("Parse error: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.is_absolute() {
            return Err(LaunchError::InvalidConfiguration(format!(
                "root_dir must be absolute, got {}",
                self.root_dir.display()
            )));
        }
        if self.environment.trim().is_empty() {
            return Err(LaunchError::InvalidConfiguration(
                "environment must not be empty".to_string(),
            ));
        }
        if self.script.trim().is_empty() {
            return Err(LaunchError::InvalidConfiguration(
                "script must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_bot_layout() {
        let config = LauncherConfig::default();
        assert_eq!(config.project_dir, PathBuf::from("SunsetWxBot"));
        assert_eq!(config.environment, "sunsetwx");
        assert_eq!(config.script, "tweet_updates.py");
        assert!(config.root_dir.is_absolute());
        assert!(config.conda_root.is_none());
        assert!(config.history_file.is_none());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = LauncherConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, LauncherConfig::default());
    }

    #[test]
    fn test_unrelated_variables_use_defaults() {
        let config = LauncherConfig::from_lookup(lookup_from(&[
            ("CONDA_DEFAULT_ENV", "base"),
            ("SUNSETWX", "/elsewhere"),
            ("SUNSETWX_ROOTS", "/elsewhere"),
        ]))
        .unwrap();
        assert_eq!(config, LauncherConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = LauncherConfig::from_lookup(lookup_from(&[
            (ROOT_VAR, "/srv"),
            (PROJECT_DIR_VAR, "bots/dmv"),
            (ENVIRONMENT_VAR, "covid"),
            (SCRIPT_VAR, "tweet_maps.py"),
            (CONDA_ROOT_VAR, "/opt/conda"),
            (HISTORY_VAR, "/var/log/launch.jsonl"),
        ]))
        .unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/srv"));
        assert_eq!(config.project_dir, PathBuf::from("bots/dmv"));
        assert_eq!(config.environment, "covid");
        assert_eq!(config.script, "tweet_maps.py");
        assert_eq!(config.conda_root, Some(PathBuf::from("/opt/conda")));
        assert_eq!(
            config.history_file,
            Some(PathBuf::from("/var/log/launch.jsonl"))
        );
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let config =
            LauncherConfig::from_lookup(lookup_from(&[(ENVIRONMENT_VAR, "  ")])).unwrap();
        assert_eq!(config.environment, "sunsetwx");
    }

    #[test]
    fn test_parse_toml() {
        let config = LauncherConfig::from_toml(
            r#"
root_dir = "/home/pi"
environment = "sunsetwx-py38"
history_file = "/home/pi/launch.jsonl"
"#,
        )
        .unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/home/pi"));
        assert_eq!(config.environment, "sunsetwx-py38");
        assert_eq!(config.script, "tweet_updates.py");
        assert_eq!(
            config.history_file,
            Some(PathBuf::from("/home/pi/launch.jsonl"))
        );
    }

    #[test]
    fn test_parse_toml_rejects_unknown_field() {
        assert!(LauncherConfig::from_toml("retries = 3").is_err());
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launch.toml");
        std::fs::write(
            &path,
            "root_dir = \"/home/pi\"\nenvironment = \"from-file\"\n",
        )
        .unwrap();

        let config = LauncherConfig::from_lookup(lookup_from(&[
            (CONFIG_FILE_VAR, path.to_str().unwrap()),
            (ENVIRONMENT_VAR, "from-env"),
        ]))
        .unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/home/pi"));
        assert_eq!(config.environment, "from-env");
    }

    #[test]
    fn test_missing_config_file() {
        let err = LauncherConfig::from_lookup(lookup_from(&[(
            CONFIG_FILE_VAR,
            "/nonexistent/launch.toml",
        )]))
        .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_validate_relative_root() {
        let err = LauncherConfig::from_lookup(lookup_from(&[(ROOT_VAR, "not/absolute")]))
            .unwrap_err();
        assert!(err.to_string().contains("root_dir must be absolute"));
    }
}
