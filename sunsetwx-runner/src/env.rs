use std::ffi::OsString;
use std::path::{Path, PathBuf};
use sunsetwx_core::{LaunchError, Result};
use tracing::{debug, warn};

/// Conda installs looked up under the user's home directory
const HOME_INSTALLS: &[&str] = &["miniconda3", "anaconda3", "miniforge3", "mambaforge"];

const SYSTEM_INSTALLS: &[&str] = &["/opt/conda", "/opt/miniconda3"];

/// A named environment resolved to its interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEnvironment {
    pub name: String,
    pub prefix: PathBuf,
    pub interpreter: PathBuf,
    /// Variables `conda activate` would have exported
    pub extra_env: Vec<(String, String)>,
}

/// Resolves a runtime environment name to the interpreter that runs inside it.
pub trait EnvironmentResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<ResolvedEnvironment>;
}

/// Finds environments inside conda installations, searched in order.
#[derive(Debug, Clone, Default)]
pub struct CondaResolver {
    roots: Vec<PathBuf>,
}

impl CondaResolver {
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        let mut unique: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !unique.contains(&root) {
                unique.push(root);
            }
        }
        Self { roots: unique }
    }

    /// Discover conda installations on this host.
    ///
    /// Search order: the configured root, `CONDA_EXE`, `CONDA_PREFIX`,
    /// `conda` on `PATH`, then well-known install locations.
    pub fn discover(configured: Option<&Path>) -> Self {
        Self::discover_with(configured, |key| std::env::var_os(key))
    }

    pub fn discover_with<F>(configured: Option<&Path>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut found = Vec::new();

        if let Some(root) = lookup("CONDA_EXE")
            .map(PathBuf::from)
            .and_then(|exe| root_from_executable(&exe))
        {
            found.push(root);
        }

        if let Some(prefix) = lookup("CONDA_PREFIX") {
            found.push(root_from_prefix(Path::new(&prefix)));
        }

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        if let Some(root) = which::which_in("conda", lookup("PATH"), cwd)
            .ok()
            .and_then(|exe| root_from_executable(&exe))
        {
            found.push(root);
        }

        if let Some(home) = lookup("HOME").map(PathBuf::from) {
            found.extend(HOME_INSTALLS.iter().map(|name| home.join(name)));
        }
        found.extend(SYSTEM_INSTALLS.iter().map(PathBuf::from));

        // A configured root is kept even when missing so errors count it
        let roots = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(found.into_iter().filter(|root| root.is_dir()))
            .collect();
        let resolver = Self::with_roots(roots);

        debug!(roots = ?resolver.roots, "Discovered conda installations");
        resolver
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidate_prefixes(&self, name: &str) -> Vec<PathBuf> {
        let as_path = Path::new(name);
        if as_path.is_absolute() {
            return vec![as_path.to_path_buf()];
        }

        self.roots
            .iter()
            .map(|root| {
                if name == "base" {
                    root.clone()
                } else {
                    root.join("envs").join(name)
                }
            })
            .collect()
    }
}

impl EnvironmentResolver for CondaResolver {
    fn resolve(&self, name: &str) -> Result<ResolvedEnvironment> {
        let candidates = self.candidate_prefixes(name);

        for prefix in &candidates {
            let interpreter = interpreter_path(prefix);
            if is_executable(&interpreter) {
                debug!(
                    environment = %name,
                    interpreter = %interpreter.display(),
                    "Resolved environment"
                );
                return Ok(ResolvedEnvironment {
                    name: name.to_string(),
                    prefix: prefix.clone(),
                    interpreter,
                    extra_env: activation_env(name, prefix),
                });
            }
            debug!(prefix = %prefix.display(), "No interpreter under prefix");
        }

        Err(LaunchError::EnvironmentNotFound {
            name: name.to_string(),
            searched: candidates.len(),
        })
    }
}

/// Installation root for a conda executable in `<root>/bin` or `<root>/condabin`.
/// Symlinks are followed, so a `conda` linked into `/usr/local/bin` still
/// maps to its install.
pub fn root_from_executable(exe: &Path) -> Option<PathBuf> {
    let exe = exe.canonicalize().unwrap_or_else(|_| exe.to_path_buf());
    exe.parent()?.parent().map(Path::to_path_buf)
}

/// Installation root for an active prefix, which is either the root itself
/// or `<root>/envs/<name>`.
pub fn root_from_prefix(prefix: &Path) -> PathBuf {
    match prefix.parent() {
        Some(parent) if parent.file_name().map(|n| n == "envs").unwrap_or(false) => parent
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| prefix.to_path_buf()),
        _ => prefix.to_path_buf(),
    }
}

#[cfg(not(windows))]
fn interpreter_path(prefix: &Path) -> PathBuf {
    prefix.join("bin").join("python")
}

#[cfg(windows)]
fn interpreter_path(prefix: &Path) -> PathBuf {
    prefix.join("python.exe")
}

#[cfg(not(windows))]
fn bin_dirs(prefix: &Path) -> Vec<PathBuf> {
    vec![prefix.join("bin")]
}

#[cfg(windows)]
fn bin_dirs(prefix: &Path) -> Vec<PathBuf> {
    vec![
        prefix.to_path_buf(),
        prefix.join("Library").join("bin"),
        prefix.join("Scripts"),
    ]
}

fn activation_env(name: &str, prefix: &Path) -> Vec<(String, String)> {
    let mut env = vec![
        (
            "CONDA_PREFIX".to_string(),
            prefix.to_string_lossy().to_string(),
        ),
        ("CONDA_DEFAULT_ENV".to_string(), name.to_string()),
    ];

    let mut paths = bin_dirs(prefix);
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    match std::env::join_paths(paths) {
        Ok(joined) => env.push(("PATH".to_string(), joined.to_string_lossy().to_string())),
        Err(e) => warn!(
            prefix = %prefix.display(),
            error = %e,
            "Could not prepend environment to PATH"
        ),
    }

    env
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
