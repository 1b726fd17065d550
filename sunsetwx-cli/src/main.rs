use anyhow::Context;
use clap::Parser;
use std::ffi::OsString;
use std::io::IsTerminal;
use std::process;
use sunsetwx_core::{LaunchError, LauncherConfig};
use sunsetwx_runner::Launcher;
use tracing::{debug, error};

/// Run the SunsetWx bot inside its conda environment.
///
/// Takes no arguments. Anything passed on the command line is ignored.
#[derive(Parser, Debug, Default)]
#[command(name = "sunsetwx-launch")]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    ignored: Vec<OsString>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi(&std::io::stderr()))
        .init();

    let cli = Cli::try_parse().unwrap_or_default();
    if !cli.ignored.is_empty() {
        debug!(count = cli.ignored.len(), "Ignoring command-line arguments");
    }

    let code = match launch().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            exit_code_for(&e)
        }
    };

    process::exit(code);
}

async fn launch() -> anyhow::Result<i32> {
    let config = LauncherConfig::load().context("Failed to load launcher configuration")?;
    let launcher = Launcher::from_config(&config)?;
    let record = launcher.run().await?;
    Ok(record.exit_code)
}

/// Colour codes only on a terminal, so cron mail and redirected logs get
/// plain text.
fn use_ansi<W: IsTerminal>(stream: &W) -> bool {
    stream.is_terminal()
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<LaunchError>()
        .map(LaunchError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::path::PathBuf;

    #[test]
    fn test_cli_no_arguments() {
        let cli = Cli::try_parse_from(["sunsetwx-launch"]).unwrap();
        assert!(cli.ignored.is_empty());
    }

    #[test]
    fn test_cli_ignores_any_arguments() {
        let cli = Cli::try_parse_from(["sunsetwx-launch", "now", "--force", "-v"]).unwrap();
        assert_eq!(cli.ignored.len(), 3);
    }

    #[test]
    fn test_cli_help_and_version_are_not_flags() {
        // Whatever clap makes of these, it must never print help or version
        if let Err(e) = Cli::try_parse_from(["sunsetwx-launch", "--help"]) {
            assert_ne!(e.kind(), ErrorKind::DisplayHelp);
        }
        if let Err(e) = Cli::try_parse_from(["sunsetwx-launch", "-V"]) {
            assert_ne!(e.kind(), ErrorKind::DisplayVersion);
        }
    }

    #[test]
    fn test_no_ansi_when_redirected_to_file() {
        let log = tempfile::tempfile().unwrap();
        assert!(!use_ansi(&log));
    }

    #[test]
    fn test_exit_code_for_launch_error_with_context() {
        let err = anyhow::Error::new(LaunchError::DirectoryNotFound(PathBuf::from("/gone")))
            .context("launch");
        assert_eq!(exit_code_for(&err), 66);
    }

    #[test]
    fn test_exit_code_for_other_error() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), 1);
    }
}
