use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use xsect_core::batch::BatchEvent;
use xsect_core::config::{EXECUTABLE_ENV_VAR, RunConfig};
use xsect_core::domain::{XsectError, XsectResult};
use xsect_core::launcher::resolve_executable;

#[derive(Debug, Default)]
pub(super) struct ConfigOverrides {
    pub(super) host: Option<String>,
    pub(super) port: Option<u16>,
    pub(super) password: Option<String>,
}

pub(super) fn load_run_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> XsectResult<RunConfig> {
    let mut config = match path {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };

    if let Some(host) = overrides.host {
        config.host = host;
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(password) = overrides.password {
        config.password = password;
    }

    config.validate()?;
    Ok(config)
}

pub(super) fn resolve_application_executable(
    explicit: Option<&Path>,
    config: &RunConfig,
) -> XsectResult<PathBuf> {
    let from_env = std::env::var_os(EXECUTABLE_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    let executable = resolve_executable(
        explicit,
        from_env.as_deref(),
        &config.executable_candidates,
    )
    .map_err(XsectError::from)?;
    info!(executable = %executable.display(), "resolved application executable");
    Ok(executable)
}

pub(super) fn wait_for_startup(seconds: u64) {
    if seconds == 0 {
        return;
    }
    info!(seconds, "waiting for the scripting servers to start");
    std::thread::sleep(Duration::from_secs(seconds));
}

/// Prints one line per model as the batch advances.
pub(super) fn print_progress(event: BatchEvent<'_>) {
    match event {
        BatchEvent::Started { model } => println!("Processing file: {}", model.display()),
        BatchEvent::Extracted { .. } => {}
        BatchEvent::Failed { model, message } => {
            eprintln!("Error processing {}: {}", model.display(), message);
        }
        BatchEvent::SkippedDirectory { path, message } => {
            eprintln!("Skipping unreadable directory {}: {}", path.display(), message);
        }
    }
}

pub(super) fn print_run_summary(summary: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout).context("failed to write run summary")?;
    writeln!(stdout, "{summary}").context("failed to write run summary")?;
    Ok(())
}

pub(super) fn print_line(line: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").with_context(|| format!("failed to write '{line}'"))
}
