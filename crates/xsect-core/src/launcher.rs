//! Application process lifecycle.

use crate::domain::XsectError;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// Picks the first usable executable.
///
/// An explicit path or environment value is taken as authoritative and must
/// exist; the candidate list is searched in order for the first existing file.
pub fn resolve_executable(
    explicit: Option<&Path>,
    env_value: Option<&Path>,
    candidates: &[PathBuf],
) -> Result<PathBuf, LaunchError> {
    for (source, path) in [("--executable", explicit), ("environment", env_value)] {
        if let Some(path) = path {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(LaunchError::ExecutableMissing {
                source_name: source,
                path: path.to_path_buf(),
            });
        }
    }

    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .cloned()
        .ok_or_else(|| LaunchError::NoCandidate {
            searched: candidates.to_vec(),
        })
}

pub fn launch_arguments(port: u16, password: &str) -> [String; 2] {
    [
        format!("--AppServerPort={port}"),
        format!("--AppServerPassword={password}"),
    ]
}

/// A spawned application; killed when dropped unless already terminated.
#[derive(Debug)]
pub struct ApplicationProcess {
    executable: PathBuf,
    child: Option<Child>,
}

impl ApplicationProcess {
    pub fn spawn(executable: &Path, port: u16, password: &str) -> Result<Self, LaunchError> {
        let mut command = Command::new(executable);
        command
            .args(launch_arguments(port, password))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            path: executable.to_path_buf(),
            source,
        })?;
        info!(
            executable = %executable.display(),
            pid = child.id(),
            port,
            "application started"
        );
        Ok(Self {
            executable: executable.to_path_buf(),
            child: Some(child),
        })
    }

    /// Best-effort shutdown; failures are logged, never returned.
    pub fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "application already exited");
                return;
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "failed to poll application process"),
        }
        if let Err(error) = child.kill() {
            warn!(
                executable = %self.executable.display(),
                %error,
                "failed to terminate application"
            );
            return;
        }
        match child.wait() {
            Ok(status) => info!(%status, "application terminated"),
            Err(error) => warn!(%error, "failed to reap application process"),
        }
    }
}

impl Drop for ApplicationProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("executable from {source_name} does not exist: '{}'", .path.display())]
    ExecutableMissing {
        source_name: &'static str,
        path: PathBuf,
    },
    #[error(
        "no application executable found; searched {} candidate path(s), set --executable or the environment variable",
        .searched.len()
    )]
    NoCandidate { searched: Vec<PathBuf> },
    #[error("failed to start application '{}': {source}", .path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<LaunchError> for XsectError {
    fn from(error: LaunchError) -> Self {
        let message = error.to_string();
        match error {
            LaunchError::ExecutableMissing { .. } | LaunchError::NoCandidate { .. } => {
                XsectError::input_validation("INPUT.EXECUTABLE", message)
            }
            LaunchError::Spawn { .. } => XsectError::io_system("IO.LAUNCH", message),
        }
    }
}
