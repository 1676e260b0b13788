//! Starts the media center process alongside the client.
//!
//! The client keeps the child handle but never blocks on it.  On exit the
//! child is reaped if it has already ended and left running otherwise.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable the media center reads its home directory from.
pub const HOME_ENV: &str = "XBMC_HOME";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Builds the command for `path`, exporting `home` as `XBMC_HOME` if given.
pub fn build_command(path: &Path, home: Option<&Path>) -> Command {
    let mut command = Command::new(path);
    if let Some(home) = home {
        command.env(HOME_ENV, home);
    }
    command
}

/// Spawns the media center.
///
/// # Errors
///
/// Returns [`LaunchError::Spawn`] if the executable cannot be started.
pub fn launch_app(path: &Path, home: Option<&Path>) -> Result<Child, LaunchError> {
    let child = build_command(path, home)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), pid = child.id(), "media center started");
    Ok(child)
}

/// Reaps `child` if it has exited, without waiting for it.
///
/// Returns the exit status once the process is gone.
pub fn reap_app(child: &mut Child) -> Option<ExitStatus> {
    match child.try_wait() {
        Ok(Some(status)) => {
            info!(pid = child.id(), %status, "media center exited");
            Some(status)
        }
        Ok(None) => {
            debug!(pid = child.id(), "media center still running");
            None
        }
        Err(e) => {
            warn!(pid = child.id(), "cannot query media center status: {e}");
            None
        }
    }
}
