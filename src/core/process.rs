use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("`{cmd}` is not on PATH")]
    NotFound { cmd: String },
    #[error("`{cmd}` timed out after {secs}s")]
    TimedOut { cmd: String, secs: u64 },
    #[error("Failed to execute `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{cmd}` exited with {status}")]
    Failed { cmd: String, status: std::process::ExitStatus },
    #[error("Non-UTF8 output from `{cmd}`")]
    NonUtf8 { cmd: String },
}

/// Run a command with a hard timeout and return its trimmed stdout.
///
/// Stderr is discarded. The child is killed if the timeout elapses.
pub async fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<String, ProcessError> {
    let program = if cmd.contains('/') {
        PathBuf::from(cmd)
    } else {
        which(cmd).ok_or_else(|| ProcessError::NotFound { cmd: cmd.to_string() })?
    };

    let child = tokio::process::Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| ProcessError::TimedOut {
            cmd: cmd.to_string(),
            secs: timeout.as_secs(),
        })?
        .map_err(|source| ProcessError::Spawn {
            cmd: cmd.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProcessError::Failed {
            cmd: cmd.to_string(),
            status: output.status,
        });
    }

    let stdout = String::from_utf8(output.stdout).map_err(|_| ProcessError::NonUtf8 {
        cmd: cmd.to_string(),
    })?;
    Ok(stdout.trim().to_string())
}

/// Locate a binary on PATH.
pub fn which(binary: &str) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(binary))
            .find(|p| p.is_file())
    })
}
