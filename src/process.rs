use log::debug;
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Why an external tool did not produce output
#[derive(Error, Debug)]
pub(crate) enum RunError {
    #[error("failed to start: {0}")]
    Spawn(std::io::Error),
    #[error("process error: {0}")]
    Wait(std::io::Error),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Run a command to completion, killing it if it outlives `timeout`
pub(crate) async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
) -> Result<Output, RunError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Running {:?}", cmd.as_std());

    let child = cmd.spawn().map_err(RunError::Spawn)?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(RunError::Wait(e)),
        // the child is dropped with the future and killed
        Err(_) => Err(RunError::Timeout(timeout)),
    }
}

/// Last lines of a process stream, for error messages
pub(crate) fn tail(bytes: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail(b"a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail(b"only", 5), "only");
        assert_eq!(tail(b"", 3), "");
    }

    #[test]
    fn run_error_messages() {
        assert_eq!(
            RunError::Timeout(Duration::from_secs(30)).to_string(),
            "timed out after 30s"
        );
        let spawn = RunError::Spawn(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"));
        assert_eq!(spawn.to_string(), "failed to start: no such file");
    }
}
