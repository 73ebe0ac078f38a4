//! External command execution with a hard timeout

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use thermo_core::{Result, ThermoError};

/// Run `program` with `args`, optionally feeding `stdin`, and return stdout.
/// Non-zero exit, spawn failure, and timeout are all `ThermoError::Command`.
pub async fn run(
    program: &str,
    args: &[&str],
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    debug!("Running {} {:?}", program, args);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| ThermoError::command(program, e))?;

    let pipe = child.stdin.take();
    let exchange = async move {
        if let (Some(mut pipe), Some(input)) = (pipe, stdin) {
            pipe.write_all(input.as_bytes()).await?;
            // Dropping the handle closes stdin
        }
        child.wait_with_output().await
    };

    let output = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ThermoError::command(program, format!("timed out after {timeout:?}")))?
        .map_err(|e| ThermoError::command(program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ThermoError::command(
            program,
            format!("{}: {}", output.status, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
