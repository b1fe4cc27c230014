use std::{path::Path, process::Stdio};

use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// stdout followed by stderr.
    pub output: String,
}

/// Run `program args...`, optionally inside `cwd`, capturing both output streams.
///
/// A non-zero exit is reported through `success`, not as an error; only a
/// failure to start the process is an error.
pub async fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let out = cmd
        .output()
        .await
        .map_err(|e| Error::External(format!("running {program}: {e}")))?;

    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));
    debug!(program, status = %out.status, "command finished");

    Ok(CommandOutput {
        success: out.status.success(),
        output,
    })
}
