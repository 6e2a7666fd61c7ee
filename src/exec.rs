//! External process invocation for the version and publish tools.
use async_trait::async_trait;
use log::*;
use std::{fmt, path::PathBuf, process::Stdio};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};

#[cfg(test)]
use mockall::automock;

use crate::error::{ReleaseError, Result};

/// A program invocation against the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Arguments carry secrets and must never be logged.
    pub sensitive: bool,
}

impl ExternalCommand {
    pub fn new<I, S>(program: &str, args: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            sensitive: false,
        }
    }

    /// Split a whitespace separated command string such as
    /// `yarn changeset version` into program and arguments.
    pub fn parse(script: &str, cwd: impl Into<PathBuf>) -> Result<Self> {
        let mut parts = script.split_whitespace();

        let program = parts.next().ok_or_else(|| {
            ReleaseError::invalid_config("command must not be empty")
        })?;

        Ok(Self::new(program, parts, cwd))
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            return write!(f, "{} <redacted>", self.program);
        }

        write!(f, "{}", self.program)?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a successful process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs external programs. A non-zero exit status is an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn output(&self, command: ExternalCommand) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Default)]
pub struct ProcessRunner {}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn output(&self, command: ExternalCommand) -> Result<CommandOutput> {
        info!("running: {command}");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let echo = !command.sensitive;
        let (stdout, stderr, status) = tokio::try_join!(
            stream_lines(child.stdout.take(), echo),
            stream_lines(child.stderr.take(), echo),
            child.wait(),
        )?;

        let result = CommandOutput { stdout, stderr };

        if !status.success() {
            let stderr = if command.sensitive {
                "<redacted>".to_string()
            } else {
                result.stderr.trim().to_string()
            };

            return Err(ReleaseError::CommandFailed {
                command: command.to_string(),
                code: status.code(),
                stderr,
            });
        }

        Ok(result)
    }
}

/// Collect a child pipe while logging each line as it arrives.
async fn stream_lines<R>(pipe: Option<R>, echo: bool) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(pipe);
    let mut captured = String::new();
    let mut buf = vec![];

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if echo {
            info!("{}", line.trim_end());
        }
        captured.push_str(&line);
    }

    Ok(captured)
}
