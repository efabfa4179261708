//! Source formatting through an external program.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command}: {status}{}", .stderr.lines().next().map(|l| format!(": {l}")).unwrap_or_default())]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Turns edited source into its final form.
pub trait Formatter: Send + Sync {
    fn format(&self, source: &[u8]) -> Result<Vec<u8>, FormatError>;

    fn name(&self) -> &str;
}

/// Runs a program that reads source on stdin and prints the formatted
/// result, `goimports` by default.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
}

impl Default for CommandFormatter {
    fn default() -> Self {
        Self::new("goimports", Vec::<String>::new())
    }
}

impl CommandFormatter {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program followed by its arguments; `None` for an empty list.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Formatter for CommandFormatter {
    fn format(&self, source: &[u8]) -> Result<Vec<u8>, FormatError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FormatError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let io_error = |source: std::io::Error| FormatError::Io {
            program: self.program.clone(),
            source,
        };
        let mut stdin = child.stdin.take();
        // Write from a separate thread so a full stdout pipe cannot stall
        // the child while we are still feeding it.
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin.as_mut() {
                Some(pipe) => pipe.write_all(source),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (output, writer.join().unwrap_or(Ok(())))
        });
        let output = output.map_err(io_error)?;

        // A failing program may exit before reading all of its input.
        if !output.status.success() {
            return Err(FormatError::Failed {
                command: self.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written.map_err(io_error)?;
        Ok(output.stdout)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Leaves source untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Formatter for Passthrough {
    fn format(&self, source: &[u8]) -> Result<Vec<u8>, FormatError> {
        Ok(source.to_vec())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
