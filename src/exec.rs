//! Thin wrapper around external programs.
//!
//! Every tool the build delegates to (esbuild, the linter, the test runner,
//! the changelog and version tools, git) is spawned through [`Tool`]. A tool
//! either runs with captured output ([`Tool::output`]), optionally fed through
//! stdin, or with its output forwarded to the terminal ([`Tool::status`]).

use std::ffi::OsStr;
use std::io::Write;
use std::process::{Command, Stdio};

use camino::Utf8Path;

use crate::error::ExecError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    program: String,
    args: Vec<String>,
}

impl Tool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Builds a tool from a command line split into words, `None` if empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The full command line, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self, dir: &Utf8Path) -> Command {
        let mut command = Command::new(OsStr::new(&self.program));
        command.args(&self.args).current_dir(dir);
        command
    }

    /// Runs the tool to completion and returns its stdout.
    ///
    /// When `stdin` is given it is written to the child on a separate thread
    /// so a tool that streams its output back cannot deadlock on full pipes.
    pub fn output(&self, dir: &Utf8Path, stdin: Option<&[u8]>) -> Result<Vec<u8>, ExecError> {
        tracing::debug!("running {}", self.display());

        let mut child = self
            .command(dir)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecError::Spawn(self.display(), e))?;

        let output = std::thread::scope(|s| {
            if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
                s.spawn(move || {
                    // the child may exit before reading everything, which is
                    // reported through its exit status instead
                    let _ = pipe.write_all(input);
                });
            }
            child.wait_with_output()
        })
        .map_err(|e| ExecError::Spawn(self.display(), e))?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));

            return Err(ExecError::Status {
                tool: self.display(),
                code: output.status.code(),
                output: text.trim_end().to_string(),
            });
        }

        Ok(output.stdout)
    }

    /// Runs the tool with inherited stdio, for interactive or long running
    /// programs such as a test runner.
    pub fn status(&self, dir: &Utf8Path) -> Result<(), ExecError> {
        tracing::info!("running {}", self.display());

        let status = self
            .command(dir)
            .status()
            .map_err(|e| ExecError::Spawn(self.display(), e))?;

        if !status.success() {
            return Err(ExecError::Status {
                tool: self.display(),
                code: status.code(),
                output: String::new(),
            });
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn here() -> &'static Utf8Path {
        Utf8Path::new(".")
    }

    #[test]
    fn test_from_command() {
        let tool = Tool::from_command(&["npx".into(), "karma".into(), "start".into()]).unwrap();
        assert_eq!(tool.program(), "npx");
        assert_eq!(tool.display(), "npx karma start");
        assert!(Tool::from_command(&[]).is_none());
    }

    #[test]
    fn test_output_pipes_stdin() {
        let out = Tool::new("cat").output(here(), Some(b"var x=1;")).unwrap();
        assert_eq!(out, b"var x=1;");
    }

    #[test]
    fn test_output_failure_status() {
        let err = Tool::new("sh")
            .args(["-c", "echo broken; exit 3"])
            .output(here(), None)
            .unwrap_err();

        match err {
            ExecError::Status { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_program() {
        let err = Tool::new("definitely-not-a-real-tool-1234")
            .output(here(), None)
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn(..)));
    }
}
