//! `CommandRunner` trait and `ProcessRunner` (async subprocess wrapper).
//!
//! Local message stores are read by invoking an external query tool once per
//! poll. The trait keeps adapters testable without the tool installed.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("'{program}' was not found on PATH")]
    NotFound { program: String },

    #[error("permission denied running '{program}'")]
    PermissionDenied { program: String },

    #[error("'{program}' exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to run '{program}': {message}")]
    Io { program: String, message: String },
}

pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<String, CommandError>> + Send + 'a>>;

/// Runs an external program and returns its stdout.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> CommandFuture<'a>;
}

/// Real runner using `tokio::process::Command`.
///
/// The child is killed if the returned future is dropped, so a read abandoned
/// at a deadline does not leave the query tool running.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> CommandFuture<'a> {
        Box::pin(async move {
            let output = tokio::process::Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|error| match error.kind() {
                    ErrorKind::NotFound => CommandError::NotFound {
                        program: program.to_owned(),
                    },
                    ErrorKind::PermissionDenied => CommandError::PermissionDenied {
                        program: program.to_owned(),
                    },
                    _ => CommandError::Io {
                        program: program.to_owned(),
                        message: error.to_string(),
                    },
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(CommandError::Failed {
                    program: program.to_owned(),
                    code: output.status.code().unwrap_or(-1),
                    stderr: stderr.trim().to_owned(),
                });
            }

            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }
}

/// Offline runner replaying queued results per program name.
///
/// The last result for a program repeats once its queue is empty; a program
/// with nothing queued reports [`CommandError::NotFound`].
#[derive(Debug, Default)]
pub struct CannedRunner {
    queued: Mutex<HashMap<String, VecDeque<Result<String, CommandError>>>>,
    last: Mutex<HashMap<String, Result<String, CommandError>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl CannedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, program: &str, result: Result<String, CommandError>) -> &Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.entry(program.to_owned()).or_default().push_back(result);
        }
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn next_result(&self, program: &str) -> Result<String, CommandError> {
        let queued = self
            .queued
            .lock()
            .ok()
            .and_then(|mut queued| queued.get_mut(program).and_then(VecDeque::pop_front));

        let mut last = match self.last.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };
        match queued {
            Some(result) => {
                last.insert(program.to_owned(), result.clone());
                result
            }
            None => last.get(program).cloned().unwrap_or_else(|| {
                Err(CommandError::NotFound {
                    program: program.to_owned(),
                })
            }),
        }
    }
}

impl CommandRunner for CannedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> CommandFuture<'a> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((program.to_owned(), args.to_vec()));
            }
            self.next_result(program)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_maps_to_not_found() {
        let result = ProcessRunner
            .run("otpwait-definitely-not-installed", &[])
            .await;

        assert_eq!(
            result,
            Err(CommandError::NotFound {
                program: String::from("otpwait-definitely-not-installed"),
            })
        );
    }

    #[tokio::test]
    async fn canned_runner_replays_per_program() {
        let runner = CannedRunner::new();
        runner.push("sqlite3", Ok(String::from("row")));

        let args = vec![String::from("db")];
        assert_eq!(runner.run("sqlite3", &args).await, Ok(String::from("row")));
        assert_eq!(runner.run("sqlite3", &args).await, Ok(String::from("row")));
        assert!(matches!(
            runner.run("osascript", &args).await,
            Err(CommandError::NotFound { .. })
        ));
        assert_eq!(runner.calls().len(), 3);
    }
}
