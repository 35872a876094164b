use std::fmt;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to spawn `{program}`: {error}")]
    /// The process could not be started at all.
    Spawn { program: String, error: io::Error },

    #[error("Command exited with {}: {}", display_status(.status), .output.trim())]
    /// The process ran but exited unsuccessfully.
    ///
    /// The output contains the captured stdout and stderr of the process.
    Failed { status: Option<i32>, output: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}

#[derive(Debug)]
/// A single failed task of a fan-out batch.
pub struct TaskFailure {
    pub hostname: String,
    pub error: ExecError,
}

#[derive(Debug, Error)]
/// One or more tasks of a fan-out batch failed.
///
/// Every failing node is listed, the batch is always joined completely before
/// this is produced.
pub struct FanOutError {
    pub failures: Vec<TaskFailure>,
    pub num_tasks: usize,
}

impl FanOutError {
    /// The hostnames of every failed task.
    pub fn failed_hosts(&self) -> impl Iterator<Item = &str> + '_ {
        self.failures.iter().map(|failure| failure.hostname.as_str())
    }
}

impl fmt::Display for FanOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} tasks failed:",
            self.failures.len(),
            self.num_tasks
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.hostname, failure.error)?;
        }
        Ok(())
    }
}
