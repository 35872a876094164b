use std::path::PathBuf;
use std::time::Instant;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::{CommandLine, ExecError, Executor, FanOutError, Target, TaskFailure};

#[derive(Debug, Clone, Eq, PartialEq)]
/// A single step of a fan-out task.
pub enum TaskStep {
    Run(CommandLine),
    Copy {
        source: PathBuf,
        destination: PathBuf,
    },
}

#[derive(Debug, Clone)]
/// One unit of work for a single node.
///
/// Steps run in order and the task stops at the first failing step.
pub struct FanOutTask {
    pub target: Target,
    pub steps: Vec<TaskStep>,
}

impl FanOutTask {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            steps: Vec::new(),
        }
    }

    /// Creates a task running a single command.
    pub fn command(target: Target, command: CommandLine) -> Self {
        Self::new(target).run(command)
    }

    pub fn run(mut self, command: CommandLine) -> Self {
        self.steps.push(TaskStep::Run(command));
        self
    }

    pub fn copy(mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        self.steps.push(TaskStep::Copy {
            source: source.into(),
            destination: destination.into(),
        });
        self
    }
}

/// Runs every task concurrently and waits for all of them to complete.
///
/// There is no early exit on the first failure: the batch is always joined
/// completely and the error lists every task which failed, in completion order.
pub async fn fan_out<E>(
    executor: &E,
    tasks: impl IntoIterator<Item = FanOutTask>,
) -> Result<(), FanOutError>
where
    E: Executor + ?Sized,
{
    let start = Instant::now();
    let mut requests = tasks
        .into_iter()
        .map(|task| run_task(executor, task))
        .collect::<FuturesUnordered<_>>();
    let num_tasks = requests.len();

    let mut failures = Vec::new();
    while let Some((hostname, res)) = requests.next().await {
        match res {
            Ok(()) => {
                debug!(target_node = %hostname, "Task completed.");
            },
            Err(error) => {
                error!(
                    target_node = %hostname,
                    error = %error,
                    "Task failed on node."
                );
                failures.push(TaskFailure { hostname, error });
            },
        }
    }

    debug!(
        num_tasks = num_tasks,
        num_failed = failures.len(),
        time_taken = ?start.elapsed(),
        "Fan-out batch joined."
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(FanOutError {
            failures,
            num_tasks,
        })
    }
}

async fn run_task<E>(executor: &E, task: FanOutTask) -> (String, Result<(), ExecError>)
where
    E: Executor + ?Sized,
{
    let hostname = task.target.hostname().to_string();
    for step in &task.steps {
        let res = match step {
            TaskStep::Run(command) => {
                debug!(target_node = %task.target, command = %command, "Running command.");
                executor.execute(&task.target, command).await
            },
            TaskStep::Copy {
                source,
                destination,
            } => {
                debug!(
                    target_node = %task.target,
                    source = ?source,
                    destination = ?destination,
                    "Copying file."
                );
                executor.copy(&task.target, source, destination).await
            },
        };

        if let Err(error) = res {
            return (hostname, Err(error));
        }
    }

    (hostname, Ok(()))
}
