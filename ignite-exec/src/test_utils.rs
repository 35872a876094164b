use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{CommandLine, ExecError, Executor, Target};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InvocationKind {
    Run(CommandLine),
    Copy {
        source: PathBuf,
        destination: PathBuf,
    },
}

#[derive(Debug, Clone)]
/// A record of a single call made against the [MockExecutor].
pub struct Invocation {
    pub hostname: String,
    pub local: bool,
    pub kind: InvocationKind,
}

impl Invocation {
    /// Returns true if this was a command containing the given argument.
    pub fn is_run_with(&self, value: &str) -> bool {
        matches!(&self.kind, InvocationKind::Run(command) if command.contains(value))
    }

    /// Returns true if this was a command running the named program.
    ///
    /// Only the file name of the program is compared, so a program living in
    /// any directory matches.
    pub fn is_run_of(&self, program: &str) -> bool {
        matches!(
            &self.kind,
            InvocationKind::Run(command)
                if Path::new(command.program()).file_name() == Some(OsStr::new(program))
        )
    }
}

#[derive(Default)]
struct MockState {
    invocations: Vec<Invocation>,
    completed: Vec<Invocation>,
    failing_runs: BTreeMap<String, BTreeSet<String>>,
    failing_copies: BTreeSet<String>,
    delays: BTreeMap<String, Duration>,
}

#[derive(Clone, Default)]
/// An executor which records every call and never touches a real node.
///
/// Failures and delays can be scripted per hostname.
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

impl MockExecutor {
    /// Fails any command on the host which contains `argument`.
    pub fn fail_on(&self, hostname: &str, argument: &str) {
        self.state
            .lock()
            .failing_runs
            .entry(hostname.to_string())
            .or_default()
            .insert(argument.to_string());
    }

    /// Fails every copy onto the host.
    pub fn fail_copy_on(&self, hostname: &str) {
        self.state.lock().failing_copies.insert(hostname.to_string());
    }

    /// Delays every call against the host.
    pub fn delay_on(&self, hostname: &str, delay: Duration) {
        self.state.lock().delays.insert(hostname.to_string(), delay);
    }

    /// Every call made so far, in dispatch order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().invocations.clone()
    }

    /// Every call which has returned, in completion order.
    pub fn completed(&self) -> Vec<Invocation> {
        self.state.lock().completed.clone()
    }

    /// The hostnames a command containing the argument was run on.
    pub fn hosts_running(&self, argument: &str) -> Vec<String> {
        self.invocations()
            .into_iter()
            .filter(|invocation| invocation.is_run_with(argument))
            .map(|invocation| invocation.hostname)
            .collect()
    }

    /// The hostnames the named program was run on.
    pub fn hosts_running_program(&self, program: &str) -> Vec<String> {
        self.invocations()
            .into_iter()
            .filter(|invocation| invocation.is_run_of(program))
            .map(|invocation| invocation.hostname)
            .collect()
    }

    async fn record(&self, target: &Target, kind: InvocationKind) -> Result<(), ExecError> {
        let invocation = Invocation {
            hostname: target.hostname().to_string(),
            local: target.is_local(),
            kind,
        };

        let (delay, fail) = {
            let mut state = self.state.lock();
            state.invocations.push(invocation.clone());

            let fail = match &invocation.kind {
                InvocationKind::Run(command) => state
                    .failing_runs
                    .get(&invocation.hostname)
                    .map(|needles| needles.iter().any(|needle| command.contains(needle)))
                    .unwrap_or(false),
                InvocationKind::Copy { .. } => {
                    state.failing_copies.contains(&invocation.hostname)
                },
            };
            (state.delays.get(&invocation.hostname).copied(), fail)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.lock().completed.push(invocation.clone());

        if fail {
            Err(ExecError::Failed {
                status: Some(1),
                output: format!("scripted failure on {}", invocation.hostname),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(
        &self,
        target: &Target,
        command: &CommandLine,
    ) -> Result<(), ExecError> {
        self.record(target, InvocationKind::Run(command.clone()))
            .await
    }

    async fn copy(
        &self,
        target: &Target,
        source: &Path,
        destination: &Path,
    ) -> Result<(), ExecError> {
        let kind = InvocationKind::Copy {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        };
        self.record(target, kind).await
    }
}
