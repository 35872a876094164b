//! # Ignite Exec
//! Running commands on the nodes of the fleet.
//!
//! Every piece of work the bootstrap performs on a node, starting an agent,
//! refreshing its configuration or starting services, is a [CommandLine] run
//! by an [Executor] against a [Target]. Batches of such work are issued with
//! [fan_out] which runs them concurrently and always waits for every task
//! before reporting, so a failing node never leaves the others in flight.

#[macro_use]
extern crate tracing;

mod command;
mod error;
mod fanout;
mod shell;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
pub use command::CommandLine;
pub use error::{ExecError, FanOutError, TaskFailure};
pub use fanout::{fan_out, FanOutTask, TaskStep};
use ignite_topology::NodeDescriptor;
pub use shell::ShellExecutor;

#[derive(Debug, Clone, Eq, PartialEq)]
/// Where a unit of work is executed.
pub enum Target {
    /// The node the bootstrap runs on, invoked directly.
    Local(NodeDescriptor),
    /// Any other node, reached through the remote shell transport.
    Remote(NodeDescriptor),
}

impl Target {
    #[inline]
    pub fn node(&self) -> &NodeDescriptor {
        match self {
            Target::Local(node) => node,
            Target::Remote(node) => node,
        }
    }

    #[inline]
    pub fn hostname(&self) -> &str {
        &self.node().hostname
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, Target::Local(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local(node) => write!(f, "{} (local)", node.hostname),
            Target::Remote(node) => f.write_str(&node.hostname),
        }
    }
}

#[async_trait]
/// Executes commands on a node.
///
/// Implementations never retry, the retry policy belongs to the caller.
pub trait Executor: Send + Sync + 'static {
    /// Runs the command on the target, returning once it has exited.
    async fn execute(
        &self,
        target: &Target,
        command: &CommandLine,
    ) -> Result<(), ExecError>;

    /// Copies a local file onto the target.
    async fn copy(
        &self,
        target: &Target,
        source: &Path,
        destination: &Path,
    ) -> Result<(), ExecError>;
}

#[async_trait]
impl<E> Executor for std::sync::Arc<E>
where
    E: Executor + ?Sized,
{
    async fn execute(
        &self,
        target: &Target,
        command: &CommandLine,
    ) -> Result<(), ExecError> {
        (**self).execute(target, command).await
    }

    async fn copy(
        &self,
        target: &Target,
        source: &Path,
        destination: &Path,
    ) -> Result<(), ExecError> {
        (**self).copy(target, source, destination).await
    }
}
