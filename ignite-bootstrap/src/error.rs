use std::fmt;
use std::io;
use std::path::PathBuf;

use ignite_consul::ConsulError;
use ignite_exec::{ExecError, FanOutError};
use ignite_topology::TopologyError;
use thiserror::Error;

use crate::poller::ConvergenceError;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
/// A step of the bootstrap sequence, used to attribute failures.
pub enum Stage {
    Generate,
    FoundingAgent,
    InternalLeader,
    KvImport,
    AgentFleet,
    Membership,
    ConfigRefresh,
    Election,
    ControlPlane,
    DataPlane,
    Health,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Generate => "generate artifacts",
            Stage::FoundingAgent => "start founding agent",
            Stage::InternalLeader => "wait for internal leader",
            Stage::KvImport => "import kv dataset",
            Stage::AgentFleet => "start agent fleet",
            Stage::Membership => "membership convergence",
            Stage::ConfigRefresh => "refresh configuration",
            Stage::Election => "leader election",
            Stage::ControlPlane => "phase 1",
            Stage::DataPlane => "phase 2",
            Stage::Health => "health convergence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Invalid topology: {0}")]
    /// The node set could not be resolved. Nothing was executed.
    Topology(#[from] TopologyError),

    #[error("Failed to read artifact {path:?}: {error}")]
    Artifact { path: PathBuf, error: io::Error },

    #[error("Malformed KV dataset {path:?}: {error}")]
    Dataset {
        path: PathBuf,
        error: serde_json::Error,
    },

    #[error("Stage `{stage}` failed on {hostname}: {source}")]
    /// A single command run outside of a fan-out batch failed.
    Command {
        stage: Stage,
        hostname: String,
        source: ExecError,
    },

    #[error("Stage `{stage}` failed, {source}")]
    FanOut { stage: Stage, source: FanOutError },

    #[error("Stage `{stage}` failed to talk to Consul: {source}")]
    Consul { stage: Stage, source: ConsulError },

    #[error("Stage `{stage}` failed: {source}")]
    Convergence {
        stage: Stage,
        source: ConvergenceError,
    },
}

impl BootstrapError {
    /// The stage the failure is attributed to, if any stage ran.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BootstrapError::Topology(_) => None,
            BootstrapError::Artifact { .. } | BootstrapError::Dataset { .. } => None,
            BootstrapError::Command { stage, .. }
            | BootstrapError::FanOut { stage, .. }
            | BootstrapError::Consul { stage, .. }
            | BootstrapError::Convergence { stage, .. } => Some(*stage),
        }
    }
}
