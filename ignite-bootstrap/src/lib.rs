//! # Ignite Bootstrap
//! The orchestrator bringing a cluster from zero to a healthy service fleet.
//!
//! A run is a fixed sequence of stages, each of which must complete before the
//! next begins:
//!
//! 1. The membership layer is founded on the local node and every other node
//!    joins it, see [MembershipBootstrapper].
//! 2. A leader election is awaited and repaired if its session is only bound
//!    to the baseline check, see [LeaderSessionValidator].
//! 3. The services are started in two phases, see [PhasedServiceBootstrapper].
//! 4. Every service instance must report passing checks, see [HealthGate].
//!
//! Work on many nodes is always issued as one concurrent batch which is joined
//! completely, and every wait on the cluster goes through a single
//! [ConvergencePolicy]. Any failure ends the run.
//!
//! ```rust,no_run
//! use ignite_bootstrap::{Bootstrap, BootstrapConfig};
//! use ignite_consul::ConsulHttpClient;
//! use ignite_exec::ShellExecutor;
//! use ignite_topology::{LocalIdentity, NodeSet};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = BootstrapConfig::new("/var/lib/ignite").with_mkfs(true);
//! let nodes = NodeSet::load(&config.topology_path(), &LocalIdentity::from_hostname("srvnode-1"))?;
//!
//! Bootstrap::new(config, nodes, ShellExecutor::default(), ConsulHttpClient::default())
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

mod artifacts;
mod commands;
mod config;
mod election;
mod error;
mod health;
mod membership;
mod phases;
mod poller;

use std::future::Future;
use std::time::Instant;

pub use artifacts::{load_kv_dataset, Generator, DEFAULT_GENERATOR};
pub use commands::CommandSet;
pub use config::{
    BootstrapConfig,
    CONTROL_PLANE_ARTIFACT_FILE_NAME,
    DEFAULT_CONF_DIR,
    DEFAULT_LIBEXEC_DIR,
    KV_DATASET_FILE_NAME,
};
pub use election::LeaderSessionValidator;
pub use error::{BootstrapError, Stage};
pub use health::HealthGate;
use ignite_consul::Membership;
use ignite_exec::{Executor, Target};
use ignite_topology::{NodeDescriptor, NodeSet};
pub use membership::MembershipBootstrapper;
pub use phases::{PhasedServiceBootstrapper, ServicePhase};
pub use poller::{ConvergenceError, ConvergencePolicy, DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS};

/// A single bootstrap run against a resolved node set.
pub struct Bootstrap<E, M> {
    config: BootstrapConfig,
    nodes: NodeSet,
    commands: CommandSet,
    executor: E,
    membership: M,
}

impl<E, M> Bootstrap<E, M>
where
    E: Executor,
    M: Membership,
{
    pub fn new(config: BootstrapConfig, nodes: NodeSet, executor: E, membership: M) -> Self {
        let commands = CommandSet::new(&config);
        Self {
            config,
            nodes,
            commands,
            executor,
            membership,
        }
    }

    #[inline]
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    #[inline]
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    #[inline]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    #[inline]
    pub fn membership(&self) -> &M {
        &self.membership
    }

    /// Runs every stage in order, stopping at the first failure.
    pub async fn run(&self) -> Result<(), BootstrapError> {
        let start = Instant::now();
        info!(
            local_node = %self.nodes.local(),
            num_servers = self.nodes.servers().len(),
            num_clients = self.nodes.clients().len(),
            conf_dir = ?self.config.conf_dir,
            mkfs = self.config.mkfs,
            "Bootstrapping cluster."
        );

        MembershipBootstrapper::new(&self.config, &self.nodes, &self.commands)
            .run(&self.executor, &self.membership)
            .await?;

        run_stage(
            Stage::Election,
            LeaderSessionValidator::from_config(&self.config)
                .wait_for_elected_leader(&self.membership),
        )
        .await?;

        PhasedServiceBootstrapper::new(&self.config, &self.nodes, &self.commands)
            .run(&self.executor)
            .await?;

        run_stage(
            Stage::Health,
            HealthGate::from_config(&self.config).wait_until_healthy(&self.membership),
        )
        .await?;

        info!(time_taken = ?start.elapsed(), "Cluster bootstrap complete.");
        Ok(())
    }
}

/// Runs a stage, logging its start and its successful completion.
pub(crate) async fn run_stage<T, F>(stage: Stage, fut: F) -> Result<T, BootstrapError>
where
    F: Future<Output = Result<T, BootstrapError>>,
{
    let start = Instant::now();
    info!(stage = %stage, "Starting stage.");

    let output = fut.await?;

    info!(stage = %stage, time_taken = ?start.elapsed(), "Ok.");
    Ok(output)
}

pub(crate) fn local_target(nodes: &NodeSet) -> Target {
    Target::Local(nodes.local().clone())
}

pub(crate) fn remote_target(node: &NodeDescriptor) -> Target {
    Target::Remote(node.clone())
}
