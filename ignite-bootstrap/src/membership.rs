use std::collections::BTreeSet;

use ignite_consul::{AgentMode, Membership};
use ignite_exec::{fan_out, Executor, FanOutTask};
use ignite_topology::NodeSet;
use itertools::Itertools;

use crate::artifacts::load_kv_dataset;
use crate::commands::CommandSet;
use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Stage};
use crate::{local_target, remote_target, run_stage};

/// Brings the membership layer up across the whole fleet.
///
/// The local node founds the cluster, every other node joins it. Once this
/// returns every agent is a live member and every node has refreshed its
/// configuration from the shared store.
pub struct MembershipBootstrapper<'a> {
    config: &'a BootstrapConfig,
    nodes: &'a NodeSet,
    commands: &'a CommandSet,
}

impl<'a> MembershipBootstrapper<'a> {
    pub fn new(config: &'a BootstrapConfig, nodes: &'a NodeSet, commands: &'a CommandSet) -> Self {
        Self {
            config,
            nodes,
            commands,
        }
    }

    pub async fn run<E, M>(&self, executor: &E, membership: &M) -> Result<(), BootstrapError>
    where
        E: Executor + ?Sized,
        M: Membership + ?Sized,
    {
        run_stage(Stage::FoundingAgent, self.start_founding_agent(executor)).await?;
        run_stage(Stage::InternalLeader, self.wait_for_internal_leader(membership)).await?;
        run_stage(Stage::KvImport, self.import_kv_dataset(membership)).await?;
        let num_joined = run_stage(Stage::AgentFleet, self.start_agent_fleet(executor)).await?;
        run_stage(Stage::Membership, self.wait_for_roster(membership, num_joined + 1)).await?;
        run_stage(Stage::ConfigRefresh, self.refresh_configuration(executor)).await?;
        Ok(())
    }

    async fn start_founding_agent<E>(&self, executor: &E) -> Result<(), BootstrapError>
    where
        E: Executor + ?Sized,
    {
        let local = self.nodes.local();
        let command = self
            .commands
            .agent_start(AgentMode::Founding, &local.address, None);

        executor
            .execute(&local_target(self.nodes), &command)
            .await
            .map_err(|source| BootstrapError::Command {
                stage: Stage::FoundingAgent,
                hostname: local.hostname.clone(),
                source,
            })
    }

    async fn wait_for_internal_leader<M>(&self, membership: &M) -> Result<(), BootstrapError>
    where
        M: Membership + ?Sized,
    {
        let leader = self
            .config
            .leader_wait
            .converge(
                "internal leader",
                || membership.internal_leader(),
                Option::is_some,
                |_| "the local agent never reported an internal leader".to_string(),
            )
            .await
            .map_err(|source| BootstrapError::Convergence {
                stage: Stage::InternalLeader,
                source,
            })?;

        info!(leader = ?leader, "Local agent elected an internal leader.");
        Ok(())
    }

    async fn import_kv_dataset<M>(&self, membership: &M) -> Result<(), BootstrapError>
    where
        M: Membership + ?Sized,
    {
        let path = self.config.kv_dataset_path();
        let entries = load_kv_dataset(&path).await?;

        membership
            .kv_import(&entries)
            .await
            .map_err(|source| BootstrapError::Consul {
                stage: Stage::KvImport,
                source,
            })?;

        info!(num_entries = entries.len(), "Imported KV dataset.");
        Ok(())
    }

    /// Starts an agent on every remote node, returning how many were started.
    async fn start_agent_fleet<E>(&self, executor: &E) -> Result<usize, BootstrapError>
    where
        E: Executor + ?Sized,
    {
        let join = self.nodes.local().address.as_str();
        let tasks = self
            .nodes
            .remote_nodes()
            .map(|node| {
                let mode = if node.is_server() {
                    AgentMode::Server
                } else {
                    AgentMode::Client
                };
                let command = self.commands.agent_start(mode, &node.address, Some(join));
                FanOutTask::command(remote_target(node), command)
            })
            .collect::<Vec<_>>();

        let num_tasks = tasks.len();
        fan_out(executor, tasks)
            .await
            .map_err(|source| BootstrapError::FanOut {
                stage: Stage::AgentFleet,
                source,
            })?;

        Ok(num_tasks)
    }

    async fn wait_for_roster<M>(
        &self,
        membership: &M,
        expected_members: usize,
    ) -> Result<(), BootstrapError>
    where
        M: Membership + ?Sized,
    {
        let expected = self.nodes.hostnames();
        self.config
            .convergence
            .converge(
                "membership roster",
                || membership.ready_members(),
                |members| members.len() == expected_members,
                |last| missing_members(&expected, last),
            )
            .await
            .map_err(|source| BootstrapError::Convergence {
                stage: Stage::Membership,
                source,
            })?;

        info!(num_members = expected_members, "Every agent joined the cluster.");
        Ok(())
    }

    async fn refresh_configuration<E>(&self, executor: &E) -> Result<(), BootstrapError>
    where
        E: Executor + ?Sized,
    {
        let command = self.commands.refresh_config();
        let tasks = std::iter::once(local_target(self.nodes))
            .chain(self.nodes.remote_nodes().map(remote_target))
            .map(|target| FanOutTask::command(target, command.clone()));

        fan_out(executor, tasks)
            .await
            .map_err(|source| BootstrapError::FanOut {
                stage: Stage::ConfigRefresh,
                source,
            })
    }
}

fn missing_members(expected: &BTreeSet<String>, observed: Option<&BTreeSet<String>>) -> String {
    let missing = expected
        .iter()
        .filter(|hostname| !observed.map(|o| o.contains(*hostname)).unwrap_or(false))
        .collect::<Vec<_>>();

    format!(
        "{} of {} expected members never became ready, missing: {}",
        missing.len(),
        expected.len(),
        missing.iter().join(", "),
    )
}
