use std::fmt;

use ignite_exec::{fan_out, Executor, FanOutTask};
use ignite_topology::NodeSet;

use crate::commands::CommandSet;
use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Stage};
use crate::{local_target, remote_target, run_stage};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ServicePhase {
    /// The configuration services, started on the servers only.
    ControlPlane,
    /// The I/O services, started on every node.
    DataPlane,
}

impl ServicePhase {
    /// The phase name understood by `bootstrap-node --phase`.
    pub fn as_arg(&self) -> &'static str {
        match self {
            ServicePhase::ControlPlane => "phase1",
            ServicePhase::DataPlane => "phase2",
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ServicePhase::ControlPlane => Stage::ControlPlane,
            ServicePhase::DataPlane => Stage::DataPlane,
        }
    }
}

impl fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Starts the service fleet in two ordered phases.
pub struct PhasedServiceBootstrapper<'a> {
    config: &'a BootstrapConfig,
    nodes: &'a NodeSet,
    commands: &'a CommandSet,
}

impl<'a> PhasedServiceBootstrapper<'a> {
    pub fn new(config: &'a BootstrapConfig, nodes: &'a NodeSet, commands: &'a CommandSet) -> Self {
        Self {
            config,
            nodes,
            commands,
        }
    }

    /// Runs phase 1 then phase 2, phase 2 never starts if phase 1 failed.
    pub async fn run<E>(&self, executor: &E) -> Result<(), BootstrapError>
    where
        E: Executor + ?Sized,
    {
        for phase in [ServicePhase::ControlPlane, ServicePhase::DataPlane] {
            run_stage(phase.stage(), self.run_phase(executor, phase)).await?;
        }
        Ok(())
    }

    /// Builds the batch of a phase, the local node always comes first.
    pub fn tasks(&self, phase: ServicePhase) -> Vec<FanOutTask> {
        let command = self.commands.service_bootstrap(phase);
        let local = FanOutTask::command(local_target(self.nodes), command.clone());

        let remote = match phase {
            ServicePhase::ControlPlane => {
                let artifact = self.config.control_plane_artifact_path();
                self.nodes
                    .remote_servers()
                    .map(|node| {
                        FanOutTask::new(remote_target(node))
                            .copy(artifact.clone(), artifact.clone())
                            .run(command.clone())
                    })
                    .collect::<Vec<_>>()
            },
            ServicePhase::DataPlane => self
                .nodes
                .remote_nodes()
                .map(|node| FanOutTask::command(remote_target(node), command.clone()))
                .collect(),
        };

        std::iter::once(local).chain(remote).collect()
    }

    async fn run_phase<E>(&self, executor: &E, phase: ServicePhase) -> Result<(), BootstrapError>
    where
        E: Executor + ?Sized,
    {
        let tasks = self.tasks(phase);
        debug!(phase = %phase, num_tasks = tasks.len(), mkfs = self.config.mkfs, "Dispatching phase.");

        fan_out(executor, tasks)
            .await
            .map_err(|source| BootstrapError::FanOut {
                stage: phase.stage(),
                source,
            })
    }
}
