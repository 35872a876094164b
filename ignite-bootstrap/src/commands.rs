use std::path::PathBuf;

use ignite_consul::AgentMode;
use ignite_exec::CommandLine;

use crate::config::BootstrapConfig;
use crate::phases::ServicePhase;

pub static AGENT_START_PROGRAM: &str = "consul-agent-start";
pub static CONFIG_REFRESH_PROGRAM: &str = "update-consul-conf";
pub static SERVICE_BOOTSTRAP_PROGRAM: &str = "bootstrap-node";

#[derive(Debug, Clone)]
/// Builds the command lines run on the nodes.
///
/// Every node shares the same layout, so the same command works locally and
/// over the remote transport.
pub struct CommandSet {
    libexec_dir: PathBuf,
    conf_dir: PathBuf,
    mkfs: bool,
}

impl CommandSet {
    pub fn new(config: &BootstrapConfig) -> Self {
        Self {
            libexec_dir: config.libexec_dir.clone(),
            conf_dir: config.conf_dir.clone(),
            mkfs: config.mkfs,
        }
    }

    /// Starts the membership agent in the given mode.
    ///
    /// The founding agent has nothing to join.
    pub fn agent_start(&self, mode: AgentMode, bind: &str, join: Option<&str>) -> CommandLine {
        let mut command = CommandLine::in_dir(&self.libexec_dir, AGENT_START_PROGRAM)
            .arg("--mode")
            .arg(mode.as_str())
            .arg("--bind")
            .arg(bind);

        if let Some(join) = join {
            command = command.arg("--join").arg(join);
        }

        command.arg("--conf-dir").path_arg(&self.conf_dir)
    }

    /// Refreshes the node's local configuration from the shared store.
    pub fn refresh_config(&self) -> CommandLine {
        CommandLine::in_dir(&self.libexec_dir, CONFIG_REFRESH_PROGRAM)
            .arg("--conf-dir")
            .path_arg(&self.conf_dir)
    }

    /// Runs one phase of the service bootstrap on a node.
    pub fn service_bootstrap(&self, phase: ServicePhase) -> CommandLine {
        CommandLine::in_dir(&self.libexec_dir, SERVICE_BOOTSTRAP_PROGRAM)
            .arg("--phase")
            .arg(phase.as_arg())
            .flag_if(self.mkfs, "--mkfs")
            .arg("--conf-dir")
            .path_arg(&self.conf_dir)
    }
}
