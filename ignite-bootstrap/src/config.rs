use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::{ConvergencePolicy, DEFAULT_INTERVAL};

/// The configuration directory used when none is given.
pub static DEFAULT_CONF_DIR: &str = "/var/lib/ignite";
/// The directory holding the helper programs invoked on every node.
pub static DEFAULT_LIBEXEC_DIR: &str = "/usr/libexec/ignite";
/// The generated KV dataset imported into the shared store.
pub static KV_DATASET_FILE_NAME: &str = "consul-kv.json";
/// The control-plane configuration copied onto every remote server.
pub static CONTROL_PLANE_ARTIFACT_FILE_NAME: &str = "confd.xc";
/// The number of consecutive empty election probes before a new trigger is written.
pub const DEFAULT_ELECTION_RETRIGGER_EVERY: u32 = 5;
pub static DEFAULT_CONTROL_PLANE_SERVICE: &str = "confd";
pub static DEFAULT_DATA_PLANE_SERVICE: &str = "ios";

#[derive(Debug, Clone)]
/// The process-wide settings of a bootstrap run.
///
/// Everything a stage needs beyond the node set is threaded through here
/// rather than read from the environment.
pub struct BootstrapConfig {
    /// The directory holding the generated artifacts.
    ///
    /// The same path is used on every node.
    pub conf_dir: PathBuf,

    /// Whether the services should (re)create their storage.
    ///
    /// This is destructive and is passed explicitly to both service phases.
    pub mkfs: bool,

    /// Where `consul-agent-start`, `update-consul-conf` and `bootstrap-node` live.
    pub libexec_dir: PathBuf,

    /// The policy of every bounded convergence point.
    pub convergence: ConvergencePolicy,

    /// The policy of the unbounded waits, internal leader and election.
    pub leader_wait: ConvergencePolicy,

    /// How many empty election probes in a row trigger a new election.
    pub election_retrigger_every: u32,

    /// The health service registered by phase 1.
    pub control_plane_service: String,

    /// The health service registered by phase 2.
    pub data_plane_service: String,

    /// Whether the health gate waits for at least one registered instance
    /// of each service. Off by default, where an empty service passes.
    pub require_registered_instances: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONF_DIR)
    }
}

impl BootstrapConfig {
    /// Creates a new config reading its artifacts from the given directory.
    pub fn new(conf_dir: impl Into<PathBuf>) -> Self {
        Self {
            conf_dir: conf_dir.into(),
            mkfs: false,
            libexec_dir: PathBuf::from(DEFAULT_LIBEXEC_DIR),
            convergence: ConvergencePolicy::default(),
            leader_wait: ConvergencePolicy::unbounded(DEFAULT_INTERVAL),
            election_retrigger_every: DEFAULT_ELECTION_RETRIGGER_EVERY,
            control_plane_service: DEFAULT_CONTROL_PLANE_SERVICE.to_string(),
            data_plane_service: DEFAULT_DATA_PLANE_SERVICE.to_string(),
            require_registered_instances: false,
        }
    }

    pub fn with_mkfs(mut self, mkfs: bool) -> Self {
        self.mkfs = mkfs;
        self
    }

    pub fn with_libexec_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.libexec_dir = dir.into();
        self
    }

    /// Set the policy used by the membership and health convergence points.
    pub fn with_convergence(mut self, policy: ConvergencePolicy) -> Self {
        self.convergence = policy;
        self
    }

    /// Set the poll interval of the unbounded leader waits.
    pub fn with_leader_wait_interval(mut self, interval: Duration) -> Self {
        self.leader_wait =
            ConvergencePolicy::unbounded(interval).with_ceiling(self.leader_wait.ceiling());
        self
    }

    /// Set a wall-clock ceiling on the unbounded leader waits.
    ///
    /// `None`, the default, waits forever.
    pub fn with_leader_wait_ceiling(mut self, ceiling: Option<Duration>) -> Self {
        self.leader_wait = self.leader_wait.with_ceiling(ceiling);
        self
    }

    pub fn with_election_retrigger_every(mut self, probes: u32) -> Self {
        self.election_retrigger_every = probes.max(1);
        self
    }

    pub fn with_health_services(
        mut self,
        control_plane: impl Into<String>,
        data_plane: impl Into<String>,
    ) -> Self {
        self.control_plane_service = control_plane.into();
        self.data_plane_service = data_plane.into();
        self
    }

    pub fn with_required_instances(mut self, required: bool) -> Self {
        self.require_registered_instances = required;
        self
    }

    #[inline]
    pub fn topology_path(&self) -> PathBuf {
        self.conf_dir.join(ignite_topology::TOPOLOGY_FILE_NAME)
    }

    #[inline]
    pub fn kv_dataset_path(&self) -> PathBuf {
        self.conf_dir.join(KV_DATASET_FILE_NAME)
    }

    #[inline]
    pub fn control_plane_artifact_path(&self) -> PathBuf {
        self.conf_dir.join(CONTROL_PLANE_ARTIFACT_FILE_NAME)
    }

    #[inline]
    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }
}
