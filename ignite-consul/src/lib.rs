//! # Ignite Consul
//! The narrow view of the Consul membership layer the bootstrap relies on.
//!
//! The bootstrap treats Consul as a black box offering a member roster, a KV
//! store, a session based leader election and a health-check registry. The
//! [Membership] trait captures exactly that surface; [ConsulHttpClient] talks
//! to a real agent over its HTTP API and, with the `test-utils` feature,
//! `test_utils::MockMembership` provides a scripted stand-in.

#[macro_use]
extern crate tracing;

mod error;
mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
pub use error::ConsulError;
pub use http::{ConsulHttpClient, DEFAULT_HTTP_ADDR};
use serde::{Deserialize, Serialize};

/// The KV key the election session is attached to.
pub static LEADER_KEY: &str = "leader";

/// The health check service name every agent carries regardless of services.
pub static BASELINE_CHECK: &str = "serfHealth";

/// The number of checks a session is bound to before any service registered.
///
/// A session with only this many checks predates service registration and
/// must not be trusted.
pub const BASELINE_CHECK_COUNT: usize = 1;

/// The status Consul reports for a passing check.
pub static PASSING: &str = "passing";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
/// The mode an agent is started in.
pub enum AgentMode {
    /// The first server, bootstrapping the raft cluster on its own.
    Founding,
    /// Any other server, joining the founding member.
    Server,
    /// A non-voting client agent.
    Client,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Founding => "founding",
            AgentMode::Server => "server",
            AgentMode::Client => "client",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
/// A single entry of the generated KV dataset.
///
/// The value is already base64 encoded, exactly as `consul kv export` writes it.
pub struct KvEntry {
    pub key: String,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
/// The session currently holding the leader key.
pub struct ElectionSession {
    pub id: SessionId,
    /// The number of health checks the session is bound to.
    pub bound_check_count: usize,
}

impl ElectionSession {
    /// Returns true if the session is bound to more than the baseline check.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound_check_count > BASELINE_CHECK_COUNT
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CheckState {
    pub check_id: String,
    pub status: String,
}

impl CheckState {
    pub fn new(check_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            status: status.into(),
        }
    }

    #[inline]
    pub fn is_passing(&self) -> bool {
        self.status == PASSING
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.check_id, self.status)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
/// The health of a service instance on one node.
pub struct NodeHealth {
    pub hostname: String,
    pub checks: Vec<CheckState>,
}

impl NodeHealth {
    /// The checks of this node which are not passing.
    pub fn failing_checks(&self) -> Vec<&CheckState> {
        self.checks
            .iter()
            .filter(|check| !check.is_passing())
            .collect()
    }
}

#[async_trait]
/// The surface of the membership layer used by the bootstrap.
///
/// Starting agents is not part of this trait: it is a command run on each node
/// through the executor.
pub trait Membership: Send + Sync + 'static {
    /// The address of the raft leader as seen by the local agent, if any.
    async fn internal_leader(&self) -> Result<Option<String>, ConsulError>;

    /// The hostnames of every member currently reported alive.
    async fn ready_members(&self) -> Result<BTreeSet<String>, ConsulError>;

    /// Imports the whole KV dataset.
    async fn kv_import(&self, entries: &[KvEntry]) -> Result<(), ConsulError>;

    /// The session currently holding the leader key, if any.
    async fn election_session(&self) -> Result<Option<ElectionSession>, ConsulError>;

    /// Destroys the given session, releasing the leader key.
    async fn destroy_session(&self, id: &SessionId) -> Result<(), ConsulError>;

    /// Writes a new value to the leader key, waking up the election watchers.
    async fn trigger_election(&self, tag: &str) -> Result<(), ConsulError>;

    /// The per node health of every instance of the service.
    async fn service_health(&self, service: &str) -> Result<Vec<NodeHealth>, ConsulError>;
}

#[async_trait]
impl<M> Membership for std::sync::Arc<M>
where
    M: Membership + ?Sized,
{
    async fn internal_leader(&self) -> Result<Option<String>, ConsulError> {
        (**self).internal_leader().await
    }

    async fn ready_members(&self) -> Result<BTreeSet<String>, ConsulError> {
        (**self).ready_members().await
    }

    async fn kv_import(&self, entries: &[KvEntry]) -> Result<(), ConsulError> {
        (**self).kv_import(entries).await
    }

    async fn election_session(&self) -> Result<Option<ElectionSession>, ConsulError> {
        (**self).election_session().await
    }

    async fn destroy_session(&self, id: &SessionId) -> Result<(), ConsulError> {
        (**self).destroy_session(id).await
    }

    async fn trigger_election(&self, tag: &str) -> Result<(), ConsulError> {
        (**self).trigger_election(tag).await
    }

    async fn service_health(&self, service: &str) -> Result<Vec<NodeHealth>, ConsulError> {
        (**self).service_health(service).await
    }
}
