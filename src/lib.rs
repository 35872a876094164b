//! # Ignite
//! Tooling for bringing a Consul backed service cluster up from zero.
//!
//! This is a convenience package which includes all of the sub-projects within
//! Ignite, realistically you probably only want some of these projects:
//!
//! ### Features
//! - `ignite_topology` - Loading and validating the generated cluster topology.
//! - `ignite_exec` - Local/remote command execution and concurrent fan-out.
//! - `ignite_consul` - The membership layer client (roster, KV, sessions, health).
//! - `ignite_bootstrap` - The phased bootstrap orchestrator itself.

#[cfg(feature = "ignite-bootstrap")]
pub use ignite_bootstrap as bootstrap;
#[cfg(feature = "ignite-consul")]
pub use ignite_consul as consul;
#[cfg(feature = "ignite-exec")]
pub use ignite_exec as exec;
#[cfg(feature = "ignite-topology")]
pub use ignite_topology as topology;
