//! # Ignite Topology
//! The fleet description the bootstrap runs against.
//!
//! The topology is produced by the configuration generator as `consul-agents.json`
//! and lists every server and client node together with the address its agent
//! binds to. Loading it yields a [NodeSet] which is validated up front: every
//! hostname must be unique and the node running the bootstrap must be one of
//! the servers.
//!
//! ```rust
//! use ignite_topology::{LocalIdentity, NodeSet};
//!
//! let descriptor = r#"{
//!     "servers": [{"node_name": "srvnode-1", "ipaddr": "10.0.0.1"}],
//!     "clients": [{"node_name": "client-1", "ipaddr": "10.0.0.9"}]
//! }"#;
//!
//! let local = LocalIdentity::from_hostname("srvnode-1");
//! let nodes = NodeSet::resolve(descriptor, &local).expect("Resolve topology.");
//! assert_eq!(nodes.local().hostname, "srvnode-1");
//! assert_eq!(nodes.remote_nodes().count(), 1);
//! ```

#[macro_use]
extern crate tracing;

mod error;
mod identity;
mod node;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub use error::TopologyError;
pub use identity::LocalIdentity;
pub use node::{NodeDescriptor, Role};
use serde::Deserialize;

/// The file name the generator writes the topology to.
pub static TOPOLOGY_FILE_NAME: &str = "consul-agents.json";

#[derive(Debug, Deserialize)]
struct TopologyDescriptor {
    #[serde(default)]
    servers: Vec<AgentEntry>,
    #[serde(default)]
    clients: Vec<AgentEntry>,
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    node_name: String,
    ipaddr: String,
}

#[derive(Debug, Clone)]
/// The full set of nodes taking part in the bootstrap.
///
/// Servers always come before clients and each group keeps the order it was
/// declared in, so fan-outs and diagnostics are deterministic.
pub struct NodeSet {
    nodes: Vec<NodeDescriptor>,
    num_servers: usize,
    local: usize,
}

impl NodeSet {
    /// Loads and resolves the topology stored at the given path.
    pub fn load(
        path: impl AsRef<Path>,
        local: &LocalIdentity,
    ) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| TopologyError::Read {
            path: path.to_path_buf(),
            error: e,
        })?;
        Self::resolve(&raw, local)
    }

    /// Parses a topology descriptor and matches the local node against
    /// the declared servers.
    pub fn resolve(
        descriptor: &str,
        local: &LocalIdentity,
    ) -> Result<Self, TopologyError> {
        let descriptor: TopologyDescriptor = serde_json::from_str(descriptor)?;
        Self::from_entries(descriptor, local)
    }

    fn from_entries(
        descriptor: TopologyDescriptor,
        local: &LocalIdentity,
    ) -> Result<Self, TopologyError> {
        if descriptor.servers.is_empty() {
            return Err(TopologyError::NoServers);
        }

        let num_servers = descriptor.servers.len();
        let entries = descriptor
            .servers
            .into_iter()
            .map(|entry| (entry, Role::Server))
            .chain(
                descriptor
                    .clients
                    .into_iter()
                    .map(|entry| (entry, Role::Client)),
            );

        let mut seen = BTreeSet::new();
        let mut nodes = Vec::with_capacity(num_servers);
        for (entry, role) in entries {
            let hostname = entry.node_name.trim();
            let address = entry.ipaddr.trim();

            if hostname.is_empty() {
                return Err(TopologyError::MissingField {
                    field: "node_name",
                    position: nodes.len(),
                });
            }
            if address.is_empty() {
                return Err(TopologyError::MissingField {
                    field: "ipaddr",
                    position: nodes.len(),
                });
            }
            if !seen.insert(hostname.to_string()) {
                return Err(TopologyError::DuplicateHostname(hostname.to_string()));
            }

            nodes.push(NodeDescriptor::new(hostname, address, role));
        }

        let local_idx = nodes[..num_servers]
            .iter()
            .position(|node| local.matches(node))
            .ok_or_else(|| TopologyError::LocalNodeNotServer {
                identity: local.to_string(),
            })?;

        info!(
            num_servers = num_servers,
            num_clients = nodes.len() - num_servers,
            local_node = %nodes[local_idx].hostname,
            "Resolved cluster topology."
        );

        Ok(Self {
            nodes,
            num_servers,
            local: local_idx,
        })
    }

    #[inline]
    /// The server node the bootstrap is running on.
    pub fn local(&self) -> &NodeDescriptor {
        &self.nodes[self.local]
    }

    #[inline]
    /// All server nodes, local included.
    pub fn servers(&self) -> &[NodeDescriptor] {
        &self.nodes[..self.num_servers]
    }

    #[inline]
    /// All client nodes.
    pub fn clients(&self) -> &[NodeDescriptor] {
        &self.nodes[self.num_servers..]
    }

    #[inline]
    /// Every node in the cluster, servers first.
    pub fn all(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    #[inline]
    /// The total number of nodes in the cluster.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every server except the local node.
    pub fn remote_servers(&self) -> impl Iterator<Item = &NodeDescriptor> + '_ {
        self.servers()
            .iter()
            .enumerate()
            .filter(move |(idx, _)| *idx != self.local)
            .map(|(_, node)| node)
    }

    /// Every node, servers and clients, except the local node.
    pub fn remote_nodes(&self) -> impl Iterator<Item = &NodeDescriptor> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(idx, _)| *idx != self.local)
            .map(|(_, node)| node)
    }

    /// The hostnames of every node in the cluster.
    pub fn hostnames(&self) -> BTreeSet<String> {
        self.nodes.iter().map(|node| node.hostname.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_three_node_topology() {
        let local = LocalIdentity::from_hostname("srvnode-1");
        let nodes = NodeSet::resolve(test_helper::THREE_NODE_TOPOLOGY, &local)
            .expect("Resolve topology.");

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes.servers().len(), 2);
        assert_eq!(nodes.clients().len(), 1);
        assert_eq!(nodes.local().hostname, "srvnode-1");
        assert_eq!(nodes.local().role, Role::Server);

        let remote_servers = nodes
            .remote_servers()
            .map(|node| node.hostname.as_str())
            .collect::<Vec<_>>();
        assert_eq!(remote_servers, ["srvnode-2"]);

        let remote = nodes
            .remote_nodes()
            .map(|node| node.hostname.as_str())
            .collect::<Vec<_>>();
        assert_eq!(remote, ["srvnode-2", "client-1"]);
    }

    #[test]
    fn test_local_node_matched_by_address() {
        let local = LocalIdentity::new(["unrelated-name"], ["10.0.0.2"]);
        let nodes = NodeSet::resolve(test_helper::THREE_NODE_TOPOLOGY, &local)
            .expect("Resolve topology.");
        assert_eq!(nodes.local().hostname, "srvnode-2");
        assert_eq!(
            nodes
                .remote_servers()
                .map(|node| node.hostname.as_str())
                .collect::<Vec<_>>(),
            ["srvnode-1"],
        );
    }

    #[test]
    fn test_local_node_must_be_server() {
        let local = LocalIdentity::from_hostname("client-1");
        let err = NodeSet::resolve(test_helper::THREE_NODE_TOPOLOGY, &local)
            .expect_err("Client nodes cannot run the bootstrap.");
        assert!(matches!(err, TopologyError::LocalNodeNotServer { .. }));

        let local = LocalIdentity::from_hostname("somewhere-else");
        let err = NodeSet::resolve(test_helper::THREE_NODE_TOPOLOGY, &local)
            .expect_err("Unknown nodes cannot run the bootstrap.");
        assert!(matches!(err, TopologyError::LocalNodeNotServer { .. }));
    }

    #[test]
    fn test_duplicate_hostnames_rejected() {
        let descriptor = r#"{
            "servers": [
                {"node_name": "srvnode-1", "ipaddr": "10.0.0.1"},
                {"node_name": "srvnode-1", "ipaddr": "10.0.0.2"}
            ],
            "clients": []
        }"#;
        let local = LocalIdentity::from_hostname("srvnode-1");
        let err = NodeSet::resolve(descriptor, &local).expect_err("Duplicate hosts.");
        assert!(
            matches!(err, TopologyError::DuplicateHostname(ref host) if host == "srvnode-1")
        );
    }

    #[test]
    fn test_malformed_descriptors_rejected() {
        let local = LocalIdentity::from_hostname("srvnode-1");

        let err = NodeSet::resolve("{not json", &local).expect_err("Invalid JSON.");
        assert!(matches!(err, TopologyError::Malformed(_)));

        let err = NodeSet::resolve(r#"{"servers": [], "clients": []}"#, &local)
            .expect_err("No servers.");
        assert!(matches!(err, TopologyError::NoServers));

        let descriptor = r#"{"servers": [{"node_name": "srvnode-1", "ipaddr": " "}]}"#;
        let err = NodeSet::resolve(descriptor, &local).expect_err("Empty address.");
        assert!(matches!(
            err,
            TopologyError::MissingField {
                field: "ipaddr",
                position: 0
            }
        ));
    }

    #[test]
    fn test_clients_are_optional() {
        let descriptor = r#"{"servers": [{"node_name": "srvnode-1", "ipaddr": "10.0.0.1"}]}"#;
        let local = LocalIdentity::from_hostname("srvnode-1");
        let nodes = NodeSet::resolve(descriptor, &local).expect("Resolve topology.");
        assert_eq!(nodes.len(), 1);
        assert!(nodes.clients().is_empty());
        assert_eq!(nodes.remote_nodes().count(), 0);
    }
}
