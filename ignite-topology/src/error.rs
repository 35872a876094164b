use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Failed to read topology descriptor {path:?}: {error}")]
    /// The descriptor could not be read from disk.
    Read { path: PathBuf, error: io::Error },

    #[error("Malformed topology descriptor: {0}")]
    /// The descriptor is not valid JSON or does not follow the expected layout.
    Malformed(#[from] serde_json::Error),

    #[error("Topology entry #{position} is missing a value for `{field}`")]
    MissingField { field: &'static str, position: usize },

    #[error("The topology does not declare any server nodes")]
    NoServers,

    #[error("Hostname {0:?} is declared more than once in the topology")]
    DuplicateHostname(String),

    #[error(
        "The local node ({identity}) does not match any server in the topology, \
        the bootstrap must be started from a server node"
    )]
    /// The bootstrap was started somewhere other than a server node.
    LocalNodeNotServer { identity: String },
}
