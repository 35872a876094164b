use std::fmt;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
/// The part a node plays in the cluster.
///
/// Server nodes run the control-plane services and a voting Consul agent,
/// every node (servers included) runs the data-plane services.
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
/// A single node of the cluster as declared by the topology.
pub struct NodeDescriptor {
    /// The unique hostname of the node.
    ///
    /// This is also the name the node's agent registers itself under.
    pub hostname: String,
    /// The address the node's agent binds to.
    pub address: String,
    pub role: Role,
}

impl NodeDescriptor {
    pub fn new(hostname: impl Into<String>, address: impl Into<String>, role: Role) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            role,
        }
    }

    #[inline]
    pub fn is_server(&self) -> bool {
        self.role == Role::Server
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.hostname, self.address, self.role)
    }
}
