use std::collections::BTreeSet;
use std::fmt;

use crate::NodeDescriptor;

#[derive(Debug, Clone, Default)]
/// The names and addresses the local machine answers to.
///
/// Used to find which server of the topology the bootstrap is running on.
pub struct LocalIdentity {
    hostnames: BTreeSet<String>,
    addresses: BTreeSet<String>,
}

impl LocalIdentity {
    pub fn new(
        hostnames: impl IntoIterator<Item = impl AsRef<str>>,
        addresses: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        let clean = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        Self {
            hostnames: hostnames
                .into_iter()
                .filter_map(|name| clean(name.as_ref()))
                .collect(),
            addresses: addresses
                .into_iter()
                .filter_map(|addr| clean(addr.as_ref()))
                .collect(),
        }
    }

    /// An identity known only by a single hostname.
    pub fn from_hostname(hostname: impl AsRef<str>) -> Self {
        Self::new([hostname], Vec::<String>::new())
    }

    /// Returns true if the given node refers to this machine.
    pub fn matches(&self, node: &NodeDescriptor) -> bool {
        self.hostnames.contains(&node.hostname)
            || self.addresses.contains(&node.address)
            || self.hostnames.contains(&node.address)
            || self.addresses.contains(&node.hostname)
    }
}

impl fmt::Display for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.hostnames.iter().cloned().collect::<Vec<_>>().join(", ");
        let addrs = self.addresses.iter().cloned().collect::<Vec<_>>().join(", ");
        write!(f, "hostnames=[{names}] addresses=[{addrs}]")
    }
}
