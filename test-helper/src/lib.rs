mod addr;
mod fixtures;

pub use addr::{get_unused_addr, http_base_url};
pub use fixtures::{KV_DATASET, THREE_NODE_TOPOLOGY, TWO_BY_TWO_TOPOLOGY};
