/// Two servers and one client, `srvnode-1` being the first server.
pub static THREE_NODE_TOPOLOGY: &str = r#"{
    "servers": [
        {"node_name": "srvnode-1", "ipaddr": "10.0.0.1"},
        {"node_name": "srvnode-2", "ipaddr": "10.0.0.2"}
    ],
    "clients": [
        {"node_name": "client-1", "ipaddr": "10.0.0.11"}
    ]
}"#;

/// Two servers and two clients.
pub static TWO_BY_TWO_TOPOLOGY: &str = r#"{
    "servers": [
        {"node_name": "srvnode-1", "ipaddr": "10.0.0.1"},
        {"node_name": "srvnode-2", "ipaddr": "10.0.0.2"}
    ],
    "clients": [
        {"node_name": "client-1", "ipaddr": "10.0.0.11"},
        {"node_name": "client-2", "ipaddr": "10.0.0.12"}
    ]
}"#;

/// A small KV dataset in the generator's export layout.
pub static KV_DATASET: &str = r#"[
    {"key": "leader", "flags": 0, "value": ""},
    {"key": "epoch", "flags": 0, "value": "MQ=="},
    {"key": "node/srvnode-1/service/confd", "flags": 0, "value": "eyJwb3J0IjoxfQ=="}
]"#;
