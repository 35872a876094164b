use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsulError {
    #[error("Failed to reach the Consul agent: {0}")]
    /// The agent could not be reached, most likely it is not running yet.
    Transport(#[from] hyper::Error),

    #[error("Failed to build request for {path}: {error}")]
    Request {
        path: String,
        error: hyper::http::Error,
    },

    #[error("Consul returned {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Failed to encode request for {path}: {error}")]
    Encode {
        path: String,
        error: serde_json::Error,
    },

    #[error("Failed to decode Consul response for {path}: {error}")]
    Decode {
        path: String,
        error: serde_json::Error,
    },

    #[error("{0}")]
    /// A scripted failure, only produced by the test utilities.
    Scripted(String),
}
