use std::collections::BTreeSet;

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    CheckState,
    ConsulError,
    ElectionSession,
    KvEntry,
    Membership,
    NodeHealth,
    SessionId,
    LEADER_KEY,
};

/// The address of the local agent's HTTP API.
pub static DEFAULT_HTTP_ADDR: &str = "http://127.0.0.1:8500";

/// The maximum number of operations Consul accepts in a single transaction.
const MAX_TXN_OPS: usize = 64;

/// The member status Serf reports for live members.
const MEMBER_ALIVE: u8 = 1;

#[derive(Debug, Clone)]
/// A [Membership] implementation talking to a Consul agent over HTTP.
pub struct ConsulHttpClient {
    base_url: String,
    token: Option<String>,
    client: Client<HttpConnector>,
}

impl Default for ConsulHttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_ADDR)
    }
}

impl ConsulHttpClient {
    /// Creates a new client for the agent at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client: Client::new(),
        }
    }

    /// Sets the ACL token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Body,
    ) -> Result<(StatusCode, Bytes), ConsulError> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{}", self.base_url, path));
        if let Some(token) = self.token.as_ref() {
            builder = builder.header("X-Consul-Token", token);
        }
        let request = builder.body(body).map_err(|error| ConsulError::Request {
            path: path.to_string(),
            error,
        })?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await?;
        Ok((status, body))
    }

    /// Fetches and decodes a JSON document, `None` if Consul returns 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ConsulError> {
        let (status, body) = self.send(Method::GET, path, Body::empty()).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(path, status, &body)?;

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|error| ConsulError::Decode {
                path: path.to_string(),
                error,
            })
    }

    async fn put(&self, path: &str, body: impl Into<Body>) -> Result<Bytes, ConsulError> {
        let (status, body) = self.send(Method::PUT, path, body.into()).await?;
        check_status(path, status, &body)?;
        Ok(body)
    }
}

fn check_status(path: &str, status: StatusCode, body: &[u8]) -> Result<(), ConsulError> {
    if status.is_success() {
        return Ok(());
    }

    Err(ConsulError::Status {
        path: path.to_string(),
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).trim().to_string(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MemberEntry {
    name: String,
    status: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvPair {
    #[serde(default)]
    session: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionInfo {
    #[serde(default)]
    checks: Option<Vec<String>>,
    #[serde(default)]
    node_checks: Option<Vec<String>>,
    #[serde(default)]
    service_checks: Option<Vec<serde_json::Value>>,
}

impl SessionInfo {
    fn bound_check_count(&self) -> usize {
        match self.checks.as_ref() {
            Some(checks) => checks.len(),
            None => {
                self.node_checks.as_ref().map(Vec::len).unwrap_or(0)
                    + self.service_checks.as_ref().map(Vec::len).unwrap_or(0)
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    node: ServiceNode,
    #[serde(default)]
    checks: Vec<ServiceCheck>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceNode {
    node: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceCheck {
    #[serde(rename = "CheckID")]
    check_id: String,
    status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TxnOp<'a> {
    #[serde(rename = "KV")]
    kv: TxnKv<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TxnKv<'a> {
    verb: &'static str,
    key: &'a str,
    value: &'a str,
    flags: u64,
}

#[async_trait]
impl Membership for ConsulHttpClient {
    async fn internal_leader(&self) -> Result<Option<String>, ConsulError> {
        let leader: Option<String> = self.get_json("/v1/status/leader").await?;
        Ok(leader.filter(|addr| !addr.is_empty()))
    }

    async fn ready_members(&self) -> Result<BTreeSet<String>, ConsulError> {
        let members: Vec<MemberEntry> = self
            .get_json("/v1/agent/members")
            .await?
            .unwrap_or_default();

        Ok(members
            .into_iter()
            .filter(|member| member.status == MEMBER_ALIVE)
            .map(|member| member.name)
            .collect())
    }

    async fn kv_import(&self, entries: &[KvEntry]) -> Result<(), ConsulError> {
        for (chunk_idx, chunk) in entries.chunks(MAX_TXN_OPS).enumerate() {
            let ops = chunk
                .iter()
                .map(|entry| TxnOp {
                    kv: TxnKv {
                        verb: "set",
                        key: &entry.key,
                        value: entry.value.as_deref().unwrap_or(""),
                        flags: entry.flags,
                    },
                })
                .collect::<Vec<_>>();

            let body = serde_json::to_vec(&ops).map_err(|error| ConsulError::Encode {
                path: "/v1/txn".to_string(),
                error,
            })?;
            self.put("/v1/txn", body).await?;

            debug!(
                chunk = chunk_idx,
                num_entries = chunk.len(),
                "Imported KV chunk."
            );
        }

        Ok(())
    }

    async fn election_session(&self) -> Result<Option<ElectionSession>, ConsulError> {
        let path = format!("/v1/kv/{LEADER_KEY}");
        let pairs: Vec<KvPair> = self.get_json(&path).await?.unwrap_or_default();
        let session = match pairs.into_iter().find_map(|pair| pair.session) {
            Some(session) => session,
            None => return Ok(None),
        };

        let path = format!("/v1/session/info/{session}");
        let infos: Vec<SessionInfo> = self.get_json(&path).await?.unwrap_or_default();

        // The session may be invalidated between the two requests.
        Ok(infos.first().map(|info| ElectionSession {
            id: SessionId(session),
            bound_check_count: info.bound_check_count(),
        }))
    }

    async fn destroy_session(&self, id: &SessionId) -> Result<(), ConsulError> {
        self.put(&format!("/v1/session/destroy/{id}"), Body::empty())
            .await?;
        Ok(())
    }

    async fn trigger_election(&self, tag: &str) -> Result<(), ConsulError> {
        self.put(&format!("/v1/kv/{LEADER_KEY}"), tag.to_string())
            .await?;
        Ok(())
    }

    async fn service_health(&self, service: &str) -> Result<Vec<NodeHealth>, ConsulError> {
        let path = format!("/v1/health/service/{service}");
        let entries: Vec<ServiceEntry> = self.get_json(&path).await?.unwrap_or_default();

        Ok(entries
            .into_iter()
            .map(|entry| NodeHealth {
                hostname: entry.node.node,
                checks: entry
                    .checks
                    .into_iter()
                    .map(|check| CheckState::new(check.check_id, check.status))
                    .collect(),
            })
            .collect())
    }
}
