use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use ignite_consul::{ConsulError, ConsulHttpClient, KvEntry, Membership, SessionId};
use parking_lot::Mutex;

#[derive(Default)]
struct StubState {
    requests: Vec<(Method, String, Vec<u8>)>,
}

/// A tiny stand-in for the agent HTTP API serving canned responses.
async fn start_stub_agent() -> (SocketAddr, Arc<Mutex<StubState>>) {
    let addr = test_helper::get_unused_addr();
    let state = Arc::new(Mutex::new(StubState::default()));

    let service_state = state.clone();
    let make_service = make_service_fn(move |_| {
        let state = service_state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone())))
        }
    });

    let server = hyper::Server::bind(&addr).serve(make_service);
    tokio::spawn(async move {
        if let Err(e) = server.await {
            eprintln!("Stub agent failed: {e}");
        }
    });

    (addr, state)
}

async fn handle(
    req: Request<Body>,
    state: Arc<Mutex<StubState>>,
) -> Result<Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = hyper::body::to_bytes(body)
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default();
    let path = parts.uri.path().to_string();
    state
        .lock()
        .requests
        .push((parts.method.clone(), path.clone(), body));

    let (status, payload) = match (parts.method, path.as_str()) {
        (Method::GET, "/v1/status/leader") => (StatusCode::OK, r#""10.0.0.1:8300""#),
        (Method::GET, "/v1/agent/members") => (
            StatusCode::OK,
            r#"[
                {"Name": "srvnode-1", "Addr": "10.0.0.1", "Status": 1},
                {"Name": "srvnode-2", "Addr": "10.0.0.2", "Status": 1},
                {"Name": "client-1", "Addr": "10.0.0.11", "Status": 3}
            ]"#,
        ),
        (Method::GET, "/v1/kv/leader") => (
            StatusCode::OK,
            r#"[{"Key": "leader", "Value": "ZWxlY3Q=", "Session": "abc-123"}]"#,
        ),
        (Method::GET, "/v1/session/info/abc-123") => (
            StatusCode::OK,
            r#"[{"ID": "abc-123", "NodeChecks": ["serfHealth"], "ServiceChecks": [{"ID": "service:confd"}]}]"#,
        ),
        (Method::GET, "/v1/health/service/confd") => (
            StatusCode::OK,
            r#"[
                {"Node": {"Node": "srvnode-1"}, "Checks": [
                    {"CheckID": "serfHealth", "Status": "passing"},
                    {"CheckID": "service:confd", "Status": "passing"}
                ]},
                {"Node": {"Node": "srvnode-2"}, "Checks": [
                    {"CheckID": "serfHealth", "Status": "passing"},
                    {"CheckID": "service:confd", "Status": "critical"}
                ]}
            ]"#,
        ),
        (Method::GET, _) => (StatusCode::NOT_FOUND, ""),
        (Method::PUT, "/v1/txn") => (StatusCode::OK, r#"{"Results": [], "Errors": null}"#),
        (Method::PUT, "/v1/kv/leader") => (StatusCode::OK, "true"),
        (Method::PUT, "/v1/session/destroy/abc-123") => (StatusCode::OK, "true"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "unexpected request"),
    };

    let mut response = Response::new(Body::from(payload));
    (*response.status_mut()) = status;
    Ok(response)
}

#[tokio::test]
async fn test_http_client_reads_cluster_state() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr, _state) = start_stub_agent().await;
    let client = ConsulHttpClient::new(test_helper::http_base_url(addr));

    let leader = client.internal_leader().await?;
    assert_eq!(leader.as_deref(), Some("10.0.0.1:8300"));

    let members = client.ready_members().await?;
    assert_eq!(
        members.into_iter().collect::<Vec<_>>(),
        ["srvnode-1", "srvnode-2"],
        "Only alive members are ready."
    );

    let session = client
        .election_session()
        .await?
        .expect("Leader key holds a session.");
    assert_eq!(session.id, SessionId("abc-123".to_string()));
    assert_eq!(session.bound_check_count, 2);
    assert!(session.is_bound());

    let health = client.service_health("confd").await?;
    assert_eq!(health.len(), 2);
    assert!(health[0].failing_checks().is_empty());
    assert_eq!(health[1].failing_checks().len(), 1);

    let missing = client.service_health("ios").await?;
    assert!(missing.is_empty(), "Unknown service reads as no instances.");

    Ok(())
}

#[tokio::test]
async fn test_http_client_writes() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr, state) = start_stub_agent().await;
    let client = ConsulHttpClient::new(test_helper::http_base_url(addr));

    let mut entries: Vec<KvEntry> = serde_json::from_str(test_helper::KV_DATASET)?;
    let template = entries[1].clone();
    for n in 0..100 {
        entries.push(KvEntry {
            key: format!("bulk/{n}"),
            ..template.clone()
        });
    }
    client.kv_import(&entries).await?;
    client.trigger_election("elect1234").await?;
    client.destroy_session(&SessionId("abc-123".to_string())).await?;

    let requests = std::mem::take(&mut state.lock().requests);
    let txns = requests
        .iter()
        .filter(|(method, path, _)| method == Method::PUT && path == "/v1/txn")
        .collect::<Vec<_>>();
    assert_eq!(txns.len(), 2, "103 entries span two transactions.");

    let first: serde_json::Value = serde_json::from_slice(&txns[0].2)?;
    assert_eq!(first.as_array().map(Vec::len), Some(64));
    assert_eq!(first[1]["KV"]["Verb"], "set");
    assert_eq!(first[1]["KV"]["Key"], "epoch");
    assert_eq!(first[1]["KV"]["Value"], "MQ==");

    let trigger = requests
        .iter()
        .find(|(method, path, _)| method == Method::PUT && path == "/v1/kv/leader")
        .expect("Election trigger was written.");
    assert_eq!(trigger.2, b"elect1234");

    Ok(())
}

#[tokio::test]
async fn test_http_client_surfaces_errors() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr, _state) = start_stub_agent().await;
    let client = ConsulHttpClient::new(test_helper::http_base_url(addr));

    let err = client
        .destroy_session(&SessionId("unknown".to_string()))
        .await
        .expect_err("Stub rejects unknown sessions.");
    assert!(matches!(err, ConsulError::Status { status: 500, .. }));

    let unreachable = ConsulHttpClient::new(test_helper::http_base_url(
        test_helper::get_unused_addr(),
    ));
    let err = unreachable
        .ready_members()
        .await
        .expect_err("Nothing listens on the address.");
    assert!(matches!(err, ConsulError::Transport(_)));

    Ok(())
}
