// End-to-end tests for the tape proxy
//
// Each test boots the proxy on an ephemeral port and drives it with a real
// HTTP client; record-mode tests point the proxy at a wiremock stub
// upstream.

use api_tape::{derive_key, Mode, ProxyConfig, Tape, TapeMetrics, TapeProxy, TapeStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Boot a proxy on an ephemeral port; returns its base URL and its metrics
/// handle.
async fn start_proxy(mode: Mode, target: &str, dir: &Path) -> (String, Arc<TapeMetrics>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ProxyConfig {
        target: target.to_string(),
        port: addr.port(),
        mode,
        dir: dir.to_path_buf(),
    };
    config.validate().unwrap();

    let proxy = Arc::new(TapeProxy::new(Arc::new(config)).unwrap());
    let metrics = proxy.metrics();
    tokio::spawn(async move { proxy.serve(listener).await });

    // Give the accept loop a moment to come up
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{}", addr), metrics)
}

#[tokio::test]
async fn record_then_replay_equivalence() {
    let upstream = MockServer::start().await;
    let body: Vec<u8> = vec![0x89, 0x50, 0x4e, 0x47, 0x00, 0xff, 0x7b, 0x22];

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Upstream", "yes")
                .insert_header("Content-Type", "application/octet-stream")
                .set_body_bytes(body.clone()),
        )
        .mount(&upstream)
        .await;

    let tapes = tempfile::TempDir::new().unwrap();
    let client = reqwest::Client::new();

    // Record pass: response mirrors the upstream and persists a tape
    let (recorder, recorder_metrics) = start_proxy(Mode::Record, &upstream.uri(), tapes.path()).await;
    let recorded = client
        .get(format!("{}/users?page=2", recorder))
        .send()
        .await
        .unwrap();

    assert_eq!(recorded.status(), 200);
    assert_eq!(recorded.headers()["X-Upstream"], "yes");
    assert!(recorded.headers().get("X-Api-Tape").is_none());
    assert_eq!(recorded.bytes().await.unwrap().as_ref(), body.as_slice());

    let key = derive_key("GET", "/users?page=2");
    let store = TapeStore::new(tapes.path());
    let tape = store.read(&key).await.unwrap().expect("tape persisted");
    assert_eq!(tape.status_code, 200);
    assert_eq!(tape.body, body);
    assert_eq!(tape.meta.method, "GET");
    assert_eq!(tape.meta.url, "/users?page=2");

    // Replay pass: identical request, upstream never contacted
    let (replayer, replayer_metrics) = start_proxy(Mode::Replay, "http://127.0.0.1:9", tapes.path()).await;
    let replayed = client
        .get(format!("{}/users?page=2", replayer))
        .send()
        .await
        .unwrap();

    assert_eq!(replayed.status(), 200);
    assert_eq!(replayed.headers()["X-Upstream"], "yes");
    assert_eq!(replayed.headers()["X-Api-Tape"], "Replayed");
    assert_eq!(replayed.bytes().await.unwrap().as_ref(), body.as_slice());

    assert_eq!(recorder_metrics.snapshot().recorded, 1);
    assert_eq!(replayer_metrics.snapshot().replay_hits, 1);
}

#[tokio::test]
async fn replay_miss_names_method_and_path() {
    let tapes = tempfile::TempDir::new().unwrap();
    let (proxy, metrics) = start_proxy(Mode::Replay, "http://127.0.0.1:9", tapes.path()).await;

    let response = reqwest::Client::new()
        .get(format!("{}/missing/resource", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let text = response.text().await.unwrap();
    assert!(text.contains("GET"));
    assert!(text.contains("/missing/resource"));
    assert_eq!(metrics.snapshot().replay_misses, 1);
}

#[tokio::test]
async fn replay_corrupted_tape_is_500() {
    let tapes = tempfile::TempDir::new().unwrap();
    let store = TapeStore::new(tapes.path());
    let key = derive_key("GET", "/broken");
    tokio::fs::write(store.tape_path(&key), b"not json")
        .await
        .unwrap();

    let (proxy, metrics) = start_proxy(Mode::Replay, "http://127.0.0.1:9", tapes.path()).await;
    let response = reqwest::Client::new()
        .get(format!("{}/broken", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert!(response.text().await.unwrap().contains("Corrupted"));
    assert_eq!(metrics.snapshot().replay_corrupted, 1);
}

#[tokio::test]
async fn record_upstream_failure_is_502_and_writes_nothing() {
    let tapes = tempfile::TempDir::new().unwrap();

    // Discard port: connections are refused before any response
    let (proxy, metrics) = start_proxy(Mode::Record, "http://127.0.0.1:9", tapes.path()).await;
    let response = reqwest::Client::new()
        .get(format!("{}/unreachable", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    assert!(response.text().await.unwrap().contains("Proxy Error"));

    let key = derive_key("GET", "/unreachable");
    assert!(!TapeStore::new(tapes.path()).exists(&key).await);
    assert_eq!(metrics.snapshot().upstream_failures, 1);
}

#[tokio::test]
async fn record_preserves_upstream_error_statuses() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&upstream)
        .await;

    let tapes = tempfile::TempDir::new().unwrap();
    let (recorder, _) = start_proxy(Mode::Record, &upstream.uri(), tapes.path()).await;
    let client = reqwest::Client::new();

    let recorded = client
        .get(format!("{}/flaky", recorder))
        .send()
        .await
        .unwrap();
    assert_eq!(recorded.status(), 503);

    // The 503 is a captured exchange like any other and replays verbatim
    let (replayer, _) = start_proxy(Mode::Replay, "http://127.0.0.1:9", tapes.path()).await;
    let replayed = client
        .get(format!("{}/flaky", replayer))
        .send()
        .await
        .unwrap();
    assert_eq!(replayed.status(), 503);
    assert_eq!(replayed.headers()["X-Api-Tape"], "Replayed");
    assert_eq!(replayed.text().await.unwrap(), "unavailable");
}

#[tokio::test]
async fn record_forwards_method_and_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_string("{\"item\":\"book\"}"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&upstream)
        .await;

    let tapes = tempfile::TempDir::new().unwrap();
    let (recorder, _) = start_proxy(Mode::Record, &upstream.uri(), tapes.path()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/orders", recorder))
        .body("{\"item\":\"book\"}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(response.text().await.unwrap(), "created");
    assert!(TapeStore::new(tapes.path())
        .exists(&derive_key("POST", "/orders"))
        .await);
}

#[tokio::test]
async fn tape_write_failure_still_serves_upstream_response() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_string("live data"))
        .mount(&upstream)
        .await;

    // The configured tape "directory" is a regular file, so every
    // persistence attempt fails
    let scratch = tempfile::TempDir::new().unwrap();
    let blocked = scratch.path().join("tapes");
    tokio::fs::write(&blocked, b"").await.unwrap();

    let (proxy, metrics) = start_proxy(Mode::Record, &upstream.uri(), &blocked).await;
    let response = reqwest::Client::new()
        .get(format!("{}/profile", proxy))
        .send()
        .await
        .unwrap();

    // Recording is best-effort: the caller still gets the real upstream
    // result even though nothing could be persisted
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "live data");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.tape_write_failures, 1);
    assert_eq!(snapshot.recorded, 0);
    assert_eq!(snapshot.upstream_failures, 0);

    assert!(!TapeStore::new(&blocked)
        .exists(&derive_key("GET", "/profile"))
        .await);
}

#[tokio::test]
async fn matching_is_by_method_and_path_only() {
    let tapes = tempfile::TempDir::new().unwrap();
    let store = TapeStore::new(tapes.path());

    // Seed a tape for POST /submit directly
    let tape = Tape::capture(
        "/submit",
        "POST",
        200,
        std::collections::HashMap::new(),
        b"accepted".to_vec(),
    );
    store
        .write(&derive_key("POST", "/submit"), &tape)
        .await
        .unwrap();

    let (proxy, _) = start_proxy(Mode::Replay, "http://127.0.0.1:9", tapes.path()).await;
    let client = reqwest::Client::new();

    // Same path with the recorded method replays
    let hit = client
        .post(format!("{}/submit", proxy))
        .body("a completely different request body")
        .send()
        .await
        .unwrap();
    assert_eq!(hit.status(), 200);
    assert_eq!(hit.text().await.unwrap(), "accepted");

    // Same path with another method misses
    let miss = client
        .get(format!("{}/submit", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(miss.status(), 404);
}

#[tokio::test]
async fn rerecording_overwrites_the_tape() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v2"))
        .mount(&upstream)
        .await;

    let tapes = tempfile::TempDir::new().unwrap();
    let (recorder, _) = start_proxy(Mode::Record, &upstream.uri(), tapes.path()).await;
    let client = reqwest::Client::new();

    let first = client
        .get(format!("{}/version", recorder))
        .send()
        .await
        .unwrap();
    assert_eq!(first.text().await.unwrap(), "v1");

    let second = client
        .get(format!("{}/version", recorder))
        .send()
        .await
        .unwrap();
    assert_eq!(second.text().await.unwrap(), "v2");

    // The tape now holds the latest capture
    let tape = TapeStore::new(tapes.path())
        .read(&derive_key("GET", "/version"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tape.body, b"v2");
}
