//! End-to-end tests: client → proxy → mock upstream.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use response_override::config::{BodyMode, OverrideRule};

mod common;

use common::MockResponse;

fn rule(from: &[u16], to: u16, body: &str, mode: BodyMode) -> OverrideRule {
    OverrideRule {
        from: from.to_vec(),
        to,
        headers: BTreeMap::new(),
        remove_headers: Vec::new(),
        body: body.to_string(),
        mode,
    }
}

#[tokio::test]
async fn test_matching_response_is_rewritten() {
    let backend_addr: SocketAddr = "127.0.0.1:28381".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28382".parse().unwrap();

    common::start_mock_backend(
        backend_addr,
        MockResponse::new(503, "Client response body")
            .header("Server", "dummy server")
            .header("X-Foo", "initial"),
    )
    .await;

    let json = r#"{"status": "ok", "msg": "Test override"}"#;
    let mut override_rule = rule(&[503], 500, json, BodyMode::Replace);
    override_rule
        .headers
        .insert("Content-Type".into(), vec!["application/json".into()]);
    override_rule
        .headers
        .insert("X-Foo".into(), vec!["bar".into(), "baz".into()]);

    let shutdown = common::start_proxy(proxy_addr, backend_addr, vec![override_rule], false).await;

    let res = common::client()
        .get(format!("http://{}/api/items", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 500);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.headers()["server"], "dummy server");
    assert_eq!(res.headers()["content-length"], json.len().to_string());
    let foo: Vec<_> = res
        .headers()
        .get_all("x-foo")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(foo, vec!["bar", "baz"]);
    assert!(res.headers().get("x-applied-override").is_none());
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(res.text().await.unwrap(), json);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unmatched_response_passes_through() {
    let backend_addr: SocketAddr = "127.0.0.1:28481".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28482".parse().unwrap();

    common::start_mock_backend(
        backend_addr,
        MockResponse::new(200, "all good").header("X-Upstream", "yes"),
    )
    .await;
    let shutdown = common::start_proxy(
        proxy_addr,
        backend_addr,
        vec![rule(&[500], 200, "masked", BodyMode::Replace)],
        true,
    )
    .await;

    let res = common::client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-upstream"], "yes");
    assert_eq!(res.headers()["content-length"], "8");
    assert!(res.headers().get("x-applied-override").is_none());
    assert_eq!(res.text().await.unwrap(), "all good");

    shutdown.trigger();
}

#[tokio::test]
async fn test_chained_rules_and_marker() {
    let backend_addr: SocketAddr = "127.0.0.1:28581".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28582".parse().unwrap();

    common::start_mock_backend(backend_addr, MockResponse::new(500, "Client response\n")).await;
    let shutdown = common::start_proxy(
        proxy_addr,
        backend_addr,
        vec![
            rule(&[500], 400, "First\n", BodyMode::Replace),
            rule(&[500], 404, "Second\n", BodyMode::Append),
        ],
        true,
    )
    .await;

    let res = common::client()
        .post(format!("http://{}/submit?x=1", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 404);
    assert_eq!(res.headers()["x-applied-override"], "test-proxy");
    assert_eq!(res.text().await.unwrap(), "First\nSecond\n");

    shutdown.trigger();
}

#[tokio::test]
async fn test_each_request_is_rewritten_independently() {
    let backend_addr: SocketAddr = "127.0.0.1:28681".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28682".parse().unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    common::start_programmable_backend(backend_addr, move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                MockResponse::new(502, "bad gateway")
            } else {
                MockResponse::new(200, "fine")
            }
        }
    })
    .await;

    let shutdown = common::start_proxy(
        proxy_addr,
        backend_addr,
        vec![rule(&[502], 503, "[retry later] ", BodyMode::Prepend)],
        false,
    )
    .await;

    let client = common::client();
    let mut rewritten = 0;
    let mut untouched = 0;
    for _ in 0..6 {
        let res = client
            .get(format!("http://{}/", proxy_addr))
            .send()
            .await
            .expect("Proxy unreachable");
        match res.status().as_u16() {
            503 => {
                assert_eq!(res.text().await.unwrap(), "[retry later] bad gateway");
                rewritten += 1;
            }
            200 => {
                assert_eq!(res.text().await.unwrap(), "fine");
                untouched += 1;
            }
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(rewritten, 3);
    assert_eq!(untouched, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_can_be_masked() {
    // Nothing listens on the upstream port: the proxy answers 502 itself,
    // which the rules then rewrite like any upstream response.
    let backend_addr: SocketAddr = "127.0.0.1:28781".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28782".parse().unwrap();

    let shutdown = common::start_proxy(
        proxy_addr,
        backend_addr,
        vec![rule(&[502], 503, "Service is down for maintenance", BodyMode::Replace)],
        false,
    )
    .await;

    let res = common::client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "Service is down for maintenance");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unsupported_mode_returns_500() {
    let backend_addr: SocketAddr = "127.0.0.1:28881".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28882".parse().unwrap();

    common::start_mock_backend(backend_addr, MockResponse::new(404, "missing")).await;
    let shutdown = common::start_proxy(
        proxy_addr,
        backend_addr,
        vec![rule(&[404], 200, "found", BodyMode::from("shuffle"))],
        false,
    )
    .await;

    let res = common::client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "Internal Server Error");

    shutdown.trigger();
}
