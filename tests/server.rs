//! End-to-end over a real socket, including graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use competition_portal::config::PortalConfig;
use competition_portal::lifecycle::Shutdown;
use competition_portal::security::access_control::Role;
use competition_portal::store::memory::MemoryStore;
use competition_portal::HttpServer;

#[tokio::test]
async fn test_serves_and_shuts_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store = Arc::new(MemoryStore::new());
    store.add_user("live-admin", "44444444-4444-4444-8444-444444444444", "ops@example.com", Role::Admin);

    let mut config = PortalConfig::default();
    config.gate.rate_limit.max_requests = 3;
    config.gate.rate_limit.sweep_interval_secs = 1;

    let server = HttpServer::new(config.clone(), store.clone(), store.clone());
    let shutdown = Shutdown::new();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, updates_rx, shutdown.subscribe()));

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let base = format!("http://{}", addr);

    let res = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let res = client
        .post(format!("{}/api/competitions", base))
        .bearer_auth("live-admin")
        .json(&serde_json::json!({ "title": "Live Quiz" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let res = client.get(format!("{}/admin", base)).send().await.unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()["location"], "/login");

    // Loosen the limit through the reload channel.
    config.gate.rate_limit.max_requests = 50;
    updates_tx.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    for _ in 0..5 {
        let res = client.get(format!("{}/api/competitions", base)).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    drop(client);
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
