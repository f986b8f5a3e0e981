//! HTTP 注册中心与 HttpDiscoveryClient 联调测试
#![cfg(feature = "server")]

use flare_discovery::client::http::ApiResponse;
use flare_discovery::server;
use flare_discovery::{
    DiscoveryClient, HttpDiscoveryClient, InstanceStatus, ServiceInstance, ServiceRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

struct TestServer {
    addr: SocketAddr,
    registry: Arc<ServiceRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<flare_discovery::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let registry = Arc::new(ServiceRegistry::default());
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server::serve(listener, registry.clone(), async move {
            let _ = rx.await;
        }));
        Self {
            addr,
            registry,
            shutdown: Some(tx),
            handle,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn client(&self) -> HttpDiscoveryClient {
        HttpDiscoveryClient::new(self.base_url()).unwrap()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        assert_ok!(self.handle.await.unwrap());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_round_trip() {
    let server = TestServer::start().await;
    let client = server.client();

    let instance = ServiceInstance::new("orders", "http://a:8080")
        .with_instance_id("i1")
        .with_metadata("zone", "eu-1");
    assert!(assert_ok!(client.register_instance(&instance).await));
    assert!(assert_ok!(client.register("orders", "http://b:8080").await));

    let first = assert_ok!(client.resolve("orders").await).unwrap();
    let second = assert_ok!(client.resolve("orders").await).unwrap();
    assert_ne!(first, second);
    assert!(assert_ok!(client.list().await).contains_key("orders"));

    let instances = assert_ok!(client.list_instances("orders").await);
    assert_eq!(instances.len(), 2);
    let i1 = instances.iter().find(|i| i.instance_id == "i1").unwrap();
    assert_eq!(i1.metadata.get("zone").map(String::as_str), Some("eu-1"));

    assert!(assert_ok!(client.heartbeat("orders", Some("i1")).await));
    assert!(!assert_ok!(client.heartbeat("orders", Some("missing")).await));
    assert!(assert_ok!(
        client
            .set_status("orders", InstanceStatus::Down, Some("i1"))
            .await
    ));
    assert!(!assert_ok!(
        client
            .set_status("payments", InstanceStatus::Up, None)
            .await
    ));

    assert!(assert_ok!(client.deregister_instance("orders", Some("i1")).await));
    assert!(!assert_ok!(client.deregister_instance("orders", Some("i1")).await));
    assert!(assert_ok!(client.deregister("orders").await));
    assert!(assert_ok!(client.resolve("orders").await).is_none());
    assert!(assert_ok!(server.registry.list().await).is_empty());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_responses() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let base = server.base_url();

    let health: ApiResponse = http
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(health.ok);
    assert_eq!(health.service.as_deref(), Some(server::SERVICE_NAME));

    let response = http
        .post(format!("{}/v1/register", base))
        .json(&serde_json::json!({"service": "orders"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = http
        .get(format!("{}/v1/resolve?service=orders", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: ApiResponse = response.json().await.unwrap();
    assert_eq!(body.error.as_deref(), Some("not found"));

    let response = http
        .get(format!("{}/v1/instances", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    assert_ok!(server.registry.register("orders", "http://a:8080", None, None).await);
    let response = http
        .post(format!("{}/v1/status", base))
        .json(&serde_json::json!({"service": "orders", "status": "BOGUS"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = http
        .post(format!("{}/v1/deregister", base))
        .json(&serde_json::json!({"service": "payments"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_fields_are_trimmed() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();
    let base = server.base_url();

    let response = http
        .post(format!("{}/v1/register", base))
        .json(&serde_json::json!({"service": "   ", "url": "http://a:8080"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = http
        .post(format!("{}/v1/register", base))
        .json(&serde_json::json!({
            "service": "  orders ",
            "url": " http://a:8080 ",
            "instanceId": " i1 ",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let instances = assert_ok!(server.registry.list_instances("orders").await);
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].url, "http://a:8080");
    assert_eq!(instances[0].instance_id, "i1");

    let response = http
        .post(format!("{}/v1/status", base))
        .json(&serde_json::json!({"service": "orders", "status": " down ", "instanceId": "i1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(assert_ok!(server.registry.resolve("orders").await).is_none());

    let response = http
        .post(format!("{}/v1/heartbeat", base))
        .json(&serde_json::json!({"service": " orders", "instanceId": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        assert_ok!(server.registry.resolve("orders").await).as_deref(),
        Some("http://a:8080")
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registry_delegates_to_remote_registry() {
    let server = TestServer::start().await;
    let edge = ServiceRegistry::default();
    edge.set_client(Arc::new(server.client())).await;

    let instance = ServiceInstance::new("orders", "http://a:8080")
        .with_instance_id("i1")
        .with_health_check("/health");
    assert!(assert_ok!(edge.register_instance(instance).await));

    let remote = assert_ok!(server.registry.list_instances("orders").await);
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].health_check_url.as_deref(), Some("/health"));
    assert_eq!(assert_ok!(edge.list_instances("orders").await).len(), 1);
    assert!(edge.store().get("orders").await.is_empty());

    assert_eq!(
        assert_ok!(edge.resolve("orders").await).as_deref(),
        Some("http://a:8080")
    );
    assert!(assert_ok!(edge.deregister("orders", Some("i1")).await));
    assert!(assert_ok!(server.registry.list().await).is_empty());

    drop(edge);
    server.stop().await;
}
