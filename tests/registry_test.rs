//! 注册中心本地后端与委托行为测试

use async_trait::async_trait;
use flare_discovery::{
    BroadcastEventBus, DEREGISTER_EVENT, DiscoveryClient, DiscoveryError, DiscoveryEvent,
    EventBus, InstanceStatus, Metadata, REGISTER_EVENT, RegistryConfig, ServiceInstance,
    ServiceRegistry,
};
use flare_discovery::utils::now_ms;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_test::{assert_err, assert_ok};

async fn registry_with_orders() -> ServiceRegistry {
    let registry = ServiceRegistry::default();
    assert_ok!(registry.register("orders", "http://a:8080", None, Some("i1")).await);
    assert_ok!(registry.register("orders", "http://b:8080", None, Some("i2")).await);
    registry
}

/// 对所有操作都拒绝处理的客户端
#[derive(Default)]
struct RefusingClient {
    calls: AtomicUsize,
}

#[async_trait]
impl DiscoveryClient for RefusingClient {
    async fn register(&self, _name: &str, _url: &str) -> flare_discovery::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    async fn deregister(&self, _name: &str) -> flare_discovery::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    async fn resolve(&self, _name: &str) -> flare_discovery::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn list(&self) -> flare_discovery::Result<HashMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HashMap::new())
    }
}

/// 所有操作都返回错误的客户端
struct BrokenClient;

#[async_trait]
impl DiscoveryClient for BrokenClient {
    async fn register(&self, _name: &str, _url: &str) -> flare_discovery::Result<bool> {
        Err(DiscoveryError::client("register unavailable"))
    }

    async fn deregister(&self, _name: &str) -> flare_discovery::Result<bool> {
        Err(DiscoveryError::client("deregister unavailable"))
    }

    async fn resolve(&self, _name: &str) -> flare_discovery::Result<Option<String>> {
        Err(DiscoveryError::client("resolve unavailable"))
    }

    async fn list(&self) -> flare_discovery::Result<HashMap<String, String>> {
        Err(DiscoveryError::client("list unavailable"))
    }
}

/// 始终返回固定地址的客户端
struct StaticClient;

#[async_trait]
impl DiscoveryClient for StaticClient {
    async fn register(&self, _name: &str, _url: &str) -> flare_discovery::Result<bool> {
        Ok(true)
    }

    async fn deregister(&self, _name: &str) -> flare_discovery::Result<bool> {
        Ok(true)
    }

    async fn resolve(&self, _name: &str) -> flare_discovery::Result<Option<String>> {
        Ok(Some("http://remote:9000".to_string()))
    }

    async fn list(&self) -> flare_discovery::Result<HashMap<String, String>> {
        Ok(HashMap::from([(
            "orders".to_string(),
            "http://remote:9000".to_string(),
        )]))
    }
}

struct FailingBus;

#[async_trait]
impl EventBus for FailingBus {
    async fn emit(&self, _event: &str, _payload: &DiscoveryEvent) -> flare_discovery::Result<()> {
        Err(DiscoveryError::EventBus("bus offline".to_string()))
    }
}

#[tokio::test]
async fn test_reregister_same_instance_overwrites() {
    let registry = registry_with_orders().await;
    assert_ok!(registry.register("orders", "http://c:8080", None, Some("i1")).await);

    let instances = assert_ok!(registry.list_instances("orders").await);
    assert_eq!(instances.len(), 2);
    let i1 = instances.iter().find(|i| i.instance_id == "i1").unwrap();
    assert_eq!(i1.url, "http://c:8080");
}

#[tokio::test]
async fn test_instance_id_defaults_to_url() {
    let registry = ServiceRegistry::default();
    assert!(assert_ok!(registry.register("orders", "http://a:8080", None, None).await));
    assert!(assert_ok!(registry.register("orders", "http://a:8080", None, Some("")).await));

    let instances = assert_ok!(registry.list_instances("orders").await);
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].instance_id, "http://a:8080");
    assert_eq!(instances[0].status, InstanceStatus::Up);
}

#[tokio::test]
async fn test_metadata_is_kept() {
    let registry = ServiceRegistry::default();
    let metadata: Metadata = HashMap::from([("zone".to_string(), "eu-1".to_string())]);
    assert_ok!(registry.register("orders", "http://a:8080", Some(metadata), None).await);

    let instances = assert_ok!(registry.list_instances("orders").await);
    assert_eq!(instances[0].metadata.get("zone").map(String::as_str), Some("eu-1"));
}

#[tokio::test]
async fn test_empty_name_or_url_is_rejected() {
    let registry = ServiceRegistry::default();
    let err = assert_err!(registry.register("", "http://a:8080", None, None).await);
    assert!(err.is_validation());
    let err = assert_err!(registry.register("orders", "", None, None).await);
    assert!(err.is_validation());
    assert!(assert_ok!(registry.list().await).is_empty());
}

#[tokio::test]
async fn test_removing_last_instance_drops_service() {
    let registry = registry_with_orders().await;

    assert!(assert_ok!(registry.deregister("orders", Some("i1")).await));
    assert!(assert_ok!(registry.list().await).contains_key("orders"));

    assert!(assert_ok!(registry.deregister("orders", Some("i2")).await));
    assert!(!assert_ok!(registry.list().await).contains_key("orders"));
    assert_eq!(registry.store().service_count().await, 0);
    assert_eq!(registry.store().rotation_count().await, 0);

    assert!(!assert_ok!(registry.deregister("orders", Some("i2")).await));
}

#[tokio::test]
async fn test_deregister_without_id_removes_all() {
    let registry = registry_with_orders().await;
    assert!(assert_ok!(registry.deregister("orders", None).await));
    assert!(assert_ok!(registry.list_instances("orders").await).is_empty());
    assert!(assert_ok!(registry.resolve("orders").await).is_none());
}

#[tokio::test]
async fn test_round_robin_example_scenario() {
    let registry = registry_with_orders().await;
    assert!(assert_ok!(registry.heartbeat("orders", Some("i1")).await));
    assert!(assert_ok!(registry.heartbeat("orders", Some("i2")).await));

    let first = assert_ok!(registry.resolve("orders").await);
    let second = assert_ok!(registry.resolve("orders").await);
    assert_eq!(first.as_deref(), Some("http://a:8080"));
    assert_eq!(second.as_deref(), Some("http://b:8080"));
}

#[tokio::test]
async fn test_round_robin_visits_every_instance_once_per_cycle() {
    let registry = ServiceRegistry::default();
    for i in 0..4 {
        let url = format!("http://node-{}:8080", i);
        assert_ok!(registry.register("orders", &url, None, None).await);
    }

    for _ in 0..3 {
        let mut seen = HashSet::new();
        for _ in 0..4 {
            let url = assert_ok!(registry.resolve("orders").await).unwrap();
            assert!(seen.insert(url));
        }
        assert_eq!(seen.len(), 4);
    }
}

#[tokio::test]
async fn test_stale_instance_is_listed_but_not_resolved() {
    let registry = ServiceRegistry::default();
    let timeout = registry.config().heartbeat_timeout_ms as i64;
    let stale = ServiceInstance::new("orders", "http://a:8080")
        .with_status(InstanceStatus::Up)
        .with_last_heartbeat(now_ms() - timeout - 1_000);
    registry.store().put(stale).await;

    assert!(assert_ok!(registry.resolve("orders").await).is_none());
    assert_eq!(assert_ok!(registry.list_instances("orders").await).len(), 1);

    assert!(assert_ok!(registry.heartbeat("orders", None).await));
    assert_eq!(
        assert_ok!(registry.resolve("orders").await).as_deref(),
        Some("http://a:8080")
    );
}

#[tokio::test]
async fn test_huge_heartbeat_timeout_still_resolves() {
    let config = RegistryConfig::from_lookup(|key| {
        (key == "DISCOVERY_HEARTBEAT_TIMEOUT_MS").then(|| u64::MAX.to_string())
    });
    let registry = ServiceRegistry::new(config);
    assert_ok!(registry.register("orders", "http://a:8080", None, None).await);

    assert_eq!(
        assert_ok!(registry.resolve("orders").await).as_deref(),
        Some("http://a:8080")
    );
}

#[tokio::test]
async fn test_set_status_controls_eligibility() {
    let registry = registry_with_orders().await;

    assert!(assert_ok!(registry.set_status("orders", "down", Some("i1")).await));
    for _ in 0..3 {
        assert_eq!(
            assert_ok!(registry.resolve("orders").await).as_deref(),
            Some("http://b:8080")
        );
    }

    assert!(assert_ok!(registry.set_status("orders", "Out_Of_Service", None).await));
    assert!(assert_ok!(registry.resolve("orders").await).is_none());

    let instances = assert_ok!(registry.list_instances("orders").await);
    assert!(instances
        .iter()
        .all(|i| i.status == InstanceStatus::OutOfService));

    assert!(!assert_ok!(registry.set_status("orders", "UP", Some("missing")).await));
    assert!(!assert_ok!(registry.set_status("unknown", "UP", None).await));
}

#[tokio::test]
async fn test_invalid_status_is_rejected_without_changes() {
    let registry = registry_with_orders().await;

    let err = assert_err!(registry.set_status("orders", "BOGUS", None).await);
    assert!(matches!(err, DiscoveryError::InvalidStatus(_)));

    let instances = assert_ok!(registry.list_instances("orders").await);
    assert!(instances.iter().all(|i| i.status == InstanceStatus::Up));
}

#[tokio::test]
async fn test_heartbeat_unknown_is_false() {
    let registry = registry_with_orders().await;
    assert!(!assert_ok!(registry.heartbeat("orders", Some("i9")).await));
    assert!(!assert_ok!(registry.heartbeat("payments", None).await));
}

#[tokio::test]
async fn test_refusing_client_falls_back_to_local() {
    let registry = ServiceRegistry::default();
    let client = Arc::new(RefusingClient::default());
    registry.set_client(client.clone()).await;

    assert!(assert_ok!(registry.register("orders", "http://a:8080", None, None).await));
    assert_eq!(
        assert_ok!(registry.resolve("orders").await).as_deref(),
        Some("http://a:8080")
    );
    assert!(assert_ok!(registry.list().await).contains_key("orders"));
    assert!(client.calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_client_errors_are_propagated() {
    let registry = ServiceRegistry::default();
    registry.set_client(Arc::new(BrokenClient)).await;

    let err = assert_err!(registry.register("orders", "http://a:8080", None, None).await);
    assert!(matches!(err, DiscoveryError::Client(_)));
    assert_err!(registry.resolve("orders").await);

    registry.clear_client().await;
    assert!(assert_ok!(registry.list().await).is_empty());
}

#[tokio::test]
async fn test_client_results_take_priority() {
    let registry = ServiceRegistry::default();
    assert_ok!(registry.register("orders", "http://local:8080", None, None).await);
    registry.set_client(Arc::new(StaticClient)).await;

    assert_eq!(
        assert_ok!(registry.resolve("orders").await).as_deref(),
        Some("http://remote:9000")
    );
    let instances = assert_ok!(registry.list_instances("orders").await);
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].url, "http://remote:9000");
}

#[tokio::test]
async fn test_register_and_deregister_emit_events() {
    let registry = ServiceRegistry::default();
    let bus = Arc::new(BroadcastEventBus::new(16));
    let mut events = bus.subscribe();
    registry.set_bus(bus.clone()).await;

    assert_ok!(registry.register("orders", "http://a:8080", None, Some("i1")).await);
    let message = assert_ok!(events.recv().await);
    assert_eq!(message.event, REGISTER_EVENT);
    assert_eq!(message.payload, DiscoveryEvent::new("orders", "http://a:8080"));

    assert!(!assert_ok!(registry.deregister("orders", Some("i2")).await));
    assert!(events.try_recv().is_err());

    assert!(assert_ok!(registry.deregister("orders", Some("i1")).await));
    let message = assert_ok!(events.recv().await);
    assert_eq!(message.event, DEREGISTER_EVENT);
    assert_eq!(message.payload.url, "http://a:8080");

    registry.clear_bus().await;
    assert_ok!(registry.register("orders", "http://b:8080", None, None).await);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failing_bus_does_not_affect_operations() {
    let registry = ServiceRegistry::default();
    registry.set_bus(Arc::new(FailingBus)).await;

    assert!(assert_ok!(registry.register("orders", "http://a:8080", None, None).await));
    assert!(assert_ok!(registry.deregister("orders", None).await));
}

#[tokio::test]
async fn test_registries_are_isolated() {
    let first = ServiceRegistry::default();
    let second = ServiceRegistry::default();
    assert_ok!(first.register("orders", "http://a:8080", None, None).await);

    assert!(assert_ok!(second.resolve("orders").await).is_none());
    assert!(assert_ok!(second.list().await).is_empty());
}
