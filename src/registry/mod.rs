//! 服务注册中心
//!
//! [`ServiceRegistry`] 是对外的门面：每个操作在调用时选择后端，
//! 优先级为 外部客户端 > 远端 RPC > 本地存储。
//!
//! - 客户端返回 `Err` 时原样返回给调用方；返回 `false` / `None` / 空集合时改用本地存储
//! - RPC 出现任何错误时记录告警并改用本地存储
//! - 本地存储始终可用

pub mod load_balancer;
pub mod store;
pub mod trait_def;

pub use load_balancer::RoundRobin;
pub use store::InstanceStore;
pub use trait_def::DiscoveryClient;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::discovery::{
    BackendKind, ClientBackend, Deregistration, DiscoveryBackend, InstanceStatus, LocalBackend,
    Metadata, RpcBackend, ServiceInstance,
};
use crate::error::{DiscoveryError, Result};
use crate::events::{DEREGISTER_EVENT, DiscoveryEvent, EventBus, REGISTER_EVENT};
use crate::health::{HealthProber, probe_round};

/// 外部客户端“拒绝处理”的结果
trait Declinable {
    fn declined(&self) -> bool;
}

impl Declinable for bool {
    fn declined(&self) -> bool {
        !*self
    }
}

impl<T> Declinable for Option<T> {
    fn declined(&self) -> bool {
        self.is_none()
    }
}

impl<T> Declinable for Vec<T> {
    fn declined(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Declinable for HashMap<K, V> {
    fn declined(&self) -> bool {
        self.is_empty()
    }
}

impl Declinable for Deregistration {
    fn declined(&self) -> bool {
        !self.removed
    }
}

/// 服务注册中心
///
/// 每个实例拥有独立的存储、轮转计数和健康探测线程。Drop 时停止探测线程并等待其退出。
pub struct ServiceRegistry {
    config: RegistryConfig,
    local: LocalBackend,
    rpc: Option<Arc<RpcBackend>>,
    client: RwLock<Option<Arc<dyn DiscoveryBackend>>>,
    bus: RwLock<Option<Arc<dyn EventBus>>>,
    prober: HealthProber,
}

impl ServiceRegistry {
    /// 创建注册中心并启动健康探测线程
    pub fn new(config: RegistryConfig) -> Self {
        let config = config.normalized();
        let store = Arc::new(InstanceStore::new());
        let prober = HealthProber::spawn(
            store.clone(),
            config.health_check_interval(),
            config.probe_timeout(),
        );
        let rpc = config
            .rpc
            .enabled
            .then(|| Arc::new(RpcBackend::new(&config.rpc)));

        info!(
            heartbeat_timeout_ms = config.heartbeat_timeout_ms,
            health_check_interval_ms = config.health_check_interval_ms,
            rpc_enabled = config.rpc.enabled,
            rpc_endpoint = %config.rpc.endpoint,
            "Service registry created"
        );

        Self {
            local: LocalBackend::new(store, config.heartbeat_timeout_ms),
            rpc,
            client: RwLock::new(None),
            bus: RwLock::new(None),
            prober,
            config,
        }
    }

    /// 从环境变量读取配置并创建注册中心
    pub fn from_env() -> Self {
        Self::new(RegistryConfig::from_env())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// 本地实例存储
    pub fn store(&self) -> &Arc<InstanceStore> {
        self.local.store()
    }

    /// 健康探测线程是否在运行
    pub fn is_probing(&self) -> bool {
        self.prober.is_running()
    }

    /// 当前调用会优先使用的后端
    pub async fn active_backend(&self) -> BackendKind {
        if let Some(client) = self.client.read().await.as_ref() {
            return client.kind();
        }
        match &self.rpc {
            Some(rpc) => rpc.kind(),
            None => self.local.kind(),
        }
    }

    /// 设置外部客户端
    pub async fn set_client(&self, client: Arc<dyn DiscoveryClient>) {
        let backend: Arc<dyn DiscoveryBackend> = Arc::new(ClientBackend::new(client));
        *self.client.write().await = Some(backend);
        info!("Discovery client attached");
    }

    /// 移除外部客户端
    pub async fn clear_client(&self) {
        *self.client.write().await = None;
        info!("Discovery client detached");
    }

    /// 设置事件总线
    pub async fn set_bus(&self, bus: Arc<dyn EventBus>) {
        *self.bus.write().await = Some(bus);
        debug!("Event bus attached");
    }

    /// 移除事件总线
    pub async fn clear_bus(&self) {
        *self.bus.write().await = None;
        debug!("Event bus detached");
    }

    /// 注册实例
    ///
    /// `instance_id` 为空时取 `url`。
    pub async fn register(
        &self,
        name: &str,
        url: &str,
        metadata: Option<Metadata>,
        instance_id: Option<&str>,
    ) -> Result<bool> {
        let mut instance = ServiceInstance::new(name, url);
        if let Some(metadata) = metadata {
            instance = instance.with_metadata_map(metadata);
        }
        if let Some(instance_id) = instance_id {
            instance = instance.with_instance_id(instance_id);
        }
        self.register_instance(instance).await
    }

    /// 注册完整实例记录（可携带健康检查地址）
    pub async fn register_instance(&self, mut instance: ServiceInstance) -> Result<bool> {
        if instance.service_name.is_empty() {
            return Err(DiscoveryError::invalid_parameter("service name is empty"));
        }
        if instance.url.is_empty() {
            return Err(DiscoveryError::invalid_parameter("service url is empty"));
        }
        if instance.instance_id.is_empty() {
            instance.instance_id = instance.url.clone();
        }

        let name = instance.service_name.as_str();
        let record = &instance;
        let registered = match self
            .delegate("register", name, |backend| async move {
                backend.register(record).await
            })
            .await?
        {
            Some(registered) => registered,
            None => self.local.register(record).await?,
        };

        if registered {
            info!(
                service = %instance.service_name,
                instance_id = %instance.instance_id,
                url = %instance.url,
                "Service instance registered"
            );
            self.notify(REGISTER_EVENT, &instance.service_name, &instance.url)
                .await;
        }
        Ok(registered)
    }

    /// 注销实例；`instance_id` 为空时注销整个服务
    pub async fn deregister(&self, name: &str, instance_id: Option<&str>) -> Result<bool> {
        let instance_id = instance_id.filter(|id| !id.is_empty());
        let outcome = match self
            .delegate("deregister", name, |backend| async move {
                backend.deregister(name, instance_id).await
            })
            .await?
        {
            Some(outcome) => outcome,
            None => self.local.deregister(name, instance_id).await?,
        };

        if outcome.removed {
            info!(service = %name, instance_id = ?instance_id, "Service instance deregistered");
        }
        for url in &outcome.urls {
            self.notify(DEREGISTER_EVENT, name, url).await;
        }
        Ok(outcome.removed)
    }

    /// 解析一个可用实例的地址（轮询）
    pub async fn resolve(&self, name: &str) -> Result<Option<String>> {
        if let Some(url) = self
            .delegate("resolve", name, |backend| async move {
                backend.resolve(name).await
            })
            .await?
        {
            return Ok(url);
        }
        self.local.resolve(name).await
    }

    /// 服务名 -> 代表地址
    pub async fn list(&self) -> Result<HashMap<String, String>> {
        if let Some(services) = self
            .delegate("list", "*", |backend| async move { backend.list().await })
            .await?
        {
            return Ok(services);
        }
        self.local.list().await
    }

    /// 服务的全部实例，包括不可用的实例
    pub async fn list_instances(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        if let Some(instances) = self
            .delegate("list_instances", name, |backend| async move {
                backend.list_instances(name).await
            })
            .await?
        {
            return Ok(instances);
        }
        self.local.list_instances(name).await
    }

    /// 心跳；`instance_id` 为空时刷新该服务全部实例
    pub async fn heartbeat(&self, name: &str, instance_id: Option<&str>) -> Result<bool> {
        let instance_id = instance_id.filter(|id| !id.is_empty());
        if let Some(updated) = self
            .delegate("heartbeat", name, |backend| async move {
                backend.heartbeat(name, instance_id).await
            })
            .await?
        {
            return Ok(updated);
        }
        self.local.heartbeat(name, instance_id).await
    }

    /// 设置实例状态（大小写不敏感），非法状态直接返回错误且不修改任何实例
    pub async fn set_status(
        &self,
        name: &str,
        status: &str,
        instance_id: Option<&str>,
    ) -> Result<bool> {
        let status: InstanceStatus = status.parse()?;
        let instance_id = instance_id.filter(|id| !id.is_empty());
        if let Some(updated) = self
            .delegate("set_status", name, |backend| async move {
                backend.set_status(name, status, instance_id).await
            })
            .await?
        {
            return Ok(updated);
        }
        self.local.set_status(name, status, instance_id).await
    }

    /// 立即执行一轮健康探测，返回探测的实例数
    pub async fn probe_now(&self) -> usize {
        probe_round(self.local.store(), self.config.probe_timeout()).await
    }

    /// 把操作交给外部后端
    ///
    /// 返回 `Some` 表示外部后端已给出结果；`None` 表示应由本地存储处理。
    async fn delegate<T, F, Fut>(&self, op: &'static str, service: &str, call: F) -> Result<Option<T>>
    where
        T: Declinable,
        F: FnOnce(Arc<dyn DiscoveryBackend>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = self.client.read().await.clone();
        if let Some(client) = client {
            let kind = client.kind();
            let value = call(client).await?;
            if value.declined() {
                debug!(
                    op,
                    service = %service,
                    backend = %kind,
                    "Discovery client declined, using local store"
                );
                return Ok(None);
            }
            return Ok(Some(value));
        }

        if let Some(rpc) = &self.rpc {
            let backend: Arc<dyn DiscoveryBackend> = rpc.clone();
            return match call(backend).await {
                Ok(value) => Ok(Some(value)),
                Err(err) => {
                    warn!(
                        op,
                        service = %service,
                        backend = %rpc.kind(),
                        endpoint = %rpc.endpoint(),
                        error = %err,
                        "RPC discovery backend failed, falling back to local store"
                    );
                    Ok(None)
                }
            };
        }

        Ok(None)
    }

    /// 尽力发送事件，失败只记录日志
    async fn notify(&self, event: &str, name: &str, url: &str) {
        let bus = self.bus.read().await.clone();
        let Some(bus) = bus else {
            return;
        };

        let payload = DiscoveryEvent::new(name, url);
        if let Err(err) = bus.emit(event, &payload).await {
            warn!(event, service = %name, error = %err, "Failed to emit discovery event");
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
