//! 本地内存后端

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{BackendKind, Deregistration, DiscoveryBackend};
use crate::discovery::{InstanceStatus, ServiceInstance};
use crate::error::Result;
use crate::registry::InstanceStore;
use crate::utils::now_ms;

/// 本地后端：实例存储 + 心跳新鲜度 + 轮询选择
///
/// 始终可用，既是默认后端，也是其他后端拒绝或失败时的兜底。
#[derive(Debug, Clone)]
pub struct LocalBackend {
    store: Arc<InstanceStore>,
    heartbeat_timeout_ms: u64,
}

impl LocalBackend {
    pub fn new(store: Arc<InstanceStore>, heartbeat_timeout_ms: u64) -> Self {
        Self {
            store,
            heartbeat_timeout_ms,
        }
    }

    pub fn store(&self) -> &Arc<InstanceStore> {
        &self.store
    }
}

#[async_trait]
impl DiscoveryBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn register(&self, instance: &ServiceInstance) -> Result<bool> {
        let record = instance
            .clone()
            .with_status(InstanceStatus::Up)
            .with_last_heartbeat(now_ms());
        debug!(
            service = %record.service_name,
            instance_id = %record.instance_id,
            url = %record.url,
            "Instance stored"
        );
        self.store.put(record).await;
        Ok(true)
    }

    async fn deregister(&self, service: &str, instance_id: Option<&str>) -> Result<Deregistration> {
        let removed = self.store.remove(service, instance_id).await;
        Ok(Deregistration::from(removed))
    }

    async fn resolve(&self, service: &str) -> Result<Option<String>> {
        let selected = self
            .store
            .select(service, now_ms(), self.heartbeat_timeout_ms)
            .await;
        Ok(selected.map(|instance| instance.url))
    }

    async fn list(&self) -> Result<HashMap<String, String>> {
        Ok(self.store.list().await)
    }

    async fn list_instances(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        Ok(self.store.get(service).await)
    }

    async fn heartbeat(&self, service: &str, instance_id: Option<&str>) -> Result<bool> {
        Ok(self.store.heartbeat(service, instance_id, now_ms()).await)
    }

    async fn set_status(
        &self,
        service: &str,
        status: InstanceStatus,
        instance_id: Option<&str>,
    ) -> Result<bool> {
        Ok(self.store.set_status(service, status, instance_id).await)
    }
}
