//! 外部客户端后端

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::{BackendKind, Deregistration, DiscoveryBackend};
use crate::discovery::{InstanceStatus, ServiceInstance};
use crate::error::Result;
use crate::registry::DiscoveryClient;

/// 把 [`DiscoveryClient`] 适配为后端，参数和返回值原样转发
pub struct ClientBackend {
    client: Arc<dyn DiscoveryClient>,
}

impl ClientBackend {
    pub fn new(client: Arc<dyn DiscoveryClient>) -> Self {
        Self { client }
    }

    /// 注销前尽力查出被注销实例的地址，查询失败不影响注销
    async fn known_urls(&self, service: &str, instance_id: Option<&str>) -> Vec<String> {
        match instance_id {
            Some(id) => self
                .client
                .list_instances(service)
                .await
                .unwrap_or_default()
                .into_iter()
                .filter(|instance| instance.instance_id == id)
                .map(|instance| instance.url)
                .collect(),
            None => self
                .client
                .resolve(service)
                .await
                .ok()
                .flatten()
                .into_iter()
                .collect(),
        }
    }
}

#[async_trait]
impl DiscoveryBackend for ClientBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Client
    }

    async fn register(&self, instance: &ServiceInstance) -> Result<bool> {
        self.client.register_instance(instance).await
    }

    async fn deregister(&self, service: &str, instance_id: Option<&str>) -> Result<Deregistration> {
        let urls = self.known_urls(service, instance_id).await;
        let removed = self.client.deregister_instance(service, instance_id).await?;
        Ok(if removed {
            Deregistration::removed(urls)
        } else {
            Deregistration::none()
        })
    }

    async fn resolve(&self, service: &str) -> Result<Option<String>> {
        self.client.resolve(service).await
    }

    async fn list(&self) -> Result<HashMap<String, String>> {
        self.client.list().await
    }

    async fn list_instances(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        self.client.list_instances(service).await
    }

    async fn heartbeat(&self, service: &str, instance_id: Option<&str>) -> Result<bool> {
        self.client.heartbeat(service, instance_id).await
    }

    async fn set_status(
        &self,
        service: &str,
        status: InstanceStatus,
        instance_id: Option<&str>,
    ) -> Result<bool> {
        self.client.set_status(service, status, instance_id).await
    }
}
