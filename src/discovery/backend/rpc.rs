//! 远端 RPC 注册中心后端
//!
//! 通道在首次调用时延迟创建。每次调用都受截止时间约束，超时、传输错误以及
//! 带错误信息的 `ok=false` 响应都以 `Err` 返回，由注册中心决定回退。
//! 注册没有“未找到”的情形，任何 `ok=false` 都视为远端失败。

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::OnceCell;
use tonic::transport::Channel;
use tonic::{Response, Status};
use tracing::debug;

use super::{BackendKind, Deregistration, DiscoveryBackend};
use crate::client::{ClientBuilder, ClientConfig};
use crate::config::RpcConfig;
use crate::discovery::{InstanceStatus, ServiceInstance};
use crate::error::{DiscoveryError, Result};
use crate::proto::{
    DeregisterRequest, DiscoveryServiceClient, HeartbeatRequest, InstanceRecord,
    ListInstancesRequest, ListServicesRequest, RegisterRequest, ResolveRequest, SetStatusRequest,
};

/// 远端 RPC 后端
pub struct RpcBackend {
    config: ClientConfig,
    channel: OnceCell<Channel>,
}

impl RpcBackend {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            config: ClientConfig::from(config.clone()),
            channel: OnceCell::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.address
    }

    async fn client(&self) -> Result<DiscoveryServiceClient> {
        let channel = self
            .channel
            .get_or_try_init(|| async {
                debug!(endpoint = %self.config.address, "Creating discovery RPC channel");
                ClientBuilder::from_config(self.config.clone()).build_lazy()
            })
            .await?;
        Ok(DiscoveryServiceClient::new(channel.clone()))
    }

    async fn call<T, F, Fut>(&self, method: &'static str, call: F) -> Result<T>
    where
        F: FnOnce(DiscoveryServiceClient) -> Fut,
        Fut: Future<Output = std::result::Result<Response<T>, Status>>,
    {
        let client = self.client().await?;
        match tokio::time::timeout(self.config.timeout, call(client)).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => {
                debug!(method, code = ?status.code(), "Discovery RPC failed");
                Err(status.into())
            }
            Err(_) => Err(DiscoveryError::RpcTimeout(self.config.timeout)),
        }
    }
}

/// `ok=false` 且错误为空表示未找到；错误非空表示远端失败
fn check_reply(method: &str, ok: bool, error: String) -> Result<bool> {
    if ok {
        Ok(true)
    } else if error.is_empty() {
        Ok(false)
    } else {
        Err(DiscoveryError::Remote(format!("{}: {}", method, error)))
    }
}

/// 必须被远端接受的操作：任何 `ok=false` 都是失败
fn check_accepted(method: &str, ok: bool, error: String) -> Result<()> {
    if ok {
        return Ok(());
    }
    let reason = if error.is_empty() {
        "rejected".to_string()
    } else {
        error
    };
    Err(DiscoveryError::Remote(format!("{}: {}", method, reason)))
}

fn id_or_empty(instance_id: Option<&str>) -> String {
    instance_id.unwrap_or_default().to_string()
}

#[async_trait]
impl DiscoveryBackend for RpcBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rpc
    }

    async fn register(&self, instance: &ServiceInstance) -> Result<bool> {
        let request = RegisterRequest {
            instance: Some(InstanceRecord::from(instance)),
        };
        let reply = self
            .call("Register", |mut client| async move {
                client.register(request).await
            })
            .await?;
        check_accepted("Register", reply.ok, reply.error)?;
        Ok(true)
    }

    async fn deregister(&self, service: &str, instance_id: Option<&str>) -> Result<Deregistration> {
        let request = DeregisterRequest {
            service_name: service.to_string(),
            instance_id: id_or_empty(instance_id),
        };
        let reply = self
            .call("Deregister", |mut client| async move {
                client.deregister(request).await
            })
            .await?;
        if !check_reply("Deregister", reply.ok, reply.error)? {
            return Ok(Deregistration::none());
        }
        let urls = Some(reply.url).filter(|url| !url.is_empty());
        Ok(Deregistration::removed(urls.into_iter().collect()))
    }

    async fn resolve(&self, service: &str) -> Result<Option<String>> {
        let request = ResolveRequest {
            service_name: service.to_string(),
        };
        let reply = self
            .call("Resolve", |mut client| async move {
                client.resolve(request).await
            })
            .await?;
        let found = check_reply("Resolve", reply.ok, reply.error)?;
        Ok(Some(reply.url).filter(|url| found && !url.is_empty()))
    }

    async fn list(&self) -> Result<HashMap<String, String>> {
        let reply = self
            .call("ListServices", |mut client| async move {
                client.list_services(ListServicesRequest {}).await
            })
            .await?;
        check_reply("ListServices", reply.ok, reply.error)?;
        Ok(reply.services)
    }

    async fn list_instances(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        let request = ListInstancesRequest {
            service_name: service.to_string(),
        };
        let reply = self
            .call("ListInstances", |mut client| async move {
                client.list_instances(request).await
            })
            .await?;
        check_reply("ListInstances", reply.ok, reply.error)?;
        Ok(reply.instances.into_iter().map(ServiceInstance::from).collect())
    }

    async fn heartbeat(&self, service: &str, instance_id: Option<&str>) -> Result<bool> {
        let request = HeartbeatRequest {
            service_name: service.to_string(),
            instance_id: id_or_empty(instance_id),
        };
        let reply = self
            .call("Heartbeat", |mut client| async move {
                client.heartbeat(request).await
            })
            .await?;
        check_reply("Heartbeat", reply.ok, reply.error)
    }

    async fn set_status(
        &self,
        service: &str,
        status: InstanceStatus,
        instance_id: Option<&str>,
    ) -> Result<bool> {
        let request = SetStatusRequest {
            service_name: service.to_string(),
            status: status.as_str().to_string(),
            instance_id: id_or_empty(instance_id),
        };
        let reply = self
            .call("SetStatus", |mut client| async move {
                client.set_status(request).await
            })
            .await?;
        check_reply("SetStatus", reply.ok, reply.error)
    }
}
