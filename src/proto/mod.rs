//! 远端注册中心 RPC 协议
//!
//! 包 `flare.discovery.v1`，服务 `DiscoveryService`。消息结构与 prost 生成代码保持一致，
//! 每个响应都携带 `ok` 与 `error` 字段。

use std::collections::HashMap;
use tonic::transport::Channel;
use tonic::{GrpcMethod, IntoRequest, Request, Response, Status};

use crate::discovery::{InstanceStatus, ServiceInstance};

/// 服务全名
pub const SERVICE_NAME: &str = "flare.discovery.v1.DiscoveryService";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstanceRecord {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub instance_id: String,
    #[prost(string, tag = "3")]
    pub url: String,
    #[prost(string, tag = "4")]
    pub health_check_url: String,
    #[prost(string, tag = "5")]
    pub status: String,
    #[prost(map = "string, string", tag = "6")]
    pub metadata: HashMap<String, String>,
    #[prost(int64, tag = "7")]
    pub last_heartbeat_ms: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterRequest {
    #[prost(message, optional, tag = "1")]
    pub instance: Option<InstanceRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub error: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeregisterRequest {
    #[prost(string, tag = "1")]
    pub service_name: String,
    /// 为空表示注销整个服务
    #[prost(string, tag = "2")]
    pub instance_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeregisterResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub error: String,
    /// 被删除实例的地址
    #[prost(string, tag = "3")]
    pub url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResolveRequest {
    #[prost(string, tag = "1")]
    pub service_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResolveResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub error: String,
    #[prost(string, tag = "3")]
    pub url: String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ListServicesRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListServicesResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub error: String,
    #[prost(map = "string, string", tag = "3")]
    pub services: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListInstancesRequest {
    #[prost(string, tag = "1")]
    pub service_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListInstancesResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub error: String,
    #[prost(message, repeated, tag = "3")]
    pub instances: Vec<InstanceRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatRequest {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub instance_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub error: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetStatusRequest {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub status: String,
    #[prost(string, tag = "3")]
    pub instance_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetStatusResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub error: String,
}

impl From<&ServiceInstance> for InstanceRecord {
    fn from(instance: &ServiceInstance) -> Self {
        Self {
            service_name: instance.service_name.clone(),
            instance_id: instance.instance_id.clone(),
            url: instance.url.clone(),
            health_check_url: instance.health_check_url.clone().unwrap_or_default(),
            status: instance.status.as_str().to_string(),
            metadata: instance.metadata.clone(),
            last_heartbeat_ms: instance.last_heartbeat_ms,
        }
    }
}

impl From<InstanceRecord> for ServiceInstance {
    /// 无法识别的状态按 UNKNOWN 处理
    fn from(record: InstanceRecord) -> Self {
        let status = record.status.parse().unwrap_or(InstanceStatus::Unknown);
        ServiceInstance::new(record.service_name, record.url)
            .with_instance_id(record.instance_id)
            .with_health_check(record.health_check_url)
            .with_status(status)
            .with_metadata_map(record.metadata)
            .with_last_heartbeat(record.last_heartbeat_ms)
    }
}

/// `DiscoveryService` 客户端
#[derive(Debug, Clone)]
pub struct DiscoveryServiceClient {
    inner: tonic::client::Grpc<Channel>,
}

impl DiscoveryServiceClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<M1, M2>(
        &mut self,
        method: &'static str,
        path: &'static str,
        request: impl IntoRequest<M1>,
    ) -> Result<Response<M2>, Status>
    where
        M1: prost::Message + Send + Sync + 'static,
        M2: prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e)))?;
        let codec = tonic_prost::ProstCodec::<M1, M2>::default();
        let path = http::uri::PathAndQuery::from_static(path);
        let mut req: Request<M1> = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new(SERVICE_NAME, method));
        self.inner.unary(req, path, codec).await
    }

    pub async fn register(
        &mut self,
        request: impl IntoRequest<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        self.unary(
            "Register",
            "/flare.discovery.v1.DiscoveryService/Register",
            request,
        )
        .await
    }

    pub async fn deregister(
        &mut self,
        request: impl IntoRequest<DeregisterRequest>,
    ) -> Result<Response<DeregisterResponse>, Status> {
        self.unary(
            "Deregister",
            "/flare.discovery.v1.DiscoveryService/Deregister",
            request,
        )
        .await
    }

    pub async fn resolve(
        &mut self,
        request: impl IntoRequest<ResolveRequest>,
    ) -> Result<Response<ResolveResponse>, Status> {
        self.unary(
            "Resolve",
            "/flare.discovery.v1.DiscoveryService/Resolve",
            request,
        )
        .await
    }

    pub async fn list_services(
        &mut self,
        request: impl IntoRequest<ListServicesRequest>,
    ) -> Result<Response<ListServicesResponse>, Status> {
        self.unary(
            "ListServices",
            "/flare.discovery.v1.DiscoveryService/ListServices",
            request,
        )
        .await
    }

    pub async fn list_instances(
        &mut self,
        request: impl IntoRequest<ListInstancesRequest>,
    ) -> Result<Response<ListInstancesResponse>, Status> {
        self.unary(
            "ListInstances",
            "/flare.discovery.v1.DiscoveryService/ListInstances",
            request,
        )
        .await
    }

    pub async fn heartbeat(
        &mut self,
        request: impl IntoRequest<HeartbeatRequest>,
    ) -> Result<Response<HeartbeatResponse>, Status> {
        self.unary(
            "Heartbeat",
            "/flare.discovery.v1.DiscoveryService/Heartbeat",
            request,
        )
        .await
    }

    pub async fn set_status(
        &mut self,
        request: impl IntoRequest<SetStatusRequest>,
    ) -> Result<Response<SetStatusResponse>, Status> {
        self.unary(
            "SetStatus",
            "/flare.discovery.v1.DiscoveryService/SetStatus",
            request,
        )
        .await
    }
}
