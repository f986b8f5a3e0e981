//! 服务发现后端抽象和实现
//!
//! 注册中心的每个操作都由一个后端执行：本地存储、外部客户端或远端 RPC 注册中心。

pub mod client;
pub mod local;
pub mod rpc;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::discovery::{InstanceStatus, ServiceInstance};
use crate::error::Result;

pub use client::ClientBackend;
pub use local::LocalBackend;
pub use rpc::RpcBackend;

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    Client,
    Rpc,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Client => "client",
            BackendKind::Rpc => "rpc",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 注销结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deregistration {
    /// 是否有实例被删除
    pub removed: bool,
    /// 已知的被删除实例地址（用于发送注销事件）
    pub urls: Vec<String>,
}

impl Deregistration {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn removed(urls: Vec<String>) -> Self {
        Self { removed: true, urls }
    }
}

impl From<Vec<ServiceInstance>> for Deregistration {
    fn from(removed: Vec<ServiceInstance>) -> Self {
        if removed.is_empty() {
            Self::none()
        } else {
            Self::removed(removed.into_iter().map(|instance| instance.url).collect())
        }
    }
}

/// 服务发现后端 trait
///
/// 未找到服务或实例时返回 `Ok(false)` / `Ok(None)` / 空集合，不返回错误。
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// 注册实例（实例 ID 已规范化）
    async fn register(&self, instance: &ServiceInstance) -> Result<bool>;

    /// 注销实例；`instance_id` 为空时注销整个服务
    async fn deregister(&self, service: &str, instance_id: Option<&str>) -> Result<Deregistration>;

    /// 解析一个可用实例的地址
    async fn resolve(&self, service: &str) -> Result<Option<String>>;

    /// 服务名 -> 代表地址
    async fn list(&self) -> Result<HashMap<String, String>>;

    /// 服务的全部实例（包括不可用的）
    async fn list_instances(&self, service: &str) -> Result<Vec<ServiceInstance>>;

    /// 心跳；`instance_id` 为空时刷新该服务全部实例
    async fn heartbeat(&self, service: &str, instance_id: Option<&str>) -> Result<bool>;

    /// 设置实例状态
    async fn set_status(
        &self,
        service: &str,
        status: InstanceStatus,
        instance_id: Option<&str>,
    ) -> Result<bool>;
}
