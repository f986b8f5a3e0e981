//! Flare Discovery
//!
//! 嵌入式服务发现注册中心：实例存储、心跳与主动健康探测、轮询解析，
//! 以及本地 / 外部客户端 / 远端 RPC 三种后端之间的委托与回退。

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod health;
pub mod proto;
pub mod registry;
pub mod telemetry;
pub mod utils;

// 独立 HTTP 注册中心（可选）
#[cfg(feature = "server")]
pub mod server;

// Re-exports
pub use client::HttpDiscoveryClient;
pub use config::{RegistryConfig, RpcConfig};
pub use discovery::{
    BackendKind, Deregistration, DiscoveryBackend, InstanceStatus, Metadata, ServiceInstance,
};
pub use error::{DiscoveryError, ErrorCategory, ErrorCode, Result};
pub use events::{
    BroadcastEventBus, BusMessage, DEREGISTER_EVENT, DiscoveryEvent, EventBus, REGISTER_EVENT,
};
pub use health::HealthProber;
pub use registry::{DiscoveryClient, InstanceStore, RoundRobin, ServiceRegistry};
