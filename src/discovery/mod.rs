//! 服务发现模块
//!
//! 实例数据模型以及执行注册中心操作的后端（本地、外部客户端、远端 RPC）。

pub mod backend;
pub mod instance;

pub use backend::{
    BackendKind, ClientBackend, Deregistration, DiscoveryBackend, LocalBackend, RpcBackend,
};
pub use instance::{InstanceStatus, Metadata, ServiceInstance};
