//! 远端注册中心客户端模块
//!
//! - gRPC 通道构建（RPC 后端使用）
//! - [`HttpDiscoveryClient`]：访问独立 HTTP 注册中心的 [`DiscoveryClient`](crate::registry::DiscoveryClient) 实现

pub mod http;

use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

use crate::config::RpcConfig;
use crate::error::Result;

pub use http::HttpDiscoveryClient;

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl From<RpcConfig> for ClientConfig {
    /// 连接超时与单次调用超时都取 RPC 超时
    fn from(config: RpcConfig) -> Self {
        let timeout = config.timeout();
        Self {
            address: config.endpoint,
            connect_timeout: timeout,
            timeout,
        }
    }
}

/// gRPC 通道构建器
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> Result<Endpoint> {
        let endpoint = Endpoint::from_shared(self.config.address.clone())?
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.timeout);
        Ok(endpoint)
    }

    /// 延迟连接：首次请求时才建立连接（需要在 tokio 运行时内调用）
    pub fn build_lazy(self) -> Result<Channel> {
        Ok(self.endpoint()?.connect_lazy())
    }
}
