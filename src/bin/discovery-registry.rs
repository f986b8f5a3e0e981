//! 独立 HTTP 服务发现注册中心
//!
//! 环境变量：
//! - `REGISTRY_HOST` / `REGISTRY_PORT`：监听地址（默认 `0.0.0.0:9090`）
//! - `DISCOVERY_*`：注册中心配置，见 [`RegistryConfig`]
//! - `RUST_LOG` / `LOG_FORMAT`：日志

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use flare_discovery::server::{self, ServerConfig};
use flare_discovery::telemetry::init_tracing;
use flare_discovery::{RegistryConfig, ServiceRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let server_config = ServerConfig::from_env();
    let registry = Arc::new(ServiceRegistry::new(RegistryConfig::from_env()));

    let listener = TcpListener::bind(server_config.addr())
        .await
        .with_context(|| format!("failed to bind {}", server_config.addr()))?;

    server::serve(listener, registry, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received (Ctrl+C)");
        }
    })
    .await
    .context("discovery registry server failed")?;

    Ok(())
}
