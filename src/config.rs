//! 注册中心配置
//!
//! 构造时读取一次，支持环境变量和 TOML 文件两种来源。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::Result;
use crate::utils::{lookup_bool, lookup_string, lookup_u64};

/// 心跳超时环境变量（毫秒）
pub const ENV_HEARTBEAT_TIMEOUT: &str = "DISCOVERY_HEARTBEAT_TIMEOUT_MS";
/// 健康检查间隔环境变量（毫秒）
pub const ENV_HEALTH_CHECK_INTERVAL: &str = "DISCOVERY_HEALTH_CHECK_INTERVAL_MS";
/// 单次探测超时环境变量（毫秒）
pub const ENV_PROBE_TIMEOUT: &str = "DISCOVERY_PROBE_TIMEOUT_MS";
/// 是否启用 RPC 后端
pub const ENV_RPC_ENABLED: &str = "DISCOVERY_RPC_ENABLED";
/// RPC 调用超时环境变量（毫秒）
pub const ENV_RPC_TIMEOUT: &str = "DISCOVERY_RPC_TIMEOUT_MS";
/// RPC 注册中心地址
pub const ENV_RPC_ENDPOINT: &str = "DISCOVERY_RPC_ENDPOINT";

pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_HEARTBEAT_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 10_000;
pub const MIN_HEALTH_CHECK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;
pub const MIN_PROBE_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 1_000;
pub const MIN_RPC_TIMEOUT_MS: u64 = 10;
pub const DEFAULT_RPC_ENDPOINT: &str = "http://127.0.0.1:50051";

/// 注册中心配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// 心跳超时（毫秒），超过该时间未收到心跳的实例不参与解析
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// 主动健康检查间隔（毫秒）
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// 单次 HTTP 探测超时（毫秒）
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// 远端 RPC 注册中心
    #[serde(default)]
    pub rpc: RpcConfig,
}

/// 远端 RPC 注册中心配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    /// 单次调用截止时间（毫秒），同时用作连接超时
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_heartbeat_timeout_ms() -> u64 {
    DEFAULT_HEARTBEAT_TIMEOUT_MS
}

fn default_health_check_interval_ms() -> u64 {
    DEFAULT_HEALTH_CHECK_INTERVAL_MS
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_rpc_timeout_ms() -> u64 {
    DEFAULT_RPC_TIMEOUT_MS
}

fn default_rpc_endpoint() -> String {
    DEFAULT_RPC_ENDPOINT.to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_rpc_endpoint(),
            timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            rpc: RpcConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从进程环境变量读取配置
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过查找函数读取配置（缺失或非法的取值使用默认值）
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            heartbeat_timeout_ms: lookup_u64(&lookup, ENV_HEARTBEAT_TIMEOUT)
                .unwrap_or(defaults.heartbeat_timeout_ms),
            health_check_interval_ms: lookup_u64(&lookup, ENV_HEALTH_CHECK_INTERVAL)
                .unwrap_or(defaults.health_check_interval_ms),
            probe_timeout_ms: lookup_u64(&lookup, ENV_PROBE_TIMEOUT)
                .unwrap_or(defaults.probe_timeout_ms),
            rpc: RpcConfig {
                enabled: lookup_bool(&lookup, ENV_RPC_ENABLED).unwrap_or(defaults.rpc.enabled),
                endpoint: lookup_string(&lookup, ENV_RPC_ENDPOINT)
                    .unwrap_or(defaults.rpc.endpoint),
                timeout_ms: lookup_u64(&lookup, ENV_RPC_TIMEOUT)
                    .unwrap_or(defaults.rpc.timeout_ms),
            },
        };
        config.normalized()
    }

    /// 从 TOML 文件加载配置
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RegistryConfig = toml::from_str(&content)?;
        Ok(config.normalized())
    }

    /// 将过小的取值提升到下限，并输出告警（不拒绝配置）
    pub fn normalized(mut self) -> Self {
        self.heartbeat_timeout_ms = clamp_floor(
            "heartbeat_timeout_ms",
            self.heartbeat_timeout_ms,
            MIN_HEARTBEAT_TIMEOUT_MS,
        );
        self.health_check_interval_ms = clamp_floor(
            "health_check_interval_ms",
            self.health_check_interval_ms,
            MIN_HEALTH_CHECK_INTERVAL_MS,
        );
        self.probe_timeout_ms =
            clamp_floor("probe_timeout_ms", self.probe_timeout_ms, MIN_PROBE_TIMEOUT_MS);
        self.rpc.timeout_ms =
            clamp_floor("rpc.timeout_ms", self.rpc.timeout_ms, MIN_RPC_TIMEOUT_MS);
        self
    }

    /// 设置心跳超时
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout_ms = millis(timeout);
        self.normalized()
    }

    /// 设置健康检查间隔
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval_ms = millis(interval);
        self.normalized()
    }

    /// 设置单次探测超时
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = millis(timeout);
        self.normalized()
    }

    /// 启用 RPC 后端
    pub fn with_rpc(mut self, endpoint: impl Into<String>, timeout: Duration) -> Self {
        self.rpc.enabled = true;
        self.rpc.endpoint = endpoint.into();
        self.rpc.timeout_ms = millis(timeout);
        self.normalized()
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn clamp_floor(field: &'static str, value: u64, floor: u64) -> u64 {
    if value < floor {
        warn!(field, value, floor, "Configured value below minimum, clamping");
        floor
    } else {
        value
    }
}
