//! 服务实例定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DiscoveryError;

/// 实例元数据（对注册中心不透明）
pub type Metadata = HashMap<String, String>;

/// 实例状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Up,
    Down,
    OutOfService,
    #[default]
    Unknown,
}

impl InstanceStatus {
    /// 标准大写表示
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
            InstanceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 大小写不敏感的状态解析，非法取值返回 `InvalidStatus`
impl FromStr for InstanceStatus {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UP" => Ok(InstanceStatus::Up),
            "DOWN" => Ok(InstanceStatus::Down),
            "OUT_OF_SERVICE" => Ok(InstanceStatus::OutOfService),
            "UNKNOWN" => Ok(InstanceStatus::Unknown),
            _ => Err(DiscoveryError::InvalidStatus(s.to_string())),
        }
    }
}

/// 服务实例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    /// 服务名称
    pub service_name: String,

    /// 实例 ID（服务内唯一，未指定时等于 url）
    pub instance_id: String,

    /// 实例地址
    pub url: String,

    /// 健康检查地址（绝对 URL 或相对 `url` 的路径）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,

    /// 实例状态
    #[serde(default)]
    pub status: InstanceStatus,

    /// 元数据
    #[serde(default)]
    pub metadata: Metadata,

    /// 最近一次存活信号（心跳或探测成功）的时间戳（毫秒）
    #[serde(default)]
    pub last_heartbeat_ms: i64,
}

impl ServiceInstance {
    /// 创建新的服务实例，实例 ID 默认取 url
    pub fn new(service_name: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            service_name: service_name.into(),
            instance_id: url.clone(),
            url,
            health_check_url: None,
            status: InstanceStatus::Unknown,
            metadata: Metadata::new(),
            last_heartbeat_ms: 0,
        }
    }

    /// 设置实例 ID，空字符串保持默认值
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        if !instance_id.is_empty() {
            self.instance_id = instance_id;
        }
        self
    }

    /// 设置健康检查地址
    pub fn with_health_check(mut self, health_check_url: impl Into<String>) -> Self {
        let health_check_url = health_check_url.into();
        self.health_check_url = (!health_check_url.is_empty()).then_some(health_check_url);
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 替换全部元数据
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// 设置状态
    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    /// 设置最近心跳时间
    pub fn with_last_heartbeat(mut self, last_heartbeat_ms: i64) -> Self {
        self.last_heartbeat_ms = last_heartbeat_ms;
        self
    }

    /// 在给定时间点是否仍在心跳超时窗口内
    pub fn is_fresh(&self, now_ms: i64, heartbeat_timeout_ms: u64) -> bool {
        let timeout = i64::try_from(heartbeat_timeout_ms).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.last_heartbeat_ms) <= timeout
    }

    /// 是否可被解析：状态为 UP 且足够新鲜
    pub fn is_eligible(&self, now_ms: i64, heartbeat_timeout_ms: u64) -> bool {
        self.status == InstanceStatus::Up && self.is_fresh(now_ms, heartbeat_timeout_ms)
    }
}
