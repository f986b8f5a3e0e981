//! 事件通知模块
//!
//! 注册 / 注销成功后向外部事件总线发送通知。通知是旁路：
//! 未配置总线或发送失败都不影响触发操作本身的结果。

use async_broadcast::{InactiveReceiver, Receiver, Sender, TrySendError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, Result};

/// 注册事件名称
pub const REGISTER_EVENT: &str = "discovery.register";
/// 注销事件名称
pub const DEREGISTER_EVENT: &str = "discovery.deregister";

/// 事件载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub name: String,
    pub url: String,
}

impl DiscoveryEvent {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// 事件总线 trait
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 发送一个具名事件
    async fn emit(&self, event: &str, payload: &DiscoveryEvent) -> Result<()>;
}

/// 总线上传递的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub event: String,
    pub payload: DiscoveryEvent,
}

/// 进程内广播事件总线
///
/// 基于 async-broadcast，队列满时覆盖最旧的消息；没有订阅者时发送视为成功。
pub struct BroadcastEventBus {
    sender: Sender<BusMessage>,
    inactive: InactiveReceiver<BusMessage>,
}

impl BroadcastEventBus {
    /// 创建指定容量的总线
    pub fn new(capacity: usize) -> Self {
        let (mut sender, receiver) = async_broadcast::broadcast(capacity.max(1));
        sender.set_overflow(true);
        Self {
            sender,
            inactive: receiver.deactivate(),
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> Receiver<BusMessage> {
        self.inactive.activate_cloned()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn emit(&self, event: &str, payload: &DiscoveryEvent) -> Result<()> {
        let message = BusMessage {
            event: event.to_string(),
            payload: payload.clone(),
        };
        match self.sender.try_broadcast(message) {
            Ok(_) | Err(TrySendError::Inactive(_)) => Ok(()),
            Err(err) => Err(DiscoveryError::EventBus(err.to_string())),
        }
    }
}
