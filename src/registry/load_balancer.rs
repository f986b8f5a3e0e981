//! 负载均衡模块
//!
//! 轮询选择器，每个服务维护独立的轮转计数。计数只在存储锁内读写，
//! 因此不需要原子类型。

use std::collections::HashMap;

use crate::discovery::ServiceInstance;

/// 轮询（Round Robin）选择器
#[derive(Debug, Default)]
pub struct RoundRobin {
    rotation: HashMap<String, usize>,
}

impl RoundRobin {
    /// 创建新的轮询选择器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从候选实例中选择一个
    ///
    /// 计数每次都按当前候选数量取模，候选集合在两次调用之间增减时不会越界，
    /// 但此时不保证严格的轮转顺序。
    pub fn select<'a>(
        &mut self,
        service: &str,
        candidates: &[&'a ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }

        let counter = self.rotation.entry(service.to_string()).or_insert(0);
        let index = *counter % candidates.len();
        *counter = (index + 1) % candidates.len();
        candidates.get(index).copied()
    }

    /// 移除服务的轮转状态
    pub fn forget(&mut self, service: &str) {
        self.rotation.remove(service);
    }

    /// 当前保存轮转状态的服务数量
    pub fn tracked_services(&self) -> usize {
        self.rotation.len()
    }
}
