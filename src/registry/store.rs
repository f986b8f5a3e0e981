//! 实例存储
//!
//! 服务名 -> 实例 ID -> 实例记录的两级映射，连同轮询计数一起由同一把互斥锁保护。
//! 锁只在内存操作期间持有，任何网络调用都不会在持锁状态下进行。

use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::load_balancer::RoundRobin;
use crate::discovery::{InstanceStatus, ServiceInstance};

#[derive(Debug, Default)]
struct StoreState {
    services: HashMap<String, BTreeMap<String, ServiceInstance>>,
    balancer: RoundRobin,
}

impl StoreState {
    /// 删除空服务条目及其轮转状态
    fn prune(&mut self, service: &str) {
        let empty = self
            .services
            .get(service)
            .map(|instances| instances.is_empty())
            .unwrap_or(false);
        if empty {
            self.services.remove(service);
            self.balancer.forget(service);
        }
    }

    /// 对选定实例（或整个服务）应用修改，返回是否命中
    fn update<F>(&mut self, service: &str, instance_id: Option<&str>, mut apply: F) -> bool
    where
        F: FnMut(&mut ServiceInstance),
    {
        let Some(instances) = self.services.get_mut(service) else {
            return false;
        };

        match instance_id {
            Some(id) => match instances.get_mut(id) {
                Some(instance) => {
                    apply(instance);
                    true
                }
                None => false,
            },
            None => {
                instances.values_mut().for_each(&mut apply);
                !instances.is_empty()
            }
        }
    }
}

/// 实例存储
#[derive(Debug, Default)]
pub struct InstanceStore {
    state: Mutex<StoreState>,
}

impl InstanceStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入完整实例记录，相同 (服务, 实例 ID) 原地覆盖
    pub async fn put(&self, instance: ServiceInstance) {
        let mut state = self.state.lock().await;
        state
            .services
            .entry(instance.service_name.clone())
            .or_default()
            .insert(instance.instance_id.clone(), instance);
    }

    /// 删除实例；未指定实例 ID 时删除该服务的全部实例
    ///
    /// 返回被删除的记录。服务的最后一个实例被删除后，服务条目一并删除。
    pub async fn remove(&self, service: &str, instance_id: Option<&str>) -> Vec<ServiceInstance> {
        let mut state = self.state.lock().await;
        let removed = match (state.services.get_mut(service), instance_id) {
            (None, _) => Vec::new(),
            (Some(instances), Some(id)) => instances.remove(id).into_iter().collect(),
            (Some(instances), None) => std::mem::take(instances).into_values().collect(),
        };
        state.prune(service);
        removed
    }

    /// 获取服务的全部实例快照
    pub async fn get(&self, service: &str) -> Vec<ServiceInstance> {
        let state = self.state.lock().await;
        state
            .services
            .get(service)
            .map(|instances| instances.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 服务名 -> 代表地址
    ///
    /// 代表地址取实例 ID 排序后的第一个实例，仅用于列表展示，不代表解析结果。
    pub async fn list(&self) -> HashMap<String, String> {
        let state = self.state.lock().await;
        state
            .services
            .iter()
            .filter_map(|(service, instances)| {
                instances
                    .values()
                    .next()
                    .map(|instance| (service.clone(), instance.url.clone()))
            })
            .collect()
    }

    /// 被动心跳：状态置为 UP 并刷新时间戳
    pub async fn heartbeat(&self, service: &str, instance_id: Option<&str>, now_ms: i64) -> bool {
        let mut state = self.state.lock().await;
        state.update(service, instance_id, |instance| {
            instance.status = InstanceStatus::Up;
            instance.last_heartbeat_ms = now_ms;
        })
    }

    /// 显式设置状态，不修改时间戳
    pub async fn set_status(
        &self,
        service: &str,
        status: InstanceStatus,
        instance_id: Option<&str>,
    ) -> bool {
        let mut state = self.state.lock().await;
        state.update(service, instance_id, |instance| instance.status = status)
    }

    /// 在 UP 且新鲜的实例中轮询选择一个
    pub async fn select(
        &self,
        service: &str,
        now_ms: i64,
        heartbeat_timeout_ms: u64,
    ) -> Option<ServiceInstance> {
        let mut state = self.state.lock().await;
        let StoreState { services, balancer } = &mut *state;

        let instances = services.get(service)?;
        let eligible: Vec<&ServiceInstance> = instances
            .values()
            .filter(|instance| instance.is_eligible(now_ms, heartbeat_timeout_ms))
            .collect();

        balancer.select(service, &eligible).cloned()
    }

    /// 声明了健康检查地址的实例快照
    pub async fn probe_targets(&self) -> Vec<ServiceInstance> {
        let state = self.state.lock().await;
        state
            .services
            .values()
            .flat_map(|instances| instances.values())
            .filter(|instance| instance.health_check_url.is_some())
            .cloned()
            .collect()
    }

    /// 写回探测结果；成功时刷新时间戳，失败时只修改状态
    ///
    /// 探测期间实例已被删除时不做任何事，返回 `false`。
    pub async fn record_probe(
        &self,
        service: &str,
        instance_id: &str,
        healthy: bool,
        now_ms: i64,
    ) -> bool {
        let mut state = self.state.lock().await;
        state.update(service, Some(instance_id), |instance| {
            if healthy {
                instance.status = InstanceStatus::Up;
                instance.last_heartbeat_ms = now_ms;
            } else {
                instance.status = InstanceStatus::Down;
            }
        })
    }

    /// 已注册服务数量
    pub async fn service_count(&self) -> usize {
        self.state.lock().await.services.len()
    }

    /// 保存轮转状态的服务数量
    pub async fn rotation_count(&self) -> usize {
        self.state.lock().await.balancer.tracked_services()
    }
}
