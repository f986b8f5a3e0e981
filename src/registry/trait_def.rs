//! 外部服务发现客户端 Trait 定义

use async_trait::async_trait;
use std::collections::HashMap;

use crate::discovery::{InstanceStatus, ServiceInstance};
use crate::error::Result;
use crate::utils::now_ms;

/// 外部服务发现客户端
///
/// 必须实现扁平模式的四个方法（服务名 -> 单个地址）；按实例的方法带有默认实现，
/// 客户端未提供时回退到对应的扁平方法。
///
/// 返回 `Err` 表示客户端自身失败，会原样返回给调用方；返回 `false` / `None` /
/// 空集合表示客户端拒绝处理，注册中心会改用本地存储。
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// 注册服务
    async fn register(&self, name: &str, url: &str) -> Result<bool>;

    /// 注销服务
    async fn deregister(&self, name: &str) -> Result<bool>;

    /// 解析服务地址
    async fn resolve(&self, name: &str) -> Result<Option<String>>;

    /// 服务名 -> 地址
    async fn list(&self) -> Result<HashMap<String, String>>;

    /// 注册实例（默认回退到 `register`）
    async fn register_instance(&self, instance: &ServiceInstance) -> Result<bool> {
        self.register(&instance.service_name, &instance.url).await
    }

    /// 注销实例（默认回退到 `deregister`，扁平模式下每个服务只有一个实例）
    async fn deregister_instance(&self, name: &str, _instance_id: Option<&str>) -> Result<bool> {
        self.deregister(name).await
    }

    /// 心跳（默认：服务可解析即视为成功）
    async fn heartbeat(&self, name: &str, _instance_id: Option<&str>) -> Result<bool> {
        Ok(self.resolve(name).await?.is_some())
    }

    /// 设置实例状态（默认：扁平模式不跟踪状态）
    async fn set_status(
        &self,
        _name: &str,
        _status: InstanceStatus,
        _instance_id: Option<&str>,
    ) -> Result<bool> {
        Ok(false)
    }

    /// 列出实例（默认：由 `resolve` 结果构造单实例视图）
    async fn list_instances(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        let instances = self
            .resolve(name)
            .await?
            .map(|url| {
                ServiceInstance::new(name, url)
                    .with_status(InstanceStatus::Up)
                    .with_last_heartbeat(now_ms())
            })
            .into_iter()
            .collect();
        Ok(instances)
    }
}
