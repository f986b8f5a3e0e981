//! 后台健康探测线程
//!
//! 每个注册中心实例独占一个专用线程，线程内运行单线程 tokio 运行时。
//! 每轮探测：持锁取快照 -> 无锁并发探测 -> 逐个持锁写回结果。

use futures::future::join_all;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::probe::probe_instance;
use crate::registry::InstanceStore;
use crate::utils::now_ms;

/// 探测线程名称
pub const PROBER_THREAD_NAME: &str = "discovery-health-prober";

/// 后台健康探测器
///
/// `Drop` 时发出停止信号并等待线程退出，线程退出前不会释放存储。
pub struct HealthProber {
    shutdown: CancellationToken,
    handle: Option<thread::JoinHandle<()>>,
}

impl HealthProber {
    /// 启动探测线程
    ///
    /// 线程创建失败时只记录告警，注册中心仍可在没有主动探测的情况下工作。
    pub fn spawn(store: Arc<InstanceStore>, interval: Duration, probe_timeout: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let spawned = thread::Builder::new()
            .name(PROBER_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!(error = %err, "Failed to build health prober runtime");
                        return;
                    }
                };
                runtime.block_on(run(store, interval, probe_timeout, token));
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "Failed to start discovery health check thread");
                None
            }
        };

        Self { shutdown, handle }
    }

    /// 探测线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// 发出停止信号并等待线程退出（可重复调用）
    pub fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Health prober thread panicked");
            }
        }
    }
}

impl Drop for HealthProber {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    store: Arc<InstanceStore>,
    interval: Duration,
    probe_timeout: Duration,
    shutdown: CancellationToken,
) {
    info!(
        interval_ms = %interval.as_millis(),
        probe_timeout_ms = %probe_timeout.as_millis(),
        "Health prober started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if shutdown.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            probed = probe_round(&store, probe_timeout) => {
                debug!(probed, "Health probe round finished");
            }
        }
    }

    info!("Health prober stopped");
}

/// 执行一轮探测，返回本轮探测的实例数
pub async fn probe_round(store: &InstanceStore, probe_timeout: Duration) -> usize {
    let targets = store.probe_targets().await;
    if targets.is_empty() {
        return 0;
    }

    let checks = targets.iter().map(|instance| async move {
        let healthy = probe_instance(instance, probe_timeout).await;
        let updated = store
            .record_probe(&instance.service_name, &instance.instance_id, healthy, now_ms())
            .await;
        if updated {
            debug!(
                service = %instance.service_name,
                instance_id = %instance.instance_id,
                healthy,
                "Probe result recorded"
            );
        }
    });
    join_all(checks).await;

    targets.len()
}
