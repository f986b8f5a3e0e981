//! 健康检查模块
//!
//! 被动输入（心跳）由存储直接处理，这里负责主动输入：周期性 HTTP 探测。

pub mod probe;
pub mod prober;

pub use probe::{ProbeTarget, is_success_status_line, join_health_path, probe_instance, resolve_probe_url};
pub use prober::{HealthProber, PROBER_THREAD_NAME, probe_round};
