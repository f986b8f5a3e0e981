//! 日志初始化
//!
//! 库本身只通过 `tracing` 宏输出日志，订阅者由可执行程序或测试安装。

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 输出格式环境变量，取值 `json` 时输出 JSON 日志
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// 安装全局 fmt 订阅者
///
/// `RUST_LOG` 优先于 `default_filter`。重复调用时忽略后续安装。
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
