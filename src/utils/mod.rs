//! 工具函数模块

/// 当前墙钟时间（毫秒）
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 从查找函数中读取非空字符串
///
/// 查找函数通常是 `|key| std::env::var(key).ok()`，测试中可以替换为内存表。
pub fn lookup_string<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.is_empty())
}

/// 读取整数配置，缺失或无法解析时返回 `None`
pub fn lookup_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_string(lookup, key).and_then(|value| value.trim().parse::<u64>().ok())
}

/// 读取布尔配置
///
/// 仅识别 `1` / `true` / `TRUE` 与 `0` / `false` / `FALSE`，其余取值视为未设置。
pub fn lookup_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup_string(lookup, key)?.as_str() {
        "1" | "true" | "TRUE" => Some(true),
        "0" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}
