//! 错误类型转换实现

use super::DiscoveryError;

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::Serialization(format!("JSON 序列化错误: {}", err))
    }
}

impl From<toml::de::Error> for DiscoveryError {
    fn from(err: toml::de::Error) -> Self {
        DiscoveryError::Config(format!("TOML 解析错误: {}", err))
    }
}

impl From<url::ParseError> for DiscoveryError {
    fn from(err: url::ParseError) -> Self {
        DiscoveryError::InvalidParameter(format!("URL 格式错误: {}", err))
    }
}
