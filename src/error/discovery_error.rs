//! 服务发现统一错误类型

use super::code::ErrorCode;
use std::time::Duration;
use thiserror::Error;

/// 服务发现统一错误类型
///
/// 未找到服务或实例不属于错误，由各操作以 `false` / `None` 表达。
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// 实例状态不是 UP / DOWN / OUT_OF_SERVICE / UNKNOWN 之一
    #[error("无效的实例状态: {0}")]
    InvalidStatus(String),

    /// 参数校验失败
    #[error("参数错误: {0}")]
    InvalidParameter(String),

    /// 外部客户端策略返回的错误
    #[error("客户端错误: {0}")]
    Client(String),

    /// gRPC 调用返回的状态
    #[error("RPC 调用失败: {0}")]
    Rpc(#[from] tonic::Status),

    /// gRPC 传输层错误
    #[error("RPC 传输错误: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// 远端注册中心返回 ok=false
    #[error("远端注册中心错误: {0}")]
    Remote(String),

    /// RPC 调用超过截止时间
    #[error("RPC 调用超时 ({0:?})")]
    RpcTimeout(Duration),

    /// HTTP 错误
    #[error("HTTP 错误: {0}")]
    Http(#[from] reqwest::Error),

    /// 事件总线错误
    #[error("事件总线错误: {0}")]
    EventBus(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),
}

impl DiscoveryError {
    /// 创建客户端错误
    pub fn client(msg: impl Into<String>) -> Self {
        DiscoveryError::Client(msg.into())
    }

    /// 创建参数错误
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        DiscoveryError::InvalidParameter(msg.into())
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            DiscoveryError::InvalidStatus(_) => ErrorCode::InvalidStatus,
            DiscoveryError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            DiscoveryError::Client(_) => ErrorCode::OperationFailed,
            DiscoveryError::Rpc(status) => match status.code() {
                tonic::Code::DeadlineExceeded => ErrorCode::NetworkTimeout,
                tonic::Code::Unavailable => ErrorCode::ServiceUnavailable,
                tonic::Code::InvalidArgument => ErrorCode::InvalidParameter,
                _ => ErrorCode::ProtocolError,
            },
            DiscoveryError::Transport(_) => ErrorCode::ConnectionFailed,
            DiscoveryError::Remote(_) => ErrorCode::OperationFailed,
            DiscoveryError::RpcTimeout(_) => ErrorCode::ConnectionTimeout,
            DiscoveryError::Http(err) if err.is_timeout() => ErrorCode::NetworkTimeout,
            DiscoveryError::Http(_) => ErrorCode::NetworkError,
            DiscoveryError::EventBus(_) => ErrorCode::InternalError,
            DiscoveryError::Config(_) => ErrorCode::ConfigurationError,
            DiscoveryError::Io(_) => ErrorCode::NetworkError,
            DiscoveryError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// 是否为校验类错误（调用方输入非法，操作未执行）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DiscoveryError::InvalidStatus(_) | DiscoveryError::InvalidParameter(_)
        )
    }

    /// 是否为传输类错误（网络、超时、远端不可用），可回退到本地策略
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DiscoveryError::Rpc(_)
                | DiscoveryError::Transport(_)
                | DiscoveryError::RpcTimeout(_)
                | DiscoveryError::Remote(_)
                | DiscoveryError::Http(_)
                | DiscoveryError::Io(_)
        )
    }
}

/// 服务发现结果类型
pub type Result<T> = std::result::Result<T, DiscoveryError>;
