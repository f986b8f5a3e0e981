//! 独立 HTTP 注册中心
//!
//! 把 [`ServiceRegistry`] 暴露为 `/v1/*` JSON 接口，供 [`HttpDiscoveryClient`](crate::client::HttpDiscoveryClient)
//! 或其他语言的客户端访问。

use axum::{
    Router,
    extract::{Json, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::client::http::{ApiResponse, InstanceBody, RegisterBody, StatusBody};
use crate::discovery::ServiceInstance;
use crate::error::{DiscoveryError, Result};
use crate::registry::ServiceRegistry;
use crate::utils::{lookup_string, lookup_u64};

/// 健康检查响应中的服务名
pub const SERVICE_NAME: &str = "discovery-registry";
/// 监听地址环境变量
pub const ENV_HOST: &str = "REGISTRY_HOST";
/// 监听端口环境变量
pub const ENV_PORT: &str = "REGISTRY_PORT";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9090;

/// 服务端配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 端口缺失、非数字或为 0 时使用默认端口
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup_u64(&lookup, ENV_PORT)
            .and_then(|port| u16::try_from(port).ok())
            .filter(|port| *port != 0)
            .unwrap_or(DEFAULT_PORT);
        Self {
            host: lookup_string(&lookup, ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

type Reply = (StatusCode, Json<ApiResponse>);

#[derive(Debug, Default, Deserialize)]
struct ServiceQuery {
    #[serde(default)]
    service: String,
}

/// 构建路由
pub fn router(registry: Arc<ServiceRegistry>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/register", post(register))
        .route("/v1/deregister", post(deregister))
        .route("/v1/heartbeat", post(heartbeat))
        .route("/v1/status", post(set_status))
        .route("/v1/resolve", get(resolve))
        .route("/v1/services", get(services))
        .route("/v1/instances", get(instances))
        .with_state(registry)
}

/// 在给定监听器上运行，`shutdown` 完成后优雅退出
pub async fn serve<S>(listener: TcpListener, registry: Arc<ServiceRegistry>, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "Discovery registry listening");
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Discovery registry stopped");
    Ok(())
}

fn reply(status: StatusCode, body: ApiResponse) -> Reply {
    (status, Json(body))
}

fn bad_request(message: &str) -> Reply {
    reply(StatusCode::BAD_REQUEST, ApiResponse::failed(message))
}

fn error_reply(err: DiscoveryError) -> Reply {
    if err.is_validation() {
        return bad_request(&err.to_string());
    }
    error!(error = %err, code = err.code().as_u32(), "Registry operation failed");
    reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiResponse::failed(err.to_string()),
    )
}

/// `true` -> 200，`false` -> `not_applied`
fn bool_reply(result: Result<bool>, not_applied: StatusCode, message: &str) -> Reply {
    match result {
        Ok(true) => reply(StatusCode::OK, ApiResponse::ok()),
        Ok(false) => reply(not_applied, ApiResponse::failed(message)),
        Err(err) => error_reply(err),
    }
}

/// 去掉首尾空白
fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

/// 去掉首尾空白，空串视为未提供
fn trimmed_opt(value: Option<String>) -> Option<String> {
    value
        .map(|value| trimmed(&value))
        .filter(|value| !value.is_empty())
}

async fn health() -> Json<ApiResponse> {
    Json(ApiResponse {
        service: Some(SERVICE_NAME.to_string()),
        ..ApiResponse::ok()
    })
}

async fn register(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(body): Json<RegisterBody>,
) -> Reply {
    let service = trimmed(&body.service);
    let url = trimmed(&body.url);
    if service.is_empty() || url.is_empty() {
        return bad_request("service and url are required");
    }

    let mut instance =
        ServiceInstance::new(service, url).with_metadata_map(body.metadata.unwrap_or_default());
    if let Some(instance_id) = trimmed_opt(body.instance_id) {
        instance = instance.with_instance_id(instance_id);
    }
    if let Some(health_check_url) = trimmed_opt(body.health_check_url) {
        instance = instance.with_health_check(health_check_url);
    }

    bool_reply(
        registry.register_instance(instance).await,
        StatusCode::INTERNAL_SERVER_ERROR,
        "register failed",
    )
}

async fn deregister(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(body): Json<InstanceBody>,
) -> Reply {
    let service = trimmed(&body.service);
    if service.is_empty() {
        return bad_request("service is required");
    }
    let instance_id = trimmed_opt(body.instance_id);
    bool_reply(
        registry.deregister(&service, instance_id.as_deref()).await,
        StatusCode::INTERNAL_SERVER_ERROR,
        "not found",
    )
}

async fn heartbeat(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(body): Json<InstanceBody>,
) -> Reply {
    let service = trimmed(&body.service);
    if service.is_empty() {
        return bad_request("service is required");
    }
    let instance_id = trimmed_opt(body.instance_id);
    bool_reply(
        registry.heartbeat(&service, instance_id.as_deref()).await,
        StatusCode::NOT_FOUND,
        "not found",
    )
}

async fn set_status(
    State(registry): State<Arc<ServiceRegistry>>,
    Json(body): Json<StatusBody>,
) -> Reply {
    let service = trimmed(&body.service);
    let status = trimmed(&body.status);
    if service.is_empty() || status.is_empty() {
        return bad_request("service and status are required");
    }
    let instance_id = trimmed_opt(body.instance_id);
    bool_reply(
        registry
            .set_status(&service, &status, instance_id.as_deref())
            .await,
        StatusCode::NOT_FOUND,
        "not found",
    )
}

async fn resolve(
    State(registry): State<Arc<ServiceRegistry>>,
    Query(query): Query<ServiceQuery>,
) -> Reply {
    let service = trimmed(&query.service);
    if service.is_empty() {
        return bad_request("service is required");
    }
    match registry.resolve(&service).await {
        Ok(Some(url)) => reply(
            StatusCode::OK,
            ApiResponse {
                url: Some(url),
                ..ApiResponse::ok()
            },
        ),
        Ok(None) => reply(StatusCode::NOT_FOUND, ApiResponse::failed("not found")),
        Err(err) => error_reply(err),
    }
}

async fn services(State(registry): State<Arc<ServiceRegistry>>) -> Reply {
    match registry.list().await {
        Ok(services) => reply(
            StatusCode::OK,
            ApiResponse {
                services: Some(services),
                ..ApiResponse::ok()
            },
        ),
        Err(err) => error_reply(err),
    }
}

async fn instances(
    State(registry): State<Arc<ServiceRegistry>>,
    Query(query): Query<ServiceQuery>,
) -> Reply {
    let service = trimmed(&query.service);
    if service.is_empty() {
        return bad_request("service is required");
    }
    match registry.list_instances(&service).await {
        Ok(instances) => reply(
            StatusCode::OK,
            ApiResponse {
                instances: Some(instances),
                ..ApiResponse::ok()
            },
        ),
        Err(err) => error_reply(err),
    }
}
