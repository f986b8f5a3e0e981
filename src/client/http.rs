//! HTTP 注册中心客户端
//!
//! 访问 `discovery-registry` 暴露的 `/v1/*` 接口，可作为外部客户端挂到另一个注册中心上。

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::discovery::{InstanceStatus, Metadata, ServiceInstance};
use crate::error::{DiscoveryError, Result};
use crate::registry::DiscoveryClient;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// 注册请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
}

/// 注销 / 心跳请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceBody {
    #[serde(default)]
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// 状态设置请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// 统一响应体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<Vec<ServiceInstance>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// HTTP 注册中心客户端
#[derive(Debug, Clone)]
pub struct HttpDiscoveryClient {
    http_client: HttpClient,
    base_url: String,
}

impl HttpDiscoveryClient {
    /// 创建客户端，`base_url` 形如 `http://127.0.0.1:9090`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let response = self
            .http_client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;
        Self::read(path, response).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse> {
        let response = self
            .http_client
            .get(self.endpoint(path))
            .query(query)
            .send()
            .await?;
        Self::read(path, response).await
    }

    /// 400 视为参数错误；其余 `ok=false` 的响应按“未找到 / 未处理”返回
    ///
    /// 非 2xx 且响应体不是 JSON（例如代理返回的 502）时按未处理返回。
    async fn read(path: &str, response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = match serde_json::from_slice::<ApiResponse>(&bytes) {
            Ok(body) => body,
            Err(err) if status.is_success() => return Err(err.into()),
            Err(_) => ApiResponse::failed(format!("invalid json response ({})", status)),
        };
        if status == StatusCode::BAD_REQUEST {
            return Err(DiscoveryError::invalid_parameter(
                body.error.unwrap_or_else(|| "bad request".to_string()),
            ));
        }
        if !body.ok {
            debug!(path, status = status.as_u16(), error = ?body.error, "Registry request not applied");
        }
        Ok(body)
    }
}

#[async_trait]
impl DiscoveryClient for HttpDiscoveryClient {
    async fn register(&self, name: &str, url: &str) -> Result<bool> {
        self.register_instance(&ServiceInstance::new(name, url)).await
    }

    async fn deregister(&self, name: &str) -> Result<bool> {
        self.deregister_instance(name, None).await
    }

    async fn resolve(&self, name: &str) -> Result<Option<String>> {
        let response = self.get("/v1/resolve", &[("service", name)]).await?;
        Ok(response.url.filter(|url| response.ok && !url.is_empty()))
    }

    async fn list(&self) -> Result<HashMap<String, String>> {
        let response = self.get("/v1/services", &[]).await?;
        Ok(response.services.unwrap_or_default())
    }

    async fn register_instance(&self, instance: &ServiceInstance) -> Result<bool> {
        let body = RegisterBody {
            service: instance.service_name.clone(),
            url: instance.url.clone(),
            metadata: (!instance.metadata.is_empty()).then(|| instance.metadata.clone()),
            instance_id: Some(instance.instance_id.clone()),
            health_check_url: instance.health_check_url.clone(),
        };
        Ok(self.post("/v1/register", &body).await?.ok)
    }

    async fn deregister_instance(&self, name: &str, instance_id: Option<&str>) -> Result<bool> {
        let body = InstanceBody {
            service: name.to_string(),
            instance_id: instance_id.map(str::to_string),
        };
        Ok(self.post("/v1/deregister", &body).await?.ok)
    }

    async fn heartbeat(&self, name: &str, instance_id: Option<&str>) -> Result<bool> {
        let body = InstanceBody {
            service: name.to_string(),
            instance_id: instance_id.map(str::to_string),
        };
        Ok(self.post("/v1/heartbeat", &body).await?.ok)
    }

    async fn set_status(
        &self,
        name: &str,
        status: InstanceStatus,
        instance_id: Option<&str>,
    ) -> Result<bool> {
        let body = StatusBody {
            service: name.to_string(),
            status: status.as_str().to_string(),
            instance_id: instance_id.map(str::to_string),
        };
        Ok(self.post("/v1/status", &body).await?.ok)
    }

    async fn list_instances(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        let response = self.get("/v1/instances", &[("service", name)]).await?;
        Ok(response.instances.unwrap_or_default())
    }
}
