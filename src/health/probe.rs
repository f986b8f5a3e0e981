//! HTTP 健康探测
//!
//! 只做最小化的 HTTP/1.0 GET：建立 TCP 连接、发送请求、读取状态行。
//! https 目标在 TCP 连接建立后即视为健康，不做证书校验。

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::discovery::ServiceInstance;
use crate::error::{DiscoveryError, Result};

const MAX_STATUS_LINE: usize = 256;

/// 计算实例的探测地址
///
/// 健康检查地址本身是绝对 URL 时直接使用，否则与实例 `url` 拼接。
pub fn resolve_probe_url(instance: &ServiceInstance) -> String {
    match instance.health_check_url.as_deref() {
        None | Some("") => instance.url.clone(),
        Some(health) if is_absolute(health) => health.to_string(),
        Some(health) => join_health_path(&instance.url, health),
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// 拼接基础地址与健康检查路径，边界处保证恰好一个 `/`
pub fn join_health_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", &base[..base.len() - 1], path),
        (false, false) if !base.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// 解析后的探测目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl ProbeTarget {
    /// 解析探测地址；缺少主机或端口非法时返回错误
    pub fn parse(target: &str) -> Result<Self> {
        let url = Url::parse(target)?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| DiscoveryError::invalid_parameter(format!("missing host: {}", target)))?
            .to_string();

        let scheme = url.scheme().to_string();
        let port = url
            .port()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });
        if port == 0 {
            return Err(DiscoveryError::invalid_parameter(format!(
                "invalid port: {}",
                target
            )));
        }

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == "https"
    }

    /// 连接地址（host:port）
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 探测请求报文
    pub fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path, self.host
        )
    }

    async fn check(&self) -> std::io::Result<bool> {
        let mut stream = TcpStream::connect(self.authority()).await?;
        if self.is_tls() {
            return Ok(true);
        }

        stream.write_all(self.request().as_bytes()).await?;

        let mut buf = [0u8; MAX_STATUS_LINE];
        let mut filled = 0;
        while filled < buf.len() {
            let n = stream.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
            if buf[..filled].contains(&b'\n') {
                break;
            }
        }

        Ok(is_success_status_line(&buf[..filled]))
    }
}

/// 状态行以 `HTTP/` 开头且状态码位于 [200, 300) 时视为健康
pub fn is_success_status_line(response: &[u8]) -> bool {
    let text = String::from_utf8_lossy(response);
    let line = text.lines().next().unwrap_or_default();
    if !line.starts_with("HTTP/") {
        return false;
    }

    line.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .map(|code| (200..300).contains(&code))
        .unwrap_or(false)
}

/// 探测单个实例，任何连接失败、超时或非 2xx 响应都视为不健康
pub async fn probe_instance(instance: &ServiceInstance, timeout: Duration) -> bool {
    let target_url = resolve_probe_url(instance);
    let target = match ProbeTarget::parse(&target_url) {
        Ok(target) => target,
        Err(err) => {
            debug!(
                service = %instance.service_name,
                instance_id = %instance.instance_id,
                target = %target_url,
                error = %err,
                "Invalid health check target"
            );
            return false;
        }
    };

    match tokio::time::timeout(timeout, target.check()).await {
        Ok(Ok(healthy)) => healthy,
        Ok(Err(err)) => {
            debug!(
                service = %instance.service_name,
                instance_id = %instance.instance_id,
                target = %target_url,
                error = %err,
                "Health probe failed"
            );
            false
        }
        Err(_) => {
            debug!(
                service = %instance.service_name,
                instance_id = %instance.instance_id,
                target = %target_url,
                timeout_ms = %timeout.as_millis(),
                "Health probe timed out"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_health_path() {
        assert_eq!(join_health_path("http://a:80/", "/health"), "http://a:80/health");
        assert_eq!(join_health_path("http://a:80", "health"), "http://a:80/health");
        assert_eq!(join_health_path("http://a:80", "/health"), "http://a:80/health");
        assert_eq!(join_health_path("http://a:80/", "health"), "http://a:80/health");
    }

    #[test]
    fn test_resolve_probe_url() {
        let instance = ServiceInstance::new("orders", "http://a:8080/api/")
            .with_health_check("/status");
        assert_eq!(resolve_probe_url(&instance), "http://a:8080/api/status");

        let instance = instance.with_health_check("https://checker:8443/ping");
        assert_eq!(resolve_probe_url(&instance), "https://checker:8443/ping");
    }

    #[test]
    fn test_parse_target() {
        let target = ProbeTarget::parse("http://10.0.0.1:8080/health?deep=1").unwrap();
        assert_eq!(target.host, "10.0.0.1");
        assert_eq!(target.port, 8080);
        assert_eq!(target.path, "/health?deep=1");
        assert_eq!(
            target.request(),
            "GET /health?deep=1 HTTP/1.0\r\nHost: 10.0.0.1\r\nConnection: close\r\n\r\n"
        );

        let target = ProbeTarget::parse("https://secure.local").unwrap();
        assert_eq!(target.port, 443);
        assert_eq!(target.path, "/");
        assert!(target.is_tls());

        assert_eq!(ProbeTarget::parse("http://plain.local").unwrap().port, 80);
        assert!(ProbeTarget::parse("not a url").is_err());
        assert!(ProbeTarget::parse("http://host:0/").is_err());
    }

    #[test]
    fn test_status_line_classification() {
        assert!(is_success_status_line(b"HTTP/1.1 200 OK\r\n"));
        assert!(is_success_status_line(b"HTTP/1.0 204 No Content\r\n\r\n"));
        assert!(!is_success_status_line(b"HTTP/1.1 302 Found\r\n"));
        assert!(!is_success_status_line(b"HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(!is_success_status_line(b"SSH-2.0-OpenSSH\r\n"));
        assert!(!is_success_status_line(b""));
    }
}
