//! 外部 GeoIP API 查询适配器
//!
//! 使用外部 HTTP API 进行 IP 地理位置查询（如 ip2c.org）。
//! 无状态、无缓存、无限速 —— 缓存与限速由上层的
//! `ExpiringCache` + `RequestLeaser` 负责，按约定只有持有
//! leaser 许可的调用方才会调用本适配器。

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;
use ureq::Agent;

use crate::errors::{IpTaggerError, Result};

/// GeoIP 查询 trait
///
/// 上游适配器的统一接口，测试中用桩实现替换。
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// 查询单个 IP 地址的地理位置标签
    async fn resolve(&self, ip: &str) -> Result<String>;

    /// 获取 provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// ip2c 风格的外部 API 适配器
///
/// `api_url_template` 使用 `{ip}` 作为占位符，
/// 例如: `https://ip2c.org/?ip={ip}`。
/// 响应体为分号分隔的文本记录，取最后一个字段作为位置标签。
pub struct Ip2cClient {
    api_url_template: String,
    agent: Agent,
}

impl Ip2cClient {
    /// 创建适配器，`request_timeout` 为单次请求的硬超时
    pub fn new(api_url_template: &str, request_timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(request_timeout))
            .build()
            .into();

        Self {
            api_url_template: api_url_template.to_string(),
            agent,
        }
    }

    /// 发起请求并解析响应（同步，在 spawn_blocking 中调用）
    fn fetch_sync(agent: &Agent, url: &str) -> Result<String> {
        let resp = agent.get(url).call()?;
        let body = resp.into_body().read_to_string()?;
        Self::parse_body(&body)
    }

    /// 解析分号分隔的响应记录，取最后一个字段
    ///
    /// 空响应或最后一个字段为空都视为解析错误，
    /// 不允许悄悄返回空标签。
    fn parse_body(body: &str) -> Result<String> {
        let location = body
            .rsplit(';')
            .next()
            .unwrap_or_default()
            .trim();
        if location.is_empty() {
            return Err(IpTaggerError::parse(format!(
                "empty location field in upstream response {:?}",
                body
            )));
        }
        Ok(location.to_string())
    }
}

#[async_trait]
impl GeoLookup for Ip2cClient {
    /// 查询 IP 地理位置
    ///
    /// 使用 spawn_blocking 在线程池中执行同步 HTTP 请求；
    /// 超时由 Agent 的全局 timeout 保证。
    async fn resolve(&self, ip: &str) -> Result<String> {
        let url = self.api_url_template.replace("{ip}", ip);
        let agent = self.agent.clone();

        trace!("requesting upstream geo lookup: {}", url);
        tokio::task::spawn_blocking(move || Self::fetch_sync(&agent, &url))
            .await
            .map_err(|e| IpTaggerError::transport(format!("blocking task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "ip2c"
    }
}
