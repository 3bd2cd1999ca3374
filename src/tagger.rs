//! DNS + 地理位置打标器
//!
//! 打标管道的消费端：把域名解析为 IPv4 地址，逐个地址查询
//! 地理位置缓存，产出 `"<ip> (<location>)"` 形式的标签。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::{IpTaggerError, Result};
use crate::geoip::ExpiringCache;

/// 域名解析的默认短超时
const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// 基于 DNS 解析和地理位置缓存的打标器
pub struct DnsIpTagger {
    cache: Arc<ExpiringCache>,
    resolve_timeout: Duration,
}

impl DnsIpTagger {
    pub fn new(cache: Arc<ExpiringCache>) -> Self {
        Self {
            cache,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// 自定义域名解析超时
    pub fn with_resolve_timeout(cache: Arc<ExpiringCache>, resolve_timeout: Duration) -> Self {
        Self {
            cache,
            resolve_timeout,
        }
    }

    /// 非空输入即为有效
    // TODO 补充域名格式校验
    pub fn is_valid(&self, data: &str) -> bool {
        !data.is_empty()
    }

    /// 打标器名称（用于管道注册）
    pub fn name(&self) -> &'static str {
        "iptagger"
    }

    /// 为域名生成标签
    ///
    /// 解析失败或超时不向上层报错，只是"没有产出标签"；
    /// 标签按地址解析顺序排列。
    pub async fn tags(&self, domain: &str) -> Vec<String> {
        let ips = match self.resolve_ipv4(domain).await {
            Ok(ips) => ips,
            Err(e) => {
                debug!("failed dns for {}: {}", domain, e);
                return Vec::new();
            }
        };

        let mut tags = Vec::with_capacity(ips.len());
        for ip in ips {
            let location = self.cache.lookup(&ip).await;
            tags.push(format!("{} ({})", ip, location));
        }
        tags
    }

    /// 解析域名的 IPv4 地址，带短超时
    async fn resolve_ipv4(&self, domain: &str) -> Result<Vec<String>> {
        let addrs = timeout(self.resolve_timeout, lookup_host((domain, 0)))
            .await
            .map_err(|_| {
                IpTaggerError::resolution(format!("dns lookup for {} timed out", domain))
            })?
            .map_err(|e| IpTaggerError::resolution(e.to_string()))?;

        Ok(addrs
            .filter(SocketAddr::is_ipv4)
            .map(|addr| addr.ip().to_string())
            .collect())
    }
}
