//! 带 TTL 的 IP 地理位置缓存
//!
//! 新鲜条目直接命中并滑动过期时间；过期或缺失的条目走
//! leaser 门控的刷新路径：拿到许可后先二次检查（等待期间
//! 可能已有别的调用方刷新过同一个 key），仍然过期才真正
//! 调用上游。上游失败以 `"unknown"` 哨兵值入缓存，与正常
//! 结果一样按 TTL 过期重试，避免持续失败的 IP 反复打到
//! 上游服务。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::GeoCacheConfig;
use crate::errors::Result;
use crate::geoip::client::{GeoLookup, Ip2cClient};
use crate::geoip::leaser::RequestLeaser;

/// 上游查询失败时缓存的哨兵标签
pub const UNKNOWN_LOCATION: &str = "unknown";

/// 缓存条目
///
/// 每次刷新原地覆盖，不保留历史。
#[derive(Debug, Clone)]
struct CacheEntry {
    location: String,
    last_refresh: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, max_ttl: Duration) -> bool {
        self.last_refresh.elapsed() < max_ttl
    }
}

/// IP -> 地理位置标签的 TTL 缓存
///
/// 缓存 map 是本组件唯一的共享可变状态，DashMap 的分段锁
/// 保证同一 key 的检查-写入对其他查询原子可见。
pub struct ExpiringCache {
    entries: DashMap<String, CacheEntry>,
    max_ttl: Duration,
    leaser: RequestLeaser,
    client: Arc<dyn GeoLookup>,
}

impl ExpiringCache {
    /// 按配置创建缓存，使用默认的 ip2c 上游适配器
    ///
    /// 配置非法时返回 Validation 错误（启动期致命）。
    pub fn new(config: &GeoCacheConfig) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(Ip2cClient::new(
            &config.api_url_template,
            config.request_timeout,
        ));
        Ok(Self::with_client(config, client))
    }

    /// 使用自定义上游适配器创建缓存（测试注入桩实现）
    pub fn with_client(config: &GeoCacheConfig, client: Arc<dyn GeoLookup>) -> Self {
        trace!(
            "ExpiringCache initialized: ttl={:?}, spacing={:?}, provider={}",
            config.cache_ttl,
            config.request_spacing,
            client.name()
        );
        Self {
            entries: DashMap::new(),
            max_ttl: config.cache_ttl,
            leaser: RequestLeaser::new(config.request_spacing),
            client,
        }
    }

    /// 查询 IP 的地理位置标签
    ///
    /// 命中新鲜条目时直接返回并把过期时间滑动到现在，不发起
    /// 上游请求也不阻塞；否则走门控刷新。上游错误不向调用方
    /// 传播，最坏结果是一个会在 TTL 后自愈的 `"unknown"`。
    pub async fn lookup(&self, ip: &str) -> String {
        if let Some(location) = self.get_fresh(ip) {
            trace!("geo cache hit for {}: {}", ip, location);
            return location;
        }
        self.refresh(ip).await
    }

    /// 门控刷新路径
    async fn refresh(&self, ip: &str) -> String {
        let mut lease = self.leaser.acquire().await;

        // 等待许可期间这个 key 可能已经被别的调用方刷新过
        if let Some(location) = self.get_fresh(ip) {
            trace!("geo cache refreshed while waiting for lease: {}", ip);
            return location;
        }

        lease.pace().await;
        debug!("requesting location for {} at {:?}", ip, Instant::now());
        let location = match self.client.resolve(ip).await {
            Ok(location) => location,
            Err(e) => {
                warn!("geo lookup for {} failed: {}", ip, e);
                UNKNOWN_LOCATION.to_string()
            }
        };

        self.entries.insert(
            ip.to_string(),
            CacheEntry {
                location: location.clone(),
                last_refresh: Instant::now(),
            },
        );
        location
    }

    /// 命中新鲜条目时返回其标签并滑动过期时间
    fn get_fresh(&self, ip: &str) -> Option<String> {
        let mut entry = self.entries.get_mut(ip)?;
        if !entry.is_fresh(self.max_ttl) {
            return None;
        }
        entry.last_refresh = Instant::now();
        Some(entry.location.clone())
    }

    /// 清扫过期条目
    ///
    /// 删除所有存活时间超过 TTL 的条目；可与 `lookup` 并发调用，
    /// 空缓存时是 no-op。
    pub fn sweep(&self) {
        // 清扫期间 lookup 可能同时插入新条目，淘汰数在 retain
        // 闭包内计数，不能用前后 len 相减
        let mut evicted = 0usize;
        self.entries.retain(|_, entry| {
            let fresh = entry.last_refresh.elapsed() <= self.max_ttl;
            if !fresh {
                evicted += 1;
            }
            fresh
        });
        if evicted > 0 {
            debug!("geo cache sweep evicted {} stale entries", evicted);
        }
    }

    /// 启动后台清扫任务
    ///
    /// 每隔 `interval` 调用一次 [`ExpiringCache::sweep`]，
    /// 随返回的 JoinHandle 一起存活。
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        info!("geo cache sweeper started (interval: {:?})", interval);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                cache.sweep();
            }
        })
    }

    /// 当前缓存条目数（含未清扫的过期条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
