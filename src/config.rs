//! 配置管理
//!
//! 所有配置通过环境变量加载并带默认值，或由调用方显式构造注入。
//! 配置在构造时校验，非法值属于启动期致命错误，不在运行期恢复。

use std::env;
use std::time::Duration;

use tracing::debug;

use crate::errors::{IpTaggerError, Result};

/// 默认上游查询地址模板（`{ip}` 为占位符）
pub const DEFAULT_API_URL: &str = "https://ip2c.org/?ip={ip}";

const DEFAULT_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_REQUEST_SPACING_MS: u64 = 2000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// 地理位置缓存配置
///
/// 显式注入，不走全局单例，便于在测试中创建多个独立实例。
#[derive(Debug, Clone)]
pub struct GeoCacheConfig {
    /// 缓存条目的最大存活时间
    pub cache_ttl: Duration,
    /// 两次上游请求之间的全局最小间隔
    pub request_spacing: Duration,
    /// 单次上游请求的硬超时
    pub request_timeout: Duration,
    /// 分发器的最大并发数
    pub max_concurrency: usize,
    /// 上游查询地址模板，`{ip}` 为占位符
    pub api_url_template: String,
}

impl Default for GeoCacheConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_spacing: Duration::from_millis(DEFAULT_REQUEST_SPACING_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            api_url_template: DEFAULT_API_URL.to_string(),
        }
    }
}

impl GeoCacheConfig {
    /// 从环境变量加载配置，缺失的项使用默认值
    ///
    /// 识别的环境变量：
    /// - `GEOIP_CACHE_TTL_SECS`
    /// - `GEOIP_REQUEST_SPACING_MS`
    /// - `GEOIP_REQUEST_TIMEOUT_SECS`
    /// - `TAGGER_MAX_CONCURRENCY`
    /// - `GEOIP_API_URL`
    pub fn from_env() -> Result<Self> {
        let config = Self {
            cache_ttl: Duration::from_secs(env_u64(
                "GEOIP_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            request_spacing: Duration::from_millis(env_u64(
                "GEOIP_REQUEST_SPACING_MS",
                DEFAULT_REQUEST_SPACING_MS,
            )?),
            request_timeout: Duration::from_secs(env_u64(
                "GEOIP_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            max_concurrency: env_u64("TAGGER_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY as u64)?
                as usize,
            api_url_template: env::var("GEOIP_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
        };
        config.validate()?;
        debug!(
            "GeoCacheConfig loaded: ttl={:?}, spacing={:?}, timeout={:?}, concurrency={}",
            config.cache_ttl, config.request_spacing, config.request_timeout, config.max_concurrency
        );
        Ok(config)
    }

    /// 校验配置值是否合法
    ///
    /// 间隔（spacing）允许为 0（表示不限速），其余数值必须为正。
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl.is_zero() {
            return Err(IpTaggerError::validation("cache TTL must be positive"));
        }
        if self.request_timeout.is_zero() {
            return Err(IpTaggerError::validation(
                "upstream request timeout must be positive",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(IpTaggerError::validation(
                "dispatcher concurrency limit must be positive",
            ));
        }
        if !self.api_url_template.contains("{ip}") {
            return Err(IpTaggerError::validation(format!(
                "API URL template \"{}\" is missing the {{ip}} placeholder",
                self.api_url_template
            )));
        }
        Ok(())
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| {
            IpTaggerError::validation(format!("invalid value \"{}\" for {}", value, key))
        }),
        Err(_) => Ok(default),
    }
}
