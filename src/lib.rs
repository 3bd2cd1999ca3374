//! iptagger - 证书透明度流打标管道的并发核心
//!
//! 为外部的打标管道提供 IP 地理位置查询能力，包括：
//! - 带 TTL 的地理位置缓存（滑动过期 + 定期清扫）
//! - 上游请求串行化与最小间隔限速（leaser）
//! - 无状态的上游查询适配器（ip2c 风格的分号记录）
//! - 有界并发分发器（生产者背压）
//!
//! # Architecture
//! - `geoip`: 缓存、leaser 与上游查询客户端
//! - `dispatch`: 固定容量的 fan-out 并发门
//! - `tagger`: DNS 解析 + 打标的消费端
//! - `config`: 配置管理（构造时校验，启动失败即致命）
//! - `errors`: 统一错误类型

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod geoip;
pub mod tagger;

pub use config::GeoCacheConfig;
pub use dispatch::BoundedDispatcher;
pub use errors::{IpTaggerError, Result};
pub use geoip::{ExpiringCache, GeoLookup, Ip2cClient, RequestLeaser, UNKNOWN_LOCATION};
pub use tagger::DnsIpTagger;
