//! GeoIP 查询模块
//!
//! 提供 IP 地址地理位置查询功能：
//! - `ExpiringCache`：带 TTL 的查询缓存（滑动过期 + 清扫）
//! - `RequestLeaser`：上游请求串行化与最小间隔限速
//! - `Ip2cClient`：外部 API 查询适配器（ip2c.org 风格）

mod cache;
mod client;
mod leaser;

pub use cache::{ExpiringCache, UNKNOWN_LOCATION};
pub use client::{GeoLookup, Ip2cClient};
pub use leaser::{Lease, RequestLeaser};
