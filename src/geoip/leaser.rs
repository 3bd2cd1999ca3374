//! 上游请求的串行化与限速门（leaser）
//!
//! 同一时刻只允许一个持有者准备发起上游请求，并保证两次上游
//! 请求之间的全局最小间隔。逻辑上等价于"互斥锁 + 上次请求
//! 时间戳 + 单令牌限速"：持有者在锁内根据上次请求时间计算
//! 还需要等待多久，等待结束后记录新的请求时间。

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{Instant, sleep};
use tracing::debug;

/// 上游请求门
///
/// `acquire` 挂起直到上一个持有者释放；tokio 的 Mutex 按 FIFO
/// 公平唤醒等待者，满足到达顺序服务的要求。
pub struct RequestLeaser {
    /// 最近一次上游请求的时间戳，初始为构造时刻
    last_call: Mutex<Instant>,
    min_interval: Duration,
}

impl RequestLeaser {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(Instant::now()),
            min_interval,
        }
    }

    /// 获取许可，挂起直到上一个持有者释放
    pub async fn acquire(&self) -> Lease<'_> {
        Lease {
            guard: self.last_call.lock().await,
            min_interval: self.min_interval,
        }
    }
}

/// 许可凭证
///
/// 持有期间独占发起上游请求的权利。drop 即释放：
/// - 调用过 [`Lease::pace`] 的持有者把本次请求时间传给下一个等待者；
/// - 没有发起请求的持有者（例如二次检查命中缓存）直接 drop，
///   上次请求时间原样传递，下一个等待者的间隔计算不受影响。
pub struct Lease<'a> {
    guard: MutexGuard<'a, Instant>,
    min_interval: Duration,
}

impl Lease<'_> {
    /// 等够最小间隔并记录新的请求时间
    ///
    /// 在真正发起上游请求前调用恰好一次。若距离上次请求不足
    /// `min_interval` 则先睡掉差值，保证全局最小间隔与等待者
    /// 数量无关。
    pub async fn pace(&mut self) {
        let elapsed = self.guard.elapsed();
        if elapsed < self.min_interval {
            let wait = self.min_interval - elapsed;
            debug!("waiting {} ms to make the request", wait.as_millis());
            sleep(wait).await;
        }
        *self.guard = Instant::now();
    }

    /// 上次上游请求的时间戳
    pub fn last_call(&self) -> Instant {
        *self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_pace_enforces_min_interval() {
        let leaser = RequestLeaser::new(Duration::from_millis(500));

        let mut lease = leaser.acquire().await;
        let before = Instant::now();
        lease.pace().await;
        // 构造后立即请求，需要等满 500ms
        assert!(Instant::now() - before >= Duration::from_millis(500));
        drop(lease);

        // 刚请求过，再次 pace 仍需等满间隔
        let mut lease = leaser.acquire().await;
        let before = Instant::now();
        lease.pace().await;
        assert!(Instant::now() - before >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_skips_wait_after_interval_elapsed() {
        let leaser = RequestLeaser::new(Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(600)).await;

        let mut lease = leaser.acquire().await;
        let before = Instant::now();
        lease.pace().await;
        // 间隔已满足，不应再等待
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_without_pace_keeps_timestamp() {
        let leaser = RequestLeaser::new(Duration::from_millis(500));

        let lease = leaser.acquire().await;
        let original = lease.last_call();
        drop(lease);

        // 没有发起请求就释放，时间戳原样传给下一个持有者
        let lease = leaser.acquire().await;
        assert_eq!(lease.last_call(), original);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_holder_at_a_time() {
        let leaser = Arc::new(RequestLeaser::new(Duration::ZERO));

        let lease = leaser.acquire().await;

        let contender = {
            let leaser = Arc::clone(&leaser);
            tokio::spawn(async move {
                let _lease = leaser.acquire().await;
            })
        };

        // 许可被持有时，竞争者拿不到
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(lease);
        contender.await.unwrap();
    }
}
