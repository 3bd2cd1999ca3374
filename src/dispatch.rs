//! 有界并发分发器
//!
//! 接收来自生产者循环的独立后续任务，最多同时运行 N 个。
//! 槽位占满时 `submit` 挂起生产者，这是刻意的背压设计：
//! 宁可放慢上游事件源，也不让排队任务无限占用内存。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::errors::{IpTaggerError, Result};

/// 固定容量的 fan-out 并发门
#[derive(Debug)]
pub struct BoundedDispatcher {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl BoundedDispatcher {
    /// 创建容量为 `max_concurrency` 的分发器
    pub fn new(max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(IpTaggerError::validation(
                "dispatcher concurrency limit must be positive",
            ));
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(max_concurrency)),
            capacity: max_concurrency,
        })
    }

    /// 提交一个任务
    ///
    /// 挂起直到有空闲槽位，然后并发启动任务并立即返回，不等待
    /// 任务完成。槽位许可随任务一起存活，任务结束（包括 panic）
    /// 时无条件释放，不会永久泄漏。任务之间没有顺序保证。
    pub async fn submit<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Semaphore 只会在 close 后返回错误，而这里从不 close
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("dispatcher semaphore closed");
        trace!("dispatcher slot acquired ({} available)", self.slots.available_permits());

        tokio::spawn(async move {
            let _slot = permit;
            task.await;
        })
    }

    /// 分发器容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前空闲槽位数
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = BoundedDispatcher::new(0).unwrap_err();
        assert!(matches!(err, IpTaggerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_slot_released_after_panic() {
        let dispatcher = BoundedDispatcher::new(1).unwrap();

        let handle = dispatcher.submit(async { panic!("task failed") }).await;
        // panic 的任务也必须归还槽位
        assert!(handle.await.is_err());

        let handle = dispatcher.submit(async {}).await;
        handle.await.unwrap();
        assert_eq!(dispatcher.available_slots(), 1);
    }
}
