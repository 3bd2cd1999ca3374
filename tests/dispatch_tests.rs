//! BoundedDispatcher 行为测试

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::sleep;

use iptagger::{BoundedDispatcher, ExpiringCache, GeoCacheConfig, GeoLookup};

/// 计数并在门上等待的任务组
///
/// `gate` 初始为 0 个许可，任务在门上阻塞直到测试放行，
/// 以便观察同时运行的任务数。
struct GatedTasks {
    gate: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl GatedTasks {
    fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn task(&self) -> impl Future<Output = ()> + Send + 'static {
        let gate = Arc::clone(&self.gate);
        let running = Arc::clone(&self.running);
        let max_running = Arc::clone(&self.max_running);
        let completed = Arc::clone(&self.completed);
        async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            max_running.fetch_max(now, Ordering::SeqCst);
            // 消耗许可而非归还，保证一个许可只放行一个任务
            gate.acquire().await.unwrap().forget();
            running.fetch_sub(1, Ordering::SeqCst);
            completed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn test_capacity_two_runs_at_most_two_concurrently() {
    let dispatcher = Arc::new(BoundedDispatcher::new(2).unwrap());
    assert_eq!(dispatcher.capacity(), 2);
    let tasks = GatedTasks::new();

    // 生产者提交 5 个任务；槽位占满后 submit 阻塞生产者
    let producer = {
        let dispatcher = Arc::clone(&dispatcher);
        let task_futures: Vec<_> = (0..5).map(|_| tasks.task()).collect();
        tokio::spawn(async move {
            let mut handles = Vec::new();
            for task in task_futures {
                handles.push(dispatcher.submit(task).await);
            }
            handles
        })
    };

    // 前两个任务占住槽位，第三次 submit 阻塞
    sleep(Duration::from_millis(50)).await;
    assert_eq!(tasks.running.load(Ordering::SeqCst), 2);
    assert!(!producer.is_finished());

    // 放行一个任务，生产者得以继续提交
    tasks.gate.add_permits(1);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(tasks.completed.load(Ordering::SeqCst), 1);
    assert_eq!(tasks.running.load(Ordering::SeqCst), 2);

    // 放行其余任务，全部完成
    tasks.gate.add_permits(4);
    for handle in producer.await.unwrap() {
        handle.await.unwrap();
    }
    assert_eq!(tasks.completed.load(Ordering::SeqCst), 5);

    // 任意时刻同时运行的任务数不超过容量
    assert!(tasks.max_running.load(Ordering::SeqCst) <= 2);
    assert_eq!(dispatcher.available_slots(), 2);
}

#[tokio::test]
async fn test_submit_returns_before_task_completes() {
    let dispatcher = BoundedDispatcher::new(2).unwrap();
    let gate = Arc::new(Semaphore::new(0));

    let handle = {
        let gate = Arc::clone(&gate);
        dispatcher
            .submit(async move {
                let _permit = gate.acquire().await.unwrap();
            })
            .await
    };

    // submit 已返回而任务尚未完成
    assert!(!handle.is_finished());
    gate.add_permits(1);
    handle.await.unwrap();
}

/// 生产者 fan-out + 缓存消费的组合：多个并发任务查询同一个
/// key 时上游只被调用一次。
#[tokio::test]
async fn test_dispatched_tasks_share_cache() {
    use async_trait::async_trait;

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeoLookup for CountingClient {
        async fn resolve(&self, _ip: &str) -> iptagger::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            Ok("US".to_string())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    let client = Arc::new(CountingClient {
        calls: AtomicUsize::new(0),
    });
    let config = GeoCacheConfig {
        request_spacing: Duration::ZERO,
        ..Default::default()
    };
    let cache = Arc::new(ExpiringCache::with_client(
        &config,
        Arc::clone(&client) as Arc<dyn GeoLookup>,
    ));
    let dispatcher = BoundedDispatcher::new(4).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let handle = dispatcher
            .submit(async move {
                assert_eq!(cache.lookup("8.8.8.8").await, "US");
            })
            .await;
        handles.push(handle);
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}
