//! 限流调用闸门 - 基础设施层
//!
//! 持有唯一的出站调用队列，只暴露"排队执行"的能力
//!
//! - 同一时刻最多一个调用在执行
//! - 严格按提交顺序（FIFO）派发，与调用方无关
//! - 相邻两次调用之间，从上一次调用完成到下一次调用开始，至少间隔 `delay`
//! - 每个提交的结果只回送给它自己的调用方，失败不影响队列中的其他调用

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

type GateCall = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// 队列中的一个待执行调用
struct GateJob {
    seq: u64,
    generation: u64,
    call: GateCall,
}

/// 闸门与工作协程共享的状态
struct GateShared {
    delay: Duration,
    /// 每次 reset 自增，旧代的排队调用会被丢弃
    generation: AtomicU64,
    /// 上一次调用完成的时间
    last_call: Mutex<Option<Instant>>,
}

impl GateShared {
    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn next_start(&self) -> Option<Instant> {
        self.last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|last| last + self.delay)
    }

    fn mark_completed(&self) {
        *self.last_call.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}

/// 限流调用闸门
///
/// 克隆得到的是同一个闸门的句柄。创建时会在当前 tokio 运行时上启动唯一的
/// 消费协程，因此必须在运行时内调用 [`ApiGate::new`]。
#[derive(Clone)]
pub struct ApiGate {
    sender: mpsc::UnboundedSender<GateJob>,
    shared: Arc<GateShared>,
    next_seq: Arc<AtomicU64>,
}

impl ApiGate {
    /// 创建新的闸门
    pub fn new(delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(GateShared {
            delay,
            generation: AtomicU64::new(0),
            last_call: Mutex::new(None),
        });

        tokio::spawn(drain(receiver, shared.clone()));

        Self {
            sender,
            shared,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 提交一个延迟执行的调用
    ///
    /// 入队是同步完成的：函数返回时调用已经排在队尾。返回的 future
    /// 在调用执行完毕后给出其结果；若调用在执行前被 [`reset`](Self::reset)
    /// 丢弃、执行中 panic，或工作协程已退出，则返回 `GateClosed`。
    pub fn submit<F, Fut, T>(
        &self,
        call: F,
    ) -> impl Future<Output = PipelineResult<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = GateJob {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            generation: self.shared.generation.load(Ordering::SeqCst),
            call: Box::new(move || {
                async move {
                    let _ = tx.send(call().await);
                }
                .boxed()
            }),
        };

        let queued = self.sender.send(job).is_ok();

        async move {
            if !queued {
                return Err(PipelineError::GateClosed);
            }
            rx.await.map_err(|_| PipelineError::GateClosed)
        }
    }

    /// 清空排队中的调用并重置计时
    ///
    /// 正在执行的调用不受影响，它完成后仍会更新计时。
    pub fn reset(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.last_call.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("调用闸门已重置，当前代: {}", generation);
    }
}

/// 唯一的消费协程
async fn drain(mut receiver: mpsc::UnboundedReceiver<GateJob>, shared: Arc<GateShared>) {
    while let Some(job) = receiver.recv().await {
        if shared.is_stale(job.generation) {
            debug!("丢弃已失效的调用 #{}", job.seq);
            continue;
        }

        if let Some(start_at) = shared.next_start() {
            tokio::time::sleep_until(start_at).await;
            if shared.is_stale(job.generation) {
                debug!("等待期间闸门被重置，丢弃调用 #{}", job.seq);
                continue;
            }
        }

        debug!("开始执行调用 #{}", job.seq);
        if AssertUnwindSafe((job.call)()).catch_unwind().await.is_err() {
            warn!("调用 #{} 执行时 panic，已隔离", job.seq);
        }
        shared.mark_completed();
    }

    debug!("调用闸门已关闭");
}
