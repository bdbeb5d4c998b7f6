//! 流水线调度器 - 编排层
//!
//! ## 职责
//!
//! 维护容量固定的处理缓冲区，把每道被接纳的题目依次推进
//! extracting → solving → solved，槽位一释放就立即按注册表顺序补位。
//!
//! ## 设计特点
//!
//! - **单一上下文**：注册表、缓冲区都是调度器实例的字段，没有全局状态
//! - **同步临界区**：所有状态修改及其状态通知都在一把锁内同步完成，锁从不跨越 `.await`
//! - **协作式取消**：任务只在 AI 调用返回后检查自己是否仍被接纳
//! - **失败隔离**：任务中逃逸的任何错误或 panic 都只释放该题的槽位并补位

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::ImageStore;
use crate::models::{Question, QuestionRegistry, QuestionState};
use crate::orchestrator::buffer::ProcessingBuffer;
use crate::services::llm_service::is_placeholder;
use crate::services::QuestionSolver;
use crate::workflow::{QuestionCtx, QuestionFlow, StatusSink};

/// 进度统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub unsolved: usize,
    pub in_progress: usize,
    pub solved: usize,
    pub failed: usize,
    /// 以占位文本完成的题目数（包含在 solved 中）
    pub degraded: usize,
}

/// 锁内的可变状态
struct SchedulerState {
    registry: QuestionRegistry,
    buffer: ProcessingBuffer,
}

/// 调度器与其任务共享的上下文
pub(crate) struct SchedulerInner {
    flow: QuestionFlow,
    images: Arc<dyn ImageStore>,
    sink: Arc<dyn StatusSink>,
    state: Mutex<SchedulerState>,
    /// 缓冲区大小加 unsolved 题目数，供 `wait_until_idle` 订阅
    pending: watch::Sender<usize>,
}

/// 流水线调度器
///
/// 克隆得到的是同一个调度器的句柄。任务的票据检查与随后的 AI 调用入队在同一次
/// poll 内完成，因此应在 `current_thread` 运行时上使用。
#[derive(Clone)]
pub struct PipelineScheduler {
    inner: Arc<SchedulerInner>,
}

impl PipelineScheduler {
    /// 创建调度器，并从图片集合构建注册表
    ///
    /// 创建本身不启动任何处理，需要调用 [`initialize_processing`](Self::initialize_processing)。
    pub fn new(
        config: PipelineConfig,
        solver: Arc<dyn QuestionSolver>,
        images: Arc<dyn ImageStore>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let registry = QuestionRegistry::from_images(&images.list_images());
        let (pending, _) = watch::channel(0);

        Self {
            inner: Arc::new(SchedulerInner {
                flow: QuestionFlow::new(solver, config.failure_policy),
                images,
                sink,
                state: Mutex::new(SchedulerState {
                    registry,
                    buffer: ProcessingBuffer::new(config.buffer_capacity),
                }),
                pending,
            }),
        }
    }

    /// 重置所有临时状态并重新开始处理
    ///
    /// 注册表中的题目全部回到 unsolved，缓冲区与调用队列清空，限流计时归零，
    /// 然后补满缓冲区。可以重复调用。必须在 tokio 运行时内调用。
    pub fn initialize_processing(&self) {
        self.inner.initialize();
    }

    /// 从图片集合重建注册表（图片增加或清空后），然后重新开始处理
    pub fn rebuild_registry(&self) {
        let images = self.inner.images.list_images();
        {
            let mut state = self.inner.lock();
            state.registry = QuestionRegistry::from_images(&images);
            state.buffer.clear();
        }
        info!("📋 注册表已重建，共 {} 道题", self.question_count());
        self.inner.initialize();
    }

    /// 按注册表顺序补满缓冲区
    pub fn fill_buffer(&self) {
        self.inner.fill_buffer();
    }

    /// 把题目移出缓冲区，不会自动补位
    ///
    /// 正在执行的任务会在下一次 AI 调用返回后放弃处理，题目状态保持不变。
    pub fn evict(&self, question_id: &str) -> bool {
        let mut state = self.inner.lock();
        let removed = state.buffer.evict(question_id);
        self.inner.publish(&state);
        if removed {
            warn!("[题目 {}] 已被移出缓冲区", question_id);
        }
        removed
    }

    /// 等待处理结束：缓冲区为空且没有 unsolved 题目
    ///
    /// 移出题目后若仍有 unsolved 题目，需要调用方 [`fill_buffer`](Self::fill_buffer)
    /// 之后才会结束。
    pub async fn wait_until_idle(&self) {
        let mut receiver = self.inner.pending.subscribe();
        let _ = receiver.wait_for(|pending| *pending == 0).await;
    }

    pub fn question_count(&self) -> usize {
        self.inner.lock().registry.len()
    }

    pub fn question(&self, question_id: &str) -> Option<Question> {
        self.inner.lock().registry.get(question_id).cloned()
    }

    pub fn state(&self, question_id: &str) -> Option<QuestionState> {
        self.inner.lock().registry.state(question_id)
    }

    /// 按注册表顺序复制所有题目
    pub fn snapshot(&self) -> Vec<Question> {
        self.inner.lock().registry.snapshot()
    }

    /// 按接纳顺序列出缓冲区中的题号
    pub fn buffer_ids(&self) -> Vec<String> {
        self.inner.lock().buffer.ids()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().buffer.capacity()
    }

    pub fn progress(&self) -> ProgressSummary {
        let questions = self.snapshot();
        let mut summary = ProgressSummary {
            total: questions.len(),
            ..Default::default()
        };
        for question in &questions {
            match question.state {
                QuestionState::Unsolved => summary.unsolved += 1,
                QuestionState::Extracting | QuestionState::Solving => summary.in_progress += 1,
                QuestionState::Solved => summary.solved += 1,
                QuestionState::Failed => summary.failed += 1,
            }
            let degraded = [&question.extracted_text, &question.solved_text]
                .into_iter()
                .flatten()
                .any(|text| is_placeholder(text));
            if question.state == QuestionState::Solved && degraded {
                summary.degraded += 1;
            }
        }
        summary
    }
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(self: &Arc<Self>) {
        let mut state = self.lock();
        let notices: Vec<(String, QuestionState)> = state
            .registry
            .snapshot()
            .into_iter()
            .filter(|q| q.state != QuestionState::Unsolved)
            .map(|q| (q.id, QuestionState::Unsolved))
            .collect();
        state.registry.reset_all();
        state.buffer.clear();
        // 缓冲区清空之后再清调用队列，旧任务此后无法再通过票据检查
        self.flow.solver().reset();

        info!(
            "🚀 开始处理 {} 道题，缓冲区容量 {}",
            state.registry.len(),
            state.buffer.capacity()
        );

        let admitted = Self::admit_locked(&mut state);
        self.dispatch(state, notices, admitted);
    }

    fn fill_buffer(self: &Arc<Self>) {
        let mut state = self.lock();
        let admitted = Self::admit_locked(&mut state);
        self.dispatch(state, Vec::new(), admitted);
    }

    /// 持锁时按注册表顺序接纳 unsolved 题目，直到槽位用完
    fn admit_locked(state: &mut SchedulerState) -> Vec<QuestionCtx> {
        let available = state.buffer.available();
        if available == 0 {
            return Vec::new();
        }

        let candidates: Vec<String> = state
            .registry
            .unsolved_ids()
            .take(available)
            .map(str::to_string)
            .collect();

        let mut admitted = Vec::with_capacity(candidates.len());
        for question_id in candidates {
            let Some(ticket) = state.buffer.admit(&question_id) else {
                break;
            };
            if let Err(e) = state
                .registry
                .transition(&question_id, QuestionState::Extracting)
            {
                error!("[题目 {}] 接纳失败: {}", question_id, e);
                state.buffer.release(&question_id, ticket);
                continue;
            }
            admitted.push(QuestionCtx::new(question_id, ticket));
        }
        admitted
    }

    /// 持锁发出通知，释放锁之后启动新接纳题目的任务
    fn dispatch(
        self: &Arc<Self>,
        state: MutexGuard<'_, SchedulerState>,
        notices: Vec<(String, QuestionState)>,
        admitted: Vec<QuestionCtx>,
    ) {
        self.publish(&state);

        for (question_id, new_state) in &notices {
            self.sink.on_state_change(question_id, *new_state);
        }
        for ctx in &admitted {
            debug!("{} 已接纳", ctx);
            self.sink
                .on_state_change(&ctx.question_id, QuestionState::Extracting);
        }
        drop(state);

        for ctx in admitted {
            self.launch(ctx);
        }
    }

    /// 更新待处理数：缓冲区中的题目加上仍可接纳的题目
    fn publish(&self, state: &SchedulerState) {
        let pending = state.buffer.len() + state.registry.unsolved_ids().count();
        self.pending.send_replace(pending);
    }

    /// 题目是否仍以该票据被接纳
    pub(crate) fn is_admitted(&self, ctx: &QuestionCtx) -> bool {
        self.lock().buffer.holds(&ctx.question_id, ctx.ticket)
    }

    fn launch(self: &Arc<Self>, ctx: QuestionCtx) {
        let inner = self.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(inner.flow.run(&inner, &ctx))
                .catch_unwind()
                .await;

            let anomaly = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e,
                Err(panic) => PipelineError::anomaly(&ctx.question_id, panic_message(panic.as_ref())),
            };

            error!("{} ❌ 处理过程中发生异常: {}", ctx, anomaly);
            inner.release_after_anomaly(&ctx);
        });
    }

    /// 记录提取结果并进入 solving；题目已被移出时返回 `false` 且不做任何修改
    pub(crate) fn record_extraction(&self, ctx: &QuestionCtx, text: String) -> PipelineResult<bool> {
        let mut state = self.lock();
        if !state.buffer.holds(&ctx.question_id, ctx.ticket) {
            return Ok(false);
        }
        state.registry.record_extracted(&ctx.question_id, text)?;
        state
            .registry
            .transition(&ctx.question_id, QuestionState::Solving)?;
        self.sink
            .on_state_change(&ctx.question_id, QuestionState::Solving);
        Ok(true)
    }

    /// 记录解答并进入 solved，释放槽位并补位
    pub(crate) fn record_solution(
        self: &Arc<Self>,
        ctx: &QuestionCtx,
        text: String,
    ) -> PipelineResult<bool> {
        let mut state = self.lock();
        if !state.buffer.holds(&ctx.question_id, ctx.ticket) {
            return Ok(false);
        }
        state.registry.record_solved(&ctx.question_id, text)?;
        state
            .registry
            .transition(&ctx.question_id, QuestionState::Solved)?;
        state.buffer.release(&ctx.question_id, ctx.ticket);

        info!("{} ✅ 解答完成", ctx);

        let admitted = Self::admit_locked(&mut state);
        self.dispatch(
            state,
            vec![(ctx.question_id.clone(), QuestionState::Solved)],
            admitted,
        );
        Ok(true)
    }

    /// 标记为 failed，占位文本写入当前阶段对应的字段，释放槽位并补位
    pub(crate) fn record_failure(
        self: &Arc<Self>,
        ctx: &QuestionCtx,
        placeholder: String,
    ) -> PipelineResult<bool> {
        let mut state = self.lock();
        if !state.buffer.holds(&ctx.question_id, ctx.ticket) {
            return Ok(false);
        }
        let has_text = state
            .registry
            .get(&ctx.question_id)
            .is_some_and(|q| q.extracted_text.is_some());
        if has_text {
            state.registry.record_solved(&ctx.question_id, placeholder)?;
        } else {
            state
                .registry
                .record_extracted(&ctx.question_id, placeholder)?;
        }
        state
            .registry
            .transition(&ctx.question_id, QuestionState::Failed)?;
        state.buffer.release(&ctx.question_id, ctx.ticket);

        let admitted = Self::admit_locked(&mut state);
        self.dispatch(
            state,
            vec![(ctx.question_id.clone(), QuestionState::Failed)],
            admitted,
        );
        Ok(true)
    }

    /// 任务异常退出：释放槽位并补位，题目状态保持最后到达的状态
    fn release_after_anomaly(self: &Arc<Self>, ctx: &QuestionCtx) {
        let mut state = self.lock();
        if !state.buffer.release(&ctx.question_id, ctx.ticket) {
            return;
        }
        let admitted = Self::admit_locked(&mut state);
        self.dispatch(state, Vec::new(), admitted);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "任务 panic".to_string()
    }
}
