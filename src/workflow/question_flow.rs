//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 0. 检查是否仍被接纳（任务可能在首次运行前就已失效）
//! 1. 提取题目文本（extracting）
//! 2. 检查是否仍被接纳 → 记录文本，进入 solving
//! 3. 生成解答
//! 4. 检查是否仍被接纳 → 记录解答，进入 solved，释放槽位并补位
//!
//! 被移出缓冲区的任务在下一个恢复点发现后立即停止，不再修改任何状态。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FailurePolicy;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::scheduler::SchedulerInner;
use crate::services::llm_service::{extraction_placeholder, solution_placeholder};
use crate::services::QuestionSolver;
use crate::utils::logging::truncate_text;
use crate::workflow::question_ctx::QuestionCtx;

/// 客户端失败按策略处理后的结果
enum StageOutcome {
    Text(String),
    Failed(String),
}

/// 题目处理流程
///
/// - 不持有任何共享状态，状态写入都交给调度器
/// - 只依赖 AI 能力（services）
pub struct QuestionFlow {
    solver: Arc<dyn QuestionSolver>,
    failure_policy: FailurePolicy,
}

impl QuestionFlow {
    /// 创建新的题目处理流程
    pub fn new(solver: Arc<dyn QuestionSolver>, failure_policy: FailurePolicy) -> Self {
        Self {
            solver,
            failure_policy,
        }
    }

    pub fn solver(&self) -> &Arc<dyn QuestionSolver> {
        &self.solver
    }

    pub(crate) async fn run(&self, scheduler: &Arc<SchedulerInner>, ctx: &QuestionCtx) -> PipelineResult<()> {
        // 接纳后到首次运行之间可能已被重置或移出
        if !scheduler.is_admitted(ctx) {
            debug!("{} 启动前已失效，跳过", ctx);
            return Ok(());
        }

        // ========== 阶段 1: 提取 ==========
        info!("{} 🔍 正在提取题目文本...", ctx);

        let extracted = self.solver.extract(&ctx.question_id).await;
        let extracted = match self.apply_policy(ctx, extracted, extraction_placeholder)? {
            StageOutcome::Text(text) => text,
            StageOutcome::Failed(placeholder) => {
                scheduler.record_failure(ctx, placeholder)?;
                return Ok(());
            }
        };

        if !scheduler.record_extraction(ctx, extracted.clone())? {
            info!("{} 已被移出缓冲区，放弃处理", ctx);
            return Ok(());
        }

        debug!("{} 提取文本: {}", ctx, truncate_text(&extracted, 80));

        // ========== 阶段 2: 解答 ==========
        info!("{} 🤖 正在生成解答...", ctx);

        let solved = self.solver.solve(&ctx.question_id, &extracted).await;
        let solved = match self.apply_policy(ctx, solved, |e| solution_placeholder(e, &extracted))? {
            StageOutcome::Text(text) => text,
            StageOutcome::Failed(placeholder) => {
                scheduler.record_failure(ctx, placeholder)?;
                return Ok(());
            }
        };

        if !scheduler.record_solution(ctx, solved)? {
            info!("{} 已被移出缓冲区，放弃处理", ctx);
        }

        Ok(())
    }

    /// 客户端失败按策略转成占位文本；调度异常原样向上抛
    fn apply_policy(
        &self,
        ctx: &QuestionCtx,
        result: PipelineResult<String>,
        placeholder: impl FnOnce(&PipelineError) -> String,
    ) -> PipelineResult<StageOutcome> {
        match result {
            Ok(text) => Ok(StageOutcome::Text(text)),
            Err(e) if e.is_client_failure() => {
                warn!("{} ⚠️ {}", ctx, e);
                let text = placeholder(&e);
                Ok(match self.failure_policy {
                    FailurePolicy::Degrade => StageOutcome::Text(text),
                    FailurePolicy::MarkFailed => StageOutcome::Failed(text),
                })
            }
            Err(e) => Err(e),
        }
    }
}
