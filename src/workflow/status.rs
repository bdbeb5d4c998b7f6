//! 状态通知
//!
//! 调度器在每次状态迁移的同一临界区内同步调用，不关心返回值。
//! 实现不能回调调度器。

use tracing::{debug, info};

use crate::models::QuestionState;

/// 状态变化的接收方
pub trait StatusSink: Send + Sync {
    fn on_state_change(&self, question_id: &str, state: QuestionState);
}

impl<F> StatusSink for F
where
    F: Fn(&str, QuestionState) + Send + Sync,
{
    fn on_state_change(&self, question_id: &str, state: QuestionState) {
        self(question_id, state)
    }
}

/// 把状态变化写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingStatusSink;

impl StatusSink for LoggingStatusSink {
    fn on_state_change(&self, question_id: &str, state: QuestionState) {
        match state {
            QuestionState::Solved => info!("[题目 {}] ✅ 已完成", question_id),
            QuestionState::Failed => info!("[题目 {}] ❌ 已失败", question_id),
            other => debug!("[题目 {}] 状态 → {}", question_id, other),
        }
    }
}
