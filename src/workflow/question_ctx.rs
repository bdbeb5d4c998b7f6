//! 题目处理上下文
//!
//! 封装"我正在处理哪道题、凭哪张票据被接纳"这一信息

use std::fmt::Display;

/// 题目处理上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCtx {
    /// 题号
    pub question_id: String,

    /// 接纳票据，用于判断任务是否仍然有效
    pub ticket: u64,
}

impl QuestionCtx {
    /// 创建新的题目上下文
    pub fn new(question_id: String, ticket: u64) -> Self {
        Self {
            question_id,
            ticket,
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[题目 {} #{}]", self.question_id, self.ticket)
    }
}
