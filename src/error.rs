//! 流水线错误类型
//!
//! 前四类错误（配置、找不到图片、服务错误、调用被丢弃）属于"客户端失败"，
//! 由 AI 服务客户端按占位文本策略吸收；`SchedulingAnomaly` 是兜底类别，
//! 只会在调度任务层被捕获。

use thiserror::Error;

/// 流水线错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// 未配置凭证
    #[error("未配置 API key，请先设置凭证")]
    Configuration,

    /// 题目没有关联任何图片
    #[error("题目 {question_id} 没有找到任何图片")]
    NotFound { question_id: String },

    /// 远程服务返回非成功状态或格式错误的响应
    #[error("AI 服务错误: {message}")]
    Service { message: String },

    /// 排队中的调用被丢弃（重置或工作协程已退出）
    #[error("调用队列已关闭，请求被丢弃")]
    GateClosed,

    /// 逃逸出客户端占位边界的异常
    #[error("题目 {question_id} 调度异常: {reason}")]
    SchedulingAnomaly { question_id: String, reason: String },
}

impl PipelineError {
    /// 创建服务错误
    pub fn service(message: impl Into<String>) -> Self {
        PipelineError::Service {
            message: message.into(),
        }
    }

    /// 创建调度异常
    pub fn anomaly(question_id: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::SchedulingAnomaly {
            question_id: question_id.into(),
            reason: reason.into(),
        }
    }

    /// 是否属于客户端失败（受占位文本策略约束）
    pub fn is_client_failure(&self) -> bool {
        !matches!(self, PipelineError::SchedulingAnomaly { .. })
    }
}

/// 流水线结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;
