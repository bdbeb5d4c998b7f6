//! # Question Solve
//!
//! 拍题解答流水线：按题号归组的题目图片，依次经过"提取文本 → 生成解答"两次 AI 调用
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（出站调用队列），只暴露能力
//! - `ApiGate` - 唯一的调用队列，FIFO 派发，调用之间保持最小间隔
//! - `ImageStore` / `CredentialStore` - 外部协作方接口
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单道题
//! - `AiServiceClient` - 提取 / 解答能力，失败可吸收为占位文本
//! - `ResultWriter` - 写结果文件能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `QuestionCtx` - 上下文封装（题号 + 接纳票据）
//! - `QuestionFlow` - 流程编排（extract → solve → 完成）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 流水线调度器，管理缓冲区和补位
//! - `orchestrator/batch_processor` - 应用入口，跑完所有题目
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, FailurePolicy, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use infrastructure::{ApiGate, CredentialStore, ImageStore, MemoryImageStore, StaticCredentialStore};
pub use models::{ImageRecord, Question, QuestionRegistry, QuestionState};
pub use orchestrator::{App, PipelineScheduler, ProgressSummary};
pub use services::{AiServiceClient, QuestionSolver};
pub use workflow::{LoggingStatusSink, StatusSink};
