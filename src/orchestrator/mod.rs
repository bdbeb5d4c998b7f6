//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责并发窗口和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `buffer` - 处理缓冲区
//! - 固定容量的在途题号集合
//! - 接纳票据，判断任务是否仍然有效
//!
//! ### `scheduler` - 流水线调度器
//! - 持有注册表与缓冲区
//! - 接纳、补位、移出、重置
//! - 启动每道题的处理任务
//!
//! ### `batch_processor` - 批量处理器
//! - 组装各层、跑完所有题目、输出结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (App)
//!     ↓
//! scheduler (缓冲区 + 注册表)
//!     ↓
//! workflow::QuestionFlow (处理单道题)
//!     ↓
//! services (能力层：extract / solve)
//!     ↓
//! infrastructure (基础设施：ApiGate)
//! ```

pub mod batch_processor;
pub mod buffer;
pub mod scheduler;

// 重新导出主要类型
pub use batch_processor::App;
pub use buffer::ProcessingBuffer;
pub use scheduler::{PipelineScheduler, ProgressSummary};
