/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::ProgressSummary;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则按 `verbose` 选择 debug 或 info。重复调用无副作用。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 拍题解答流水线");
    info!("🖼️ 提取模型: {}", config.vision_model_name);
    info!("🧮 解答模型: {}", config.text_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录题目加载信息
///
/// # 参数
/// - `total`: 题目总数
/// - `capacity`: 缓冲区容量
pub fn log_questions_loaded(total: usize, capacity: usize) {
    info!("✓ 找到 {} 道待处理的题目", total);
    info!("📋 同时最多处理 {} 道，完成一道补入一道", capacity);
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 进度统计
/// - `output_file`: 结果文件路径
pub fn print_final_stats(summary: &ProgressSummary, output_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 完成: {}/{}", summary.solved, summary.total);
    if summary.degraded > 0 {
        info!("⚠️ 其中以占位文本完成: {}", summary.degraded);
    }
    info!("❌ 失败: {}", summary.failed);
    if summary.unsolved + summary.in_progress > 0 {
        info!("⏸️ 未完成: {}", summary.unsolved + summary.in_progress);
    }
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_file);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
