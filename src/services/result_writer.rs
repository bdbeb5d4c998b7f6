//! 结果写入服务 - 业务能力层
//!
//! 只负责"把题目结果写入文件"能力，不关心流程

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::models::Question;

/// 写入文件的结果报告
#[derive(Debug, Serialize)]
struct SolutionReport<'a> {
    generated_at: String,
    questions: &'a [Question],
}

/// 结果写入服务
pub struct ResultWriter {
    output_path: String,
}

impl ResultWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            output_path: path.into(),
        }
    }

    /// 渲染为 TOML 文本
    pub fn render(questions: &[Question]) -> Result<String> {
        let report = SolutionReport {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            questions,
        };
        toml::to_string_pretty(&report).context("无法序列化结果报告")
    }

    /// 写入所有题目的结果（覆盖旧文件）
    pub async fn write(&self, questions: &[Question]) -> Result<()> {
        debug!("写入结果: {} 道题 → {}", questions.len(), self.output_path);

        let content = Self::render(questions)?;
        tokio::fs::write(&self.output_path, content)
            .await
            .with_context(|| format!("写入结果文件失败: {}", self.output_path))?;

        Ok(())
    }
}
