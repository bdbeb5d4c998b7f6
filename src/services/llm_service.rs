//! AI 服务 - 业务能力层
//!
//! 只负责"提取题目文本"和"生成解答"两种能力，不关心流程
//!
//! - 每次调用都经过 [`ApiGate`] 排队限流
//! - 内部不做重试，失败只出现一次
//! - `extract` / `solve` 返回带类型的错误，占位文本由调用方按策略生成

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::clients::{ChatBackend, ChatRequest};
use crate::config::{Config, MAX_TOKENS, TEMPERATURE};
use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::{ApiGate, CredentialStore, ImageStore};

/// 提取题目文本的固定提示词
pub const EXTRACTION_PROMPT: &str = "请识别图片中的题目内容。图片可能是同一道题的多个部分，请按顺序合并。\
要求：\n1. 完整准确地转写题干、选项和所有已知条件\n2. 数学公式使用 LaTeX 表示\n\
3. 图表请用文字描述其中的关键信息\n4. 只输出题目内容，不要作答";

/// 生成解答的固定格式要求
pub const SOLUTION_PROMPT: &str = "请解答下面的题目，按以下格式输出：\n\
【分析】说明考查的知识点和解题思路\n【解答】给出完整的解题步骤\n【答案】给出最终答案";

const EXTRACTION_FAILED: &str = "[提取失败]";
const SOLUTION_FAILED: &str = "[解答失败]";

/// 提取失败时的占位文本
pub fn extraction_placeholder(error: &PipelineError) -> String {
    format!("{} {}", EXTRACTION_FAILED, error)
}

/// 解答失败时的占位文本，保留原始提取文本以便人工处理
pub fn solution_placeholder(error: &PipelineError, extracted_text: &str) -> String {
    format!("{} {}\n\n原始题目文本：\n{}", SOLUTION_FAILED, error, extracted_text)
}

/// 文本是否为占位文本（降级结果）
pub fn is_placeholder(text: &str) -> bool {
    text.starts_with(EXTRACTION_FAILED) || text.starts_with(SOLUTION_FAILED)
}

/// 单道题的 AI 能力
#[async_trait]
pub trait QuestionSolver: Send + Sync {
    /// 从题目的所有图片中提取文本
    async fn extract(&self, question_id: &str) -> PipelineResult<String>;

    /// 根据提取文本生成解答
    async fn solve(&self, question_id: &str, extracted_text: &str) -> PipelineResult<String>;

    /// 丢弃尚未发出的调用；调度器重置时调用
    fn reset(&self) {}
}

/// AI 服务客户端
///
/// 自身无状态：凭证与图片都在调用时读取。
pub struct AiServiceClient {
    gate: ApiGate,
    backend: Arc<dyn ChatBackend>,
    images: Arc<dyn ImageStore>,
    credentials: Arc<dyn CredentialStore>,
    vision_model: String,
    text_model: String,
}

impl AiServiceClient {
    pub fn new(
        gate: ApiGate,
        backend: Arc<dyn ChatBackend>,
        images: Arc<dyn ImageStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let defaults = Config::default();
        Self {
            gate,
            backend,
            images,
            credentials,
            vision_model: defaults.vision_model_name,
            text_model: defaults.text_model_name,
        }
    }

    /// 指定提取与解答使用的模型
    pub fn with_models(mut self, vision_model: impl Into<String>, text_model: impl Into<String>) -> Self {
        self.vision_model = vision_model.into();
        self.text_model = text_model.into();
        self
    }

    fn api_key(&self) -> PipelineResult<String> {
        self.credentials.credential().ok_or(PipelineError::Configuration)
    }

    /// 通过闸门发送请求
    async fn send(&self, api_key: String, request: ChatRequest) -> PipelineResult<String> {
        let backend = self.backend.clone();
        self.gate
            .submit(move || async move { backend.complete(&api_key, request).await })
            .await?
    }
}

#[async_trait]
impl QuestionSolver for AiServiceClient {
    async fn extract(&self, question_id: &str) -> PipelineResult<String> {
        let api_key = self.api_key()?;

        let images: Vec<String> = self
            .images
            .images_for(question_id)
            .into_iter()
            .map(|image| image.url)
            .collect();
        if images.is_empty() {
            return Err(PipelineError::NotFound {
                question_id: question_id.to_string(),
            });
        }

        debug!("[题目 {}] 提取请求包含 {} 张图片", question_id, images.len());

        let request = ChatRequest {
            model: self.vision_model.clone(),
            prompt: EXTRACTION_PROMPT.to_string(),
            images,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        self.send(api_key, request).await
    }

    async fn solve(&self, question_id: &str, extracted_text: &str) -> PipelineResult<String> {
        let api_key = self.api_key()?;

        debug!(
            "[题目 {}] 解答请求，题目文本 {} 字符",
            question_id,
            extracted_text.chars().count()
        );

        let request = ChatRequest {
            model: self.text_model.clone(),
            prompt: format!("{}\n\n题目：\n{}", SOLUTION_PROMPT, extracted_text),
            images: Vec::new(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        self.send(api_key, request).await
    }

    fn reset(&self) {
        self.gate.reset();
    }
}
