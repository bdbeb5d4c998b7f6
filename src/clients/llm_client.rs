//! LLM API 客户端
//!
//! 封装一次 chat completion 调用。兼容 OpenAI API 的服务均可使用。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// 一次出站请求
///
/// `images` 非空时构建为多部分（文本 + 图片）的用户消息。
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub images: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 远程 AI 服务
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 发送请求，返回首个 choice 的消息内容
    async fn complete(&self, api_key: &str, request: ChatRequest) -> PipelineResult<String>;
}

/// 基于 `async-openai` 的实现
pub struct OpenAiBackend {
    api_base_url: String,
}

impl OpenAiBackend {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
        }
    }

    fn build_request(request: &ChatRequest) -> PipelineResult<CreateChatCompletionRequest> {
        let built = if request.images.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.as_str())
                .build()
        } else {
            let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                Vec::with_capacity(request.images.len() + 1);

            content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: request.prompt.clone(),
                },
            ));

            for url in &request.images {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: url.clone(),
                            detail: Some(ImageDetail::High),
                        },
                    },
                ));
            }

            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()
        };
        let user_msg = built.map_err(|e| PipelineError::service(format!("构建请求失败: {}", e)))?;

        CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(|e| PipelineError::service(format!("构建请求失败: {}", e)))
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, api_key: &str, request: ChatRequest) -> PipelineResult<String> {
        debug!(
            "调用 LLM API，模型: {}，图片数: {}",
            request.model,
            request.images.len()
        );

        // 凭证可能在运行期间变化，每次调用都按当前凭证构建客户端
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.api_base_url);
        let client = Client::with_config(openai_config);

        let response = client
            .chat()
            .create(Self::build_request(&request)?)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                PipelineError::service(e.to_string())
            })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| PipelineError::service("响应中缺少 choices[0].message.content"))
    }
}
