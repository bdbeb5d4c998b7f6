use std::time::Duration;

/// 同时处理的题目数量上限
pub const BUFFER_CAPACITY: usize = 3;
/// 两次 AI 调用之间的最小间隔
pub const RATE_LIMIT_DELAY: Duration = Duration::from_millis(2000);
/// 提取 / 解答请求的 token 上限
pub const MAX_TOKENS: u32 = 4000;
/// 采样温度
pub const TEMPERATURE: f32 = 0.1;

/// 客户端失败时的处理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 用占位文本继续推进，题目最终仍为 solved
    #[default]
    Degrade,
    /// 题目进入终态 failed，释放槽位
    MarkFailed,
}

impl FailurePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "degrade" => Some(FailurePolicy::Degrade),
            "mark_failed" | "failed" => Some(FailurePolicy::MarkFailed),
            _ => None,
        }
    }
}

/// 调度器配置
///
/// 默认值即固定常量；测试可以构造不同容量 / 间隔的独立实例。
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub buffer_capacity: usize,
    pub rate_limit_delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: BUFFER_CAPACITY,
            rate_limit_delay: RATE_LIMIT_DELAY,
            failure_policy: FailurePolicy::Degrade,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 图片清单（TOML）
    pub image_manifest: String,
    /// 结果输出文件
    pub output_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 失败处理策略
    pub failure_policy: FailurePolicy,
    // --- LLM 配置 ---
    pub llm_api_key: Option<String>,
    pub llm_api_base_url: String,
    pub vision_model_name: String,
    pub text_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_manifest: "images.toml".to_string(),
            output_file: "solutions.toml".to_string(),
            verbose_logging: false,
            failure_policy: FailurePolicy::Degrade,
            llm_api_key: None,
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            vision_model_name: "gpt-4o".to_string(),
            text_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            image_manifest: std::env::var("IMAGE_MANIFEST").unwrap_or(default.image_manifest),
            output_file: std::env::var("OUTPUT_FILE").unwrap_or(default.output_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            failure_policy: std::env::var("FAILURE_POLICY").ok().and_then(|v| FailurePolicy::parse(&v)).unwrap_or(default.failure_policy),
            llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|v| !v.trim().is_empty()),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            vision_model_name: std::env::var("VISION_MODEL_NAME").unwrap_or(default.vision_model_name),
            text_model_name: std::env::var("TEXT_MODEL_NAME").unwrap_or(default.text_model_name),
        }
    }

    /// 由程序配置派生调度器配置
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            failure_policy: self.failure_policy,
            ..PipelineConfig::default()
        }
    }
}
