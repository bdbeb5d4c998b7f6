//! 批量题目处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责组装各层并把所有题目跑完。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载图片清单、创建调用闸门和 AI 客户端
//! 2. **组装调度器**：注入图片、凭证、状态通知
//! 3. **运行到结束**：启动处理并等待缓冲区清空
//! 4. **结果输出**：写入结果文件并打印全局统计

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::OpenAiBackend;
use crate::config::Config;
use crate::infrastructure::{ApiGate, CredentialStore, MemoryImageStore, StaticCredentialStore};
use crate::models::load_image_manifest;
use crate::orchestrator::scheduler::PipelineScheduler;
use crate::services::{AiServiceClient, ResultWriter};
use crate::utils::logging::{log_questions_loaded, log_startup, print_final_stats};
use crate::workflow::LoggingStatusSink;

/// 应用主结构
pub struct App {
    config: Config,
    scheduler: PipelineScheduler,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        info!("\n📁 正在加载图片清单: {}", config.image_manifest);
        let images = load_image_manifest(Path::new(&config.image_manifest)).await?;
        let images = Arc::new(MemoryImageStore::new(images));

        let credentials = Arc::new(StaticCredentialStore::new(config.llm_api_key.clone()));
        if credentials.credential().is_none() {
            warn!("⚠️ 未配置 LLM_API_KEY，所有题目都将以占位文本完成");
        }

        let pipeline = config.pipeline();
        let gate = ApiGate::new(pipeline.rate_limit_delay);
        let solver = AiServiceClient::new(
            gate,
            Arc::new(OpenAiBackend::new(&config.llm_api_base_url)),
            images.clone(),
            credentials,
        )
        .with_models(&config.vision_model_name, &config.text_model_name);

        let scheduler = PipelineScheduler::new(
            pipeline,
            Arc::new(solver),
            images,
            Arc::new(LoggingStatusSink),
        );

        Ok(Self { config, scheduler })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let total = self.scheduler.question_count();
        if total == 0 {
            warn!("⚠️ 图片清单中没有任何题目，程序结束");
            return Ok(());
        }

        log_questions_loaded(total, self.scheduler.capacity());

        self.scheduler.initialize_processing();
        self.scheduler.wait_until_idle().await;

        let questions = self.scheduler.snapshot();
        ResultWriter::with_path(&self.config.output_file)
            .write(&questions)
            .await?;

        print_final_stats(&self.scheduler.progress(), &self.config.output_file);

        Ok(())
    }
}
