use crate::models::question::ImageRecord;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 图片清单文件结构
///
/// ```toml
/// [[images]]
/// question_id = "1"
/// url = "https://example.com/q1-a.png"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ImageManifest {
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

/// 解析图片清单内容
pub fn parse_image_manifest(content: &str) -> Result<Vec<ImageRecord>> {
    let manifest: ImageManifest = toml::from_str(content).context("无法解析图片清单")?;

    let mut images = Vec::with_capacity(manifest.images.len());
    for image in manifest.images {
        if image.question_id.is_empty() || image.url.trim().is_empty() {
            tracing::warn!("跳过无效的图片记录: {:?}", image);
            continue;
        }
        images.push(image);
    }

    Ok(images)
}

/// 从 TOML 文件加载图片清单
pub async fn load_image_manifest(manifest_path: &Path) -> Result<Vec<ImageRecord>> {
    if !manifest_path.exists() {
        anyhow::bail!("图片清单不存在: {}", manifest_path.display());
    }

    let content = fs::read_to_string(manifest_path)
        .await
        .with_context(|| format!("无法读取图片清单: {}", manifest_path.display()))?;

    let images = parse_image_manifest(&content)
        .with_context(|| format!("图片清单格式错误: {}", manifest_path.display()))?;

    tracing::info!("成功加载 {} 张图片", images.len());

    Ok(images)
}
