//! 图片存储接口
//!
//! 调度核心只读；图片的采集与持久化由外部负责。

use std::sync::{PoisonError, RwLock};

use crate::models::question::ImageRecord;

/// 图片存储
pub trait ImageStore: Send + Sync {
    /// 按采集顺序列出所有图片
    fn list_images(&self) -> Vec<ImageRecord>;

    /// 某道题当前关联的图片（保持顺序）
    fn images_for(&self, question_id: &str) -> Vec<ImageRecord> {
        self.list_images()
            .into_iter()
            .filter(|image| image.question_id == question_id)
            .collect()
    }
}

/// 内存中的图片集合
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: RwLock<Vec<ImageRecord>>,
}

impl MemoryImageStore {
    pub fn new(images: Vec<ImageRecord>) -> Self {
        Self {
            images: RwLock::new(images),
        }
    }

    /// 追加一张图片
    pub fn add(&self, image: ImageRecord) {
        self.images
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(image);
    }

    /// 清空所有图片
    pub fn clear(&self) {
        self.images
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ImageStore for MemoryImageStore {
    fn list_images(&self) -> Vec<ImageRecord> {
        self.images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
