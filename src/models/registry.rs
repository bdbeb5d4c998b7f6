//! 题目注册表
//!
//! 题号到题目状态的映射。由图片集合重建，顺序为题号在图片集合中首次出现的顺序。

use std::collections::HashMap;

use crate::error::{PipelineError, PipelineResult};
use crate::models::question::{ImageRecord, Question, QuestionState};

/// 题目注册表
#[derive(Debug, Default)]
pub struct QuestionRegistry {
    order: Vec<String>,
    questions: HashMap<String, Question>,
}

impl QuestionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从图片集合构建注册表，重复题号只保留一条
    pub fn from_images(images: &[ImageRecord]) -> Self {
        let mut registry = Self::new();
        for image in images {
            if !registry.questions.contains_key(&image.question_id) {
                registry.order.push(image.question_id.clone());
                registry
                    .questions
                    .insert(image.question_id.clone(), Question::new(&image.question_id));
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.questions.get(question_id)
    }

    pub fn state(&self, question_id: &str) -> Option<QuestionState> {
        self.questions.get(question_id).map(|q| q.state)
    }

    /// 按稳定顺序列出仍处于 unsolved 的题号
    pub fn unsolved_ids(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|id| self.state(id) == Some(QuestionState::Unsolved))
            .map(String::as_str)
    }

    /// 按稳定顺序复制所有题目
    pub fn snapshot(&self) -> Vec<Question> {
        self.order
            .iter()
            .filter_map(|id| self.questions.get(id).cloned())
            .collect()
    }

    /// 所有题目重置为 unsolved 并清空文本
    pub fn reset_all(&mut self) {
        for question in self.questions.values_mut() {
            *question = Question::new(question.id.clone());
        }
    }

    /// 状态迁移，只允许向前
    pub fn transition(&mut self, question_id: &str, next: QuestionState) -> PipelineResult<()> {
        let question = self.question_mut(question_id)?;
        if !question.state.can_advance_to(next) {
            return Err(PipelineError::anomaly(
                question_id,
                format!("非法状态迁移 {} -> {}", question.state, next),
            ));
        }
        question.state = next;
        Ok(())
    }

    pub fn record_extracted(&mut self, question_id: &str, text: String) -> PipelineResult<()> {
        self.question_mut(question_id)?.extracted_text = Some(text);
        Ok(())
    }

    /// 记录解答文本；必须先有提取文本
    pub fn record_solved(&mut self, question_id: &str, text: String) -> PipelineResult<()> {
        let question = self.question_mut(question_id)?;
        if question.extracted_text.is_none() {
            return Err(PipelineError::anomaly(question_id, "尚未提取文本就写入解答"));
        }
        question.solved_text = Some(text);
        Ok(())
    }

    fn question_mut(&mut self, question_id: &str) -> PipelineResult<&mut Question> {
        self.questions
            .get_mut(question_id)
            .ok_or_else(|| PipelineError::anomaly(question_id, "题号不在注册表中"))
    }
}
