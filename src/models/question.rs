use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 题目生命周期状态
///
/// 正常路径：unsolved → extracting → solving → solved。
/// `Failed` 仅在 `FailurePolicy::MarkFailed` 下出现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionState {
    Unsolved,
    Extracting,
    Solving,
    Solved,
    Failed,
}

impl QuestionState {
    /// 是否允许从当前状态迁移到 `next`
    pub fn can_advance_to(self, next: QuestionState) -> bool {
        use QuestionState::*;
        matches!(
            (self, next),
            (Unsolved, Extracting)
                | (Extracting, Solving)
                | (Solving, Solved)
                | (Extracting, Failed)
                | (Solving, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionState::Unsolved => "unsolved",
            QuestionState::Extracting => "extracting",
            QuestionState::Solving => "solving",
            QuestionState::Solved => "solved",
            QuestionState::Failed => "failed",
        }
    }
}

impl Display for QuestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// 用户指定的题号（区分大小写，格式任意）
    pub id: String,
    pub state: QuestionState,
    /// 提取出的题目文本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    /// 解答文本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved_text: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: QuestionState::Unsolved,
            extracted_text: None,
            solved_text: None,
        }
    }
}

/// 图片记录
///
/// `url` 可以是 http(s) 地址，也可以是 `data:` URL。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub question_id: String,
    pub url: String,
}

impl ImageRecord {
    pub fn new(question_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            url: url.into(),
        }
    }
}
