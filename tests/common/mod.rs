//! 测试用的协作方替身
#![allow(dead_code)]

use async_trait::async_trait;
use question_solve::{ImageRecord, PipelineError, PipelineResult, QuestionSolver, QuestionState, StatusSink};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

pub const WAIT_LIMIT: Duration = Duration::from_secs(30);

pub fn images(ids: &[&str]) -> Vec<ImageRecord> {
    ids.iter()
        .map(|id| ImageRecord::new(*id, format!("https://img.example.com/{id}.png")))
        .collect()
}

// ========== 状态通知 ==========

/// 记录所有状态变化，同时转发到通道
pub struct RecordingSink {
    events: Mutex<Vec<(String, QuestionState)>>,
    tx: mpsc::UnboundedSender<(String, QuestionState)>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, QuestionState)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                tx,
            }),
            rx,
        )
    }

    pub fn events(&self) -> Vec<(String, QuestionState)> {
        self.events.lock().unwrap().clone()
    }

    pub fn states_of(&self, question_id: &str) -> Vec<QuestionState> {
        self.events()
            .into_iter()
            .filter(|(id, _)| id == question_id)
            .map(|(_, state)| state)
            .collect()
    }
}

impl StatusSink for RecordingSink {
    fn on_state_change(&self, question_id: &str, state: QuestionState) {
        self.events
            .lock()
            .unwrap()
            .push((question_id.to_string(), state));
        let _ = self.tx.send((question_id.to_string(), state));
    }
}

/// 等到某道题进入指定状态
pub async fn wait_for_state(
    rx: &mut mpsc::UnboundedReceiver<(String, QuestionState)>,
    question_id: &str,
    state: QuestionState,
) {
    let found = tokio::time::timeout(WAIT_LIMIT, async {
        while let Some((id, s)) = rx.recv().await {
            if id == question_id && s == state {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(found, Ok(true), "question {question_id} never reached {state}");
}

// ========== AI 能力替身 ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Solve,
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Fail(PipelineError),
    Panic,
}

/// 按脚本执行的 AI 能力
///
/// 被 hold 的阶段会一直等待，直到测试调用 `release`。
#[derive(Default)]
pub struct ScriptedSolver {
    held: Vec<Stage>,
    behaviors: HashMap<(String, Stage), Behavior>,
    permits: Mutex<HashMap<(String, Stage), Arc<Semaphore>>>,
    returned: Mutex<Option<mpsc::UnboundedSender<(String, Stage)>>>,
    resets: AtomicUsize,
}

impl ScriptedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(mut self, stage: Stage) -> Self {
        self.held.push(stage);
        self
    }

    pub fn behave(mut self, question_id: &str, stage: Stage, behavior: Behavior) -> Self {
        self.behaviors
            .insert((question_id.to_string(), stage), behavior);
        self
    }

    /// 返回的通道会在每次调用结束时收到 (题号, 阶段)
    pub fn build(self) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, Stage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.returned.lock().unwrap() = Some(tx);
        (Arc::new(self), rx)
    }

    pub fn release(&self, question_id: &str, stage: Stage) {
        self.semaphore(question_id, stage).add_permits(1);
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn semaphore(&self, question_id: &str, stage: Stage) -> Arc<Semaphore> {
        self.permits
            .lock()
            .unwrap()
            .entry((question_id.to_string(), stage))
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    async fn run(&self, question_id: &str, stage: Stage, reply: String) -> PipelineResult<String> {
        if self.held.contains(&stage) {
            let semaphore = self.semaphore(question_id, stage);
            semaphore.acquire().await.unwrap().forget();
        }

        let result = match self.behaviors.get(&(question_id.to_string(), stage)) {
            None => Ok(reply),
            Some(Behavior::Fail(e)) => Err(e.clone()),
            Some(Behavior::Panic) => panic!("scripted panic for question {question_id}"),
        };

        if let Some(tx) = self.returned.lock().unwrap().as_ref() {
            let _ = tx.send((question_id.to_string(), stage));
        }
        result
    }
}

#[async_trait]
impl QuestionSolver for ScriptedSolver {
    async fn extract(&self, question_id: &str) -> PipelineResult<String> {
        self.run(question_id, Stage::Extract, format!("text of {question_id}"))
            .await
    }

    async fn solve(&self, question_id: &str, extracted_text: &str) -> PipelineResult<String> {
        self.run(
            question_id,
            Stage::Solve,
            format!("solution of {question_id} ({extracted_text})"),
        )
        .await
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
