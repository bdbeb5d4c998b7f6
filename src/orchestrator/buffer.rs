//! 处理缓冲区
//!
//! 当前被接纳、正在执行流水线的题号集合，容量固定。每次接纳都会签发一个
//! 单调递增的票据，任务用 (题号, 票据) 判断自己是否仍被接纳：题目被移出后
//! 即使又被重新接纳，旧任务也不会误认为自己仍然有效。

/// 处理缓冲区
#[derive(Debug)]
pub struct ProcessingBuffer {
    capacity: usize,
    slots: Vec<(String, u64)>,
    next_ticket: u64,
}

impl ProcessingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            next_ticket: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 剩余槽位
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.slots.len())
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.slots.iter().any(|(id, _)| id == question_id)
    }

    /// 接纳题目，返回票据；已满或已在缓冲区中时返回 `None`
    pub fn admit(&mut self, question_id: &str) -> Option<u64> {
        if self.available() == 0 || self.contains(question_id) {
            return None;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.slots.push((question_id.to_string(), ticket));
        Some(ticket)
    }

    /// 题目是否仍以该票据被接纳
    pub fn holds(&self, question_id: &str, ticket: u64) -> bool {
        self.slots
            .iter()
            .any(|(id, t)| id == question_id && *t == ticket)
    }

    /// 任务完成后释放槽位；票据不匹配时不做任何事
    pub fn release(&mut self, question_id: &str, ticket: u64) -> bool {
        let before = self.slots.len();
        self.slots
            .retain(|(id, t)| !(id == question_id && *t == ticket));
        self.slots.len() != before
    }

    /// 外部强制移出，不论票据
    pub fn evict(&mut self, question_id: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(id, _)| id != question_id);
        self.slots.len() != before
    }

    /// 清空；票据计数不回退
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// 按接纳顺序列出题号
    pub fn ids(&self) -> Vec<String> {
        self.slots.iter().map(|(id, _)| id.clone()).collect()
    }
}
