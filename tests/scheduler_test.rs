mod common;

use common::{images, wait_for_state, Behavior, RecordingSink, ScriptedSolver, Stage, WAIT_LIMIT};
use question_solve::{
    FailurePolicy, ImageRecord, MemoryImageStore, PipelineConfig, PipelineError, PipelineScheduler,
    QuestionState, StatusSink,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config(capacity: usize, failure_policy: FailurePolicy) -> PipelineConfig {
    PipelineConfig {
        buffer_capacity: capacity,
        rate_limit_delay: Duration::from_millis(0),
        failure_policy,
    }
}

fn scheduler(
    ids: &[&str],
    solver: Arc<ScriptedSolver>,
    sink: Arc<dyn StatusSink>,
) -> PipelineScheduler {
    PipelineScheduler::new(
        config(3, FailurePolicy::Degrade),
        solver,
        Arc::new(MemoryImageStore::new(images(ids))),
        sink,
    )
}

async fn wait_idle(scheduler: &PipelineScheduler) {
    tokio::time::timeout(WAIT_LIMIT, scheduler.wait_until_idle())
        .await
        .expect("scheduler never became idle");
}

#[tokio::test]
async fn test_buffer_backfills_in_registry_order() {
    let (solver, _returned) = ScriptedSolver::new().hold(Stage::Extract).build();
    let (sink, mut events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3", "4"], solver.clone(), sink.clone());

    scheduler.initialize_processing();
    assert_eq!(scheduler.buffer_ids(), vec!["1", "2", "3"]);
    assert_eq!(scheduler.state("1"), Some(QuestionState::Extracting));
    assert_eq!(scheduler.state("4"), Some(QuestionState::Unsolved));

    solver.release("1", Stage::Extract);
    wait_for_state(&mut events, "1", QuestionState::Solved).await;
    assert_eq!(scheduler.buffer_ids(), vec!["2", "3", "4"]);

    for id in ["2", "3", "4"] {
        solver.release(id, Stage::Extract);
    }
    wait_idle(&scheduler).await;

    for question in scheduler.snapshot() {
        assert_eq!(question.state, QuestionState::Solved);
        assert_eq!(question.extracted_text, Some(format!("text of {}", question.id)));
        assert!(question.solved_text.unwrap().starts_with("solution of"));
    }
    assert!(scheduler.buffer_ids().is_empty());
}

#[tokio::test]
async fn test_every_question_follows_the_state_sequence() {
    let (solver, _returned) = ScriptedSolver::new().build();
    let (sink, _events) = RecordingSink::new();
    let ids = ["a", "b", "c", "d", "e", "f", "g"];
    let scheduler = scheduler(&ids, solver, sink.clone());

    scheduler.initialize_processing();
    wait_idle(&scheduler).await;

    for id in ids {
        assert_eq!(
            sink.states_of(id),
            vec![
                QuestionState::Extracting,
                QuestionState::Solving,
                QuestionState::Solved
            ],
            "question {id}"
        );
    }
    assert_eq!(scheduler.progress().solved, ids.len());
}

#[tokio::test]
async fn test_buffer_never_exceeds_capacity() {
    let active: Arc<Mutex<(HashSet<String>, usize)>> = Arc::default();
    let tracker = active.clone();
    let sink = move |question_id: &str, state: QuestionState| {
        let mut guard = tracker.lock().unwrap();
        match state {
            QuestionState::Extracting => {
                guard.0.insert(question_id.to_string());
            }
            QuestionState::Solved | QuestionState::Failed => {
                guard.0.remove(question_id);
            }
            _ => {}
        }
        guard.1 = guard.1.max(guard.0.len());
    };

    let (solver, _returned) = ScriptedSolver::new().build();
    let ids: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let scheduler = scheduler(&id_refs, solver, Arc::new(sink));

    scheduler.initialize_processing();
    assert_eq!(scheduler.buffer_ids().len(), 3);
    wait_idle(&scheduler).await;

    let (still_active, max_active) = &*active.lock().unwrap();
    assert!(still_active.is_empty());
    assert_eq!(*max_active, 3);
}

#[tokio::test]
async fn test_anomaly_releases_slot_and_backfills() {
    let (solver, _returned) = ScriptedSolver::new()
        .behave(
            "2",
            Stage::Extract,
            Behavior::Fail(PipelineError::anomaly("2", "simulated")),
        )
        .build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3", "4"], solver, sink);

    scheduler.initialize_processing();
    wait_idle(&scheduler).await;

    // 保留最后到达的状态，不回退
    assert_eq!(scheduler.state("2"), Some(QuestionState::Extracting));
    for id in ["1", "3", "4"] {
        assert_eq!(scheduler.state(id), Some(QuestionState::Solved));
    }
    assert!(scheduler.buffer_ids().is_empty());
}

#[tokio::test]
async fn test_panicking_task_does_not_stall_pipeline() {
    let (solver, _returned) = ScriptedSolver::new()
        .behave("2", Stage::Solve, Behavior::Panic)
        .build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3", "4", "5"], solver, sink);

    scheduler.initialize_processing();
    wait_idle(&scheduler).await;

    let question = scheduler.question("2").unwrap();
    assert_eq!(question.state, QuestionState::Solving);
    assert!(question.solved_text.is_none());
    assert_eq!(scheduler.progress().solved, 4);
}

#[tokio::test]
async fn test_evicted_question_is_never_solved_by_abandoned_task() {
    let (solver, mut returned) = ScriptedSolver::new()
        .hold(Stage::Extract)
        .hold(Stage::Solve)
        .build();
    let (sink, mut events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3", "4"], solver.clone(), sink.clone());

    scheduler.initialize_processing();
    solver.release("1", Stage::Extract);
    wait_for_state(&mut events, "1", QuestionState::Solving).await;

    assert!(scheduler.evict("1"));
    assert!(!scheduler.evict("1"));
    // 移出不会自动补位
    assert_eq!(scheduler.buffer_ids(), vec!["2", "3"]);

    solver.release("1", Stage::Solve);
    let (id, stage) = returned.recv().await.unwrap();
    assert_eq!((id.as_str(), stage), ("1", Stage::Extract));
    let (id, stage) = returned.recv().await.unwrap();
    assert_eq!((id.as_str(), stage), ("1", Stage::Solve));
    tokio::task::yield_now().await;

    let question = scheduler.question("1").unwrap();
    assert_eq!(question.state, QuestionState::Solving);
    assert!(question.solved_text.is_none());
    assert!(!sink.states_of("1").contains(&QuestionState::Solved));
    assert_eq!(scheduler.buffer_ids(), vec!["2", "3"]);

    // 补位由移出方负责
    scheduler.fill_buffer();
    assert_eq!(scheduler.buffer_ids(), vec!["2", "3", "4"]);
}

#[tokio::test]
async fn test_reinitialize_abandons_in_flight_work() {
    let (solver, mut returned) = ScriptedSolver::new().hold(Stage::Extract).build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3", "4"], solver.clone(), sink.clone());

    scheduler.initialize_processing();
    assert_eq!(scheduler.buffer_ids(), vec!["1", "2", "3"]);

    scheduler.initialize_processing();
    assert_eq!(solver.resets(), 2);
    assert_eq!(scheduler.buffer_ids(), vec!["1", "2", "3"]);
    assert_eq!(
        sink.states_of("1"),
        vec![
            QuestionState::Extracting,
            QuestionState::Unsolved,
            QuestionState::Extracting
        ]
    );

    for id in ["1", "2", "3", "4"] {
        solver.release(id, Stage::Extract);
    }
    wait_idle(&scheduler).await;

    // 第一次接纳的任务一次 AI 调用都没有发出
    let mut calls = Vec::new();
    while let Ok(call) = returned.try_recv() {
        calls.push(call);
    }
    assert_eq!(calls.len(), 8);
    for id in ["1", "2", "3", "4"] {
        for stage in [Stage::Extract, Stage::Solve] {
            let count = calls
                .iter()
                .filter(|(called, s)| called == id && *s == stage)
                .count();
            assert_eq!(count, 1, "question {id} {stage:?}");
        }
        assert_eq!(scheduler.state(id), Some(QuestionState::Solved));
    }
}

#[tokio::test]
async fn test_reset_mid_solve_keeps_notifications_in_order() {
    let (solver, _returned) = ScriptedSolver::new().hold(Stage::Solve).build();
    let (sink, mut events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3", "4"], solver.clone(), sink.clone());

    scheduler.initialize_processing();
    wait_for_state(&mut events, "3", QuestionState::Solving).await;
    scheduler.initialize_processing();

    // 旧任务和新任务各放行一次
    for id in ["1", "2", "3"] {
        solver.release(id, Stage::Solve);
        solver.release(id, Stage::Solve);
    }
    solver.release("4", Stage::Solve);
    wait_idle(&scheduler).await;

    for id in ["1", "2", "3"] {
        assert_eq!(
            sink.states_of(id),
            vec![
                QuestionState::Extracting,
                QuestionState::Solving,
                QuestionState::Unsolved,
                QuestionState::Extracting,
                QuestionState::Solving,
                QuestionState::Solved
            ],
            "question {id}"
        );
    }
    assert_eq!(
        sink.states_of("4"),
        vec![
            QuestionState::Extracting,
            QuestionState::Solving,
            QuestionState::Solved
        ]
    );
}

#[tokio::test]
async fn test_idle_waits_for_refill_after_eviction() {
    let (solver, _returned) = ScriptedSolver::new().hold(Stage::Extract).build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3", "4"], solver.clone(), sink);

    scheduler.initialize_processing();
    for id in ["1", "2", "3"] {
        assert!(scheduler.evict(id));
    }
    assert!(scheduler.buffer_ids().is_empty());

    // 缓冲区空了，但 "4" 仍可接纳
    let waited =
        tokio::time::timeout(Duration::from_millis(50), scheduler.wait_until_idle()).await;
    assert!(waited.is_err());

    scheduler.fill_buffer();
    assert_eq!(scheduler.buffer_ids(), vec!["4"]);
    solver.release("4", Stage::Extract);
    wait_idle(&scheduler).await;

    assert_eq!(scheduler.state("4"), Some(QuestionState::Solved));
    for id in ["1", "2", "3"] {
        assert_eq!(scheduler.state(id), Some(QuestionState::Extracting));
    }
}

#[tokio::test]
async fn test_mark_failed_policy_exposes_failed_state() {
    let (solver, _returned) = ScriptedSolver::new()
        .behave(
            "2",
            Stage::Extract,
            Behavior::Fail(PipelineError::service("HTTP 500")),
        )
        .build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = PipelineScheduler::new(
        config(2, FailurePolicy::MarkFailed),
        solver,
        Arc::new(MemoryImageStore::new(images(&["1", "2", "3"]))),
        sink.clone(),
    );

    scheduler.initialize_processing();
    wait_idle(&scheduler).await;

    let failed = scheduler.question("2").unwrap();
    assert_eq!(failed.state, QuestionState::Failed);
    assert!(failed.extracted_text.unwrap().contains("HTTP 500"));
    assert!(failed.solved_text.is_none());
    assert_eq!(
        sink.states_of("2"),
        vec![QuestionState::Extracting, QuestionState::Failed]
    );

    let progress = scheduler.progress();
    assert_eq!((progress.solved, progress.failed), (2, 1));
}

#[tokio::test]
async fn test_degrade_policy_solves_with_placeholder() {
    let (solver, _returned) = ScriptedSolver::new()
        .behave(
            "3",
            Stage::Solve,
            Behavior::Fail(PipelineError::service("HTTP 503")),
        )
        .build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = scheduler(&["1", "2", "3"], solver, sink);

    scheduler.initialize_processing();
    wait_idle(&scheduler).await;

    let degraded = scheduler.question("3").unwrap();
    assert_eq!(degraded.state, QuestionState::Solved);
    let solved_text = degraded.solved_text.unwrap();
    assert!(solved_text.contains("HTTP 503"));
    assert!(solved_text.contains("text of 3"));

    let progress = scheduler.progress();
    assert_eq!((progress.solved, progress.degraded), (3, 1));
}

#[tokio::test]
async fn test_rebuild_registry_follows_image_collection() {
    let store = Arc::new(MemoryImageStore::new(images(&["1", "2", "1"])));
    let (solver, _returned) = ScriptedSolver::new().build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = PipelineScheduler::new(
        config(3, FailurePolicy::Degrade),
        solver,
        store.clone(),
        sink,
    );
    assert_eq!(scheduler.question_count(), 2);

    scheduler.initialize_processing();
    wait_idle(&scheduler).await;

    store.add(ImageRecord::new("3", "https://img.example.com/3.png"));
    scheduler.rebuild_registry();
    assert_eq!(scheduler.question_count(), 3);
    wait_idle(&scheduler).await;
    assert_eq!(scheduler.progress().solved, 3);

    store.clear();
    scheduler.rebuild_registry();
    assert_eq!(scheduler.question_count(), 0);
    assert!(scheduler.buffer_ids().is_empty());
}

#[tokio::test]
async fn test_empty_registry_is_idle_immediately() {
    let (solver, _returned) = ScriptedSolver::new().build();
    let (sink, _events) = RecordingSink::new();
    let scheduler = scheduler(&[], solver, sink);

    scheduler.initialize_processing();
    wait_idle(&scheduler).await;
    assert_eq!(scheduler.progress().total, 0);
}
