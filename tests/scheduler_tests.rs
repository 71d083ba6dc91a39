use anyhow::anyhow;
use molexaudio::batch::{BatchScheduler, ResultCollector, SlotBoard, TaskQueue, interpret_outcome};
use molexaudio::encode::{EncodePipeline, PipelineOutcome, ProgressFn, TaskError, TaskResult};
use molexaudio::engine::progress::{NullSink, ProgressSink};
use molexaudio::utils::{CleanupRegistry, temp_path_for};
use molexaudio::{Operation, ProgressEvent, ResultEntry, ResultStatus, Stage, Task};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn files(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("/media/file{i}.mkv"))).collect()
}

fn file_set(entries: &[ResultEntry]) -> HashSet<PathBuf> {
    entries.iter().map(|e| e.file.clone()).collect()
}

/// Sleeps per task and records how many calls overlap.
#[derive(Default)]
struct SleepingPipeline {
    delay_ms: u64,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl SleepingPipeline {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }
}

impl EncodePipeline for SleepingPipeline {
    fn process(&self, _task: &Task, progress: &ProgressFn<'_>) -> TaskResult<PipelineOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        progress(ProgressEvent::stage(Stage::Probing));
        thread::sleep(Duration::from_millis(self.delay_ms));
        progress(ProgressEvent::line(Stage::Normalizing, "size=  1024kB time=00:00:01.00"));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(PipelineOutcome::success())
    }
}

/// Fails (error, falsy outcome or panic) for files whose name contains a marker.
struct FlakyPipeline;

impl EncodePipeline for FlakyPipeline {
    fn process(&self, task: &Task, _progress: &ProgressFn<'_>) -> TaskResult<PipelineOutcome> {
        let name = task.file_path.to_string_lossy();
        if name.contains("boom") {
            return Err(TaskError::Probe("boom".to_string()));
        }
        if name.contains("falsy") {
            return Ok(PipelineOutcome::failure(None));
        }
        if name.contains("panic") {
            panic!("pipeline exploded");
        }
        Ok(PipelineOutcome::success())
    }
}

/// Counts calls; used to prove the pipeline is never reached.
#[derive(Default)]
struct CountingPipeline {
    calls: AtomicUsize,
}

impl EncodePipeline for CountingPipeline {
    fn process(&self, _task: &Task, _progress: &ProgressFn<'_>) -> TaskResult<PipelineOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PipelineOutcome::success())
    }
}

/// Writes a temp output through the registry, then finalizes it or fails.
struct TempWritingPipeline {
    registry: Arc<CleanupRegistry>,
    seen: Mutex<Vec<PathBuf>>,
}

impl EncodePipeline for TempWritingPipeline {
    fn process(&self, task: &Task, _progress: &ProgressFn<'_>) -> TaskResult<PipelineOutcome> {
        let temp = temp_path_for(&task.file_path);
        let guard = self.registry.track_temp_file(temp.clone())?;
        self.seen.lock().unwrap().push(temp.clone());
        assert!(self.registry.temp_files().contains(&temp));
        std::fs::write(guard.path(), b"partial")?;
        if task.file_path.to_string_lossy().contains("fail") {
            return Err(TaskError::Encode {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                last_line: Some("Conversion failed!".to_string()),
            });
        }
        guard
            .finalize(&task.file_path)
            .map_err(|e| TaskError::Finalize(format!("{e:#}")))?;
        Ok(PipelineOutcome::success())
    }
}

/// Records every sink call.
#[derive(Default)]
struct RecordingSink {
    started: Mutex<Vec<usize>>,
    events: Mutex<Vec<(usize, Stage, Option<String>, bool)>>,
    completed: Mutex<Vec<(Option<usize>, ResultStatus)>>,
}

impl ProgressSink for RecordingSink {
    fn task_started(&self, slot: usize, _task: &Task) -> anyhow::Result<()> {
        self.started.lock().unwrap().push(slot);
        Ok(())
    }

    fn update(&self, slot: usize, event: ProgressEvent<'_>) -> anyhow::Result<()> {
        self.events.lock().unwrap().push((
            slot,
            event.stage,
            event.last_line.map(str::to_string),
            event.error,
        ));
        Ok(())
    }

    fn task_completed(&self, slot: Option<usize>, entry: &ResultEntry) -> anyhow::Result<()> {
        self.completed.lock().unwrap().push((slot, entry.status));
        Ok(())
    }
}

/// Every call fails or panics.
struct BrokenSink;

impl ProgressSink for BrokenSink {
    fn task_started(&self, _slot: usize, _task: &Task) -> anyhow::Result<()> {
        panic!("terminal went away");
    }

    fn update(&self, _slot: usize, _event: ProgressEvent<'_>) -> anyhow::Result<()> {
        Err(anyhow!("render failed"))
    }

    fn task_completed(&self, _slot: Option<usize>, _entry: &ResultEntry) -> anyhow::Result<()> {
        Err(anyhow!("render failed"))
    }
}

// --- empty input / dry run ---

#[test]
fn test_empty_file_list_returns_nothing() {
    let pipeline = CountingPipeline::default();
    let results = BatchScheduler::new(&pipeline, &NullSink, 4).run(&[], Operation::Normalize, false);
    assert!(results.is_empty());
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dry_run_never_calls_pipeline() {
    let pipeline = CountingPipeline::default();
    let sink = RecordingSink::default();
    let input = files(6);
    let results = BatchScheduler::new(&pipeline, &sink, 3).run(
        &input,
        Operation::Boost { percent: 50.0 },
        true,
    );
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.status == ResultStatus::DryRun));
    assert!(results.iter().all(|r| r.task == "Boost 50% Audio"));
    assert!(
        results[0]
            .message
            .as_deref()
            .is_some_and(|m| m.contains("50%"))
    );
    assert_eq!(file_set(&results), input.into_iter().collect());
    // No slot is involved in a dry run.
    assert!(sink.started.lock().unwrap().is_empty());
    assert!(sink.events.lock().unwrap().is_empty());
    let completed = sink.completed.lock().unwrap();
    assert_eq!(completed.len(), 6);
    assert!(completed.iter().all(|(slot, _)| slot.is_none()));
}

// --- bounded concurrency / completeness ---

#[test]
fn test_five_files_two_workers_peak_is_two() {
    let pipeline = SleepingPipeline::new(60);
    let input = files(5);
    let results = BatchScheduler::new(&pipeline, &NullSink, 2).run(&input, Operation::Normalize, false);
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.status == ResultStatus::Success));
    assert_eq!(file_set(&results), input.into_iter().collect());
    assert_eq!(pipeline.peak.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 5);
}

#[test]
fn test_concurrency_never_exceeds_max_workers() {
    for workers in [1, 3, 8] {
        let pipeline = SleepingPipeline::new(10);
        let input = files(12);
        let results =
            BatchScheduler::new(&pipeline, &NullSink, workers).run(&input, Operation::Normalize, false);
        assert_eq!(results.len(), 12);
        assert!(pipeline.peak.load(Ordering::SeqCst) <= workers);
        assert!(pipeline.peak.load(Ordering::SeqCst) >= 1);
    }
}

#[test]
fn test_more_workers_than_files_uses_one_slot_per_file() {
    let pipeline = SleepingPipeline::new(20);
    let sink = RecordingSink::default();
    let scheduler = BatchScheduler::new(&pipeline, &sink, 16);
    assert_eq!(scheduler.worker_count_for(3), 3);
    let results = scheduler.run(&files(3), Operation::Normalize, false);
    assert_eq!(results.len(), 3);
    assert!(sink.started.lock().unwrap().iter().all(|slot| *slot < 3));
}

#[test]
fn test_zero_workers_clamped_to_one() {
    let pipeline = SleepingPipeline::new(5);
    let scheduler = BatchScheduler::new(&pipeline, &NullSink, 0);
    assert_eq!(scheduler.max_workers(), 1);
    let results = scheduler.run(&files(4), Operation::Normalize, false);
    assert_eq!(results.len(), 4);
    assert_eq!(pipeline.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn test_single_worker_processes_in_input_order() {
    let pipeline = SleepingPipeline::new(1);
    let input = files(5);
    let results = BatchScheduler::new(&pipeline, &NullSink, 1).run(&input, Operation::Normalize, false);
    let order: Vec<PathBuf> = results.into_iter().map(|r| r.file).collect();
    assert_eq!(order, input);
}

// --- task isolation ---

#[test]
fn test_raised_error_marks_only_that_file_failed() {
    let input = vec![
        PathBuf::from("/m/a.mkv"),
        PathBuf::from("/m/boom.mkv"),
        PathBuf::from("/m/c.mkv"),
    ];
    let results = BatchScheduler::new(&FlakyPipeline, &NullSink, 2).run(&input, Operation::Normalize, false);
    assert_eq!(results.len(), 3);
    for entry in &results {
        if entry.file.ends_with("boom.mkv") {
            assert_eq!(entry.status, ResultStatus::Failed);
            assert!(entry.message.as_deref().unwrap().contains("boom"));
        } else {
            assert_eq!(entry.status, ResultStatus::Success);
        }
    }
}

#[test]
fn test_single_failing_file() {
    let results = BatchScheduler::new(&FlakyPipeline, &NullSink, 4).run(
        &[PathBuf::from("boom.mp4")],
        Operation::Normalize,
        false,
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ResultStatus::Failed);
    assert!(results[0].message.as_deref().unwrap().contains("boom"));
}

#[test]
fn test_falsy_outcome_gets_default_message() {
    let results = BatchScheduler::new(&FlakyPipeline, &NullSink, 1).run(
        &[PathBuf::from("falsy.mp4")],
        Operation::Boost { percent: 10.0 },
        false,
    );
    assert_eq!(results[0].status, ResultStatus::Failed);
    assert_eq!(results[0].message.as_deref(), Some("Boost failed"));
}

#[test]
fn test_panic_in_pipeline_is_contained() {
    let input = vec![
        PathBuf::from("panic.mkv"),
        PathBuf::from("ok1.mkv"),
        PathBuf::from("ok2.mkv"),
    ];
    let sink = RecordingSink::default();
    let results = BatchScheduler::new(&FlakyPipeline, &sink, 1).run(&input, Operation::Normalize, false);
    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results
        .iter()
        .filter(|r| r.status == ResultStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].message.as_deref().unwrap().contains("pipeline exploded"));
    // The same slot kept working after the panic.
    assert_eq!(*sink.started.lock().unwrap(), vec![0, 0, 0]);
    assert!(
        sink.events
            .lock()
            .unwrap()
            .iter()
            .any(|(_, stage, _, error)| *stage == Stage::Failed && *error)
    );
}

// --- sinks ---

#[test]
fn test_sink_receives_starting_and_terminal_stage() {
    let pipeline = SleepingPipeline::new(1);
    let sink = RecordingSink::default();
    BatchScheduler::new(&pipeline, &sink, 1).run(&files(1), Operation::Normalize, false);
    let events = sink.events.lock().unwrap();
    let stages: Vec<Stage> = events.iter().map(|(_, s, _, _)| *s).collect();
    assert_eq!(
        stages,
        vec![Stage::Starting, Stage::Probing, Stage::Normalizing, Stage::Success]
    );
    assert_eq!(events[2].2.as_deref(), Some("size=  1024kB time=00:00:01.00"));
    assert_eq!(*sink.completed.lock().unwrap(), vec![(Some(0), ResultStatus::Success)]);
}

#[test]
fn test_broken_sink_never_affects_outcome() {
    let pipeline = SleepingPipeline::new(1);
    let results = BatchScheduler::new(&pipeline, &BrokenSink, 2).run(&files(4), Operation::Normalize, false);
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.status == ResultStatus::Success));
}

// --- registry balance ---

#[test]
fn test_temp_files_unregistered_after_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input: Vec<PathBuf> = ["ok.mkv", "fail.mkv", "ok2.mp4"]
        .iter()
        .map(|n| {
            let p = dir.path().join(n);
            std::fs::write(&p, b"original").unwrap();
            p
        })
        .collect();
    let registry = Arc::new(CleanupRegistry::new());
    let pipeline = TempWritingPipeline {
        registry: Arc::clone(&registry),
        seen: Mutex::new(Vec::new()),
    };
    let results = BatchScheduler::new(&pipeline, &NullSink, 3).run(&input, Operation::Normalize, false);

    assert_eq!(results.len(), 3);
    assert!(registry.temp_files().is_empty());
    for temp in pipeline.seen.lock().unwrap().iter() {
        assert!(!temp.exists(), "{} left behind", temp.display());
    }
    for entry in &results {
        let content = std::fs::read(&entry.file).unwrap();
        if entry.file.ends_with("fail.mkv") {
            assert_eq!(entry.status, ResultStatus::Failed);
            assert_eq!(content, b"original");
        } else {
            assert_eq!(entry.status, ResultStatus::Success);
            assert_eq!(content, b"partial");
        }
    }
}

// --- building blocks ---

#[test]
fn test_queue_is_fifo_and_drains_once() {
    let tasks: Vec<Task> = files(3)
        .into_iter()
        .map(|file_path| Task {
            file_path,
            operation: Operation::Normalize,
            dry_run: false,
        })
        .collect();
    let queue = TaskQueue::new(tasks.clone());
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.pop().as_ref(), Some(&tasks[0]));
    assert_eq!(queue.drain(), tasks[1..].to_vec());
    assert!(queue.is_empty());
    assert!(queue.pop().is_none());
}

#[test]
fn test_slot_guard_releases_on_drop() {
    let board = SlotBoard::new(2);
    {
        let _a = board.claim(0, &PathBuf::from("a.mkv"));
        let _b = board.claim(1, &PathBuf::from("b.mkv"));
        board.set_stage(1, Stage::Analyzing);
        assert_eq!(board.busy_count(), 2);
        let snap = board.snapshot();
        assert_eq!(snap[1].current_stage, Some(Stage::Analyzing));
        assert_eq!(snap[0].current_file, Some(PathBuf::from("a.mkv")));
    }
    assert_eq!(board.busy_count(), 0);
    assert_eq!(board.peak_busy(), 2);
    assert!(board.snapshot().iter().all(|s| !s.busy && s.current_file.is_none()));
}

#[test]
fn test_collector_tracks_in_progress() {
    let collector = ResultCollector::new();
    let a = collector.start(&PathBuf::from("a.mkv"), "normalize".to_string());
    let b = collector.start(&PathBuf::from("b.mkv"), "normalize".to_string());
    assert_eq!(collector.in_progress_count(), 2);
    assert!(collector.snapshot().is_empty());
    collector.finish(b, ResultStatus::Failed, Some("x".to_string()));
    let partial = collector.snapshot();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].file, PathBuf::from("b.mkv"));
    assert_eq!(partial[0].message.as_deref(), Some("x"));
    collector.finish(a, ResultStatus::Success, None);
    assert_eq!(collector.in_progress_count(), 0);
    let files: Vec<PathBuf> = collector.snapshot().into_iter().map(|e| e.file).collect();
    assert_eq!(files, vec![PathBuf::from("b.mkv"), PathBuf::from("a.mkv")]);
    assert_eq!(collector.peak_in_progress(), 2);
    let results = collector.into_results();
    // Completion order.
    assert_eq!(results[0].file, PathBuf::from("b.mkv"));
    assert_eq!(results[1].status, ResultStatus::Success);
}

#[test]
fn test_interpret_outcome() {
    let op = Operation::Normalize;
    assert_eq!(
        interpret_outcome(&op, Ok(PipelineOutcome::success())),
        (ResultStatus::Success, None)
    );
    assert_eq!(
        interpret_outcome(&op, Ok(PipelineOutcome::failure(None))),
        (ResultStatus::Failed, Some("Normalization failed".to_string()))
    );
    let (status, msg) = interpret_outcome(&op, Err(TaskError::Panicked("boom".to_string())));
    assert_eq!(status, ResultStatus::Failed);
    assert!(msg.unwrap().contains("boom"));
}
