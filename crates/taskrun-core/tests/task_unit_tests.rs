mod common;

use common::{always, hello_world, Script, ScriptedContext};
use std::sync::Arc;
use std::time::Duration;
use taskrun_core::{
    Command, CommandBatch, HelloWorldSource, ResultLedger, RunId, TaskError, TaskId, TaskSource,
    TaskUnit,
};

fn task_seven(source: &HelloWorldSource, run: &RunId) -> TaskUnit {
    source.produce(run).nth(7).unwrap()
}

#[tokio::test]
async fn test_task_seven_records_forty_nine() {
    let source = HelloWorldSource::new();
    let run = RunId::new();
    let unit = task_seven(&source, &run);
    assert_eq!(unit.task_id(), TaskId(7));
    assert_eq!(unit.timeout(), Duration::from_secs(5));
    let before = source.count(&run);

    let mut ctx = ScriptedContext::new("ctx", hello_world());
    let output = unit.invoke(&mut ctx).await.unwrap();

    assert_eq!(output.task_id, TaskId(7));
    assert_eq!(output.output, "49");
    assert_eq!(source.count(&run), before + 1);
    let ledger = source.ledger(&run).unwrap();
    assert_eq!(ledger.get(TaskId(7)).unwrap().output, "49");
}

#[tokio::test]
async fn test_hanging_context_times_out_without_recording() {
    let source = HelloWorldSource::new().with_timeout(Duration::from_millis(50));
    let run = RunId::new();
    let unit = task_seven(&source, &run);

    let mut ctx = ScriptedContext::new("ctx", always(Script::Hang));
    let err = unit.invoke(&mut ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::Timeout { task_id, .. } if task_id == TaskId(7)));
    assert!(!err.is_fatal());
    assert_eq!(source.count(&run), 0);
    assert!(!source.ledger(&run).unwrap().contains(TaskId(7)));
}

#[tokio::test]
async fn test_context_reported_timeout_maps_to_task_timeout() {
    let source = HelloWorldSource::new();
    let run = RunId::new();
    let unit = task_seven(&source, &run);

    let mut ctx = ScriptedContext::new("ctx", always(Script::TimedOut));
    let err = unit.invoke(&mut ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::Timeout { .. }));
    assert_eq!(source.count(&run), 0);
}

#[tokio::test]
async fn test_slow_context_times_out() {
    let source = HelloWorldSource::new().with_timeout(Duration::from_millis(20));
    let run = RunId::new();
    let unit = task_seven(&source, &run);

    let mut ctx = ScriptedContext::new("ctx", hello_world()).with_delay(Duration::from_secs(5));
    let err = unit.invoke(&mut ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::Timeout { .. }));
    assert_eq!(source.count(&run), 0);
}

#[tokio::test]
async fn test_missing_final_output_is_fatal() {
    let source = HelloWorldSource::new();
    let run = RunId::new();
    let unit = task_seven(&source, &run);

    let mut ctx = ScriptedContext::new("ctx", always(Script::Outputs(vec![None, None])));
    let err = unit.invoke(&mut ctx).await.unwrap_err();

    assert!(matches!(
        err,
        TaskError::MissingOutput { task_id, command_index: 1 } if task_id == TaskId(7)
    ));
    assert!(err.is_fatal());
    assert_eq!(source.count(&run), 0);
    assert!(!source.ledger(&run).unwrap().contains(TaskId(7)));
}

#[tokio::test]
async fn test_batch_aborted_before_final_command_is_missing_output() {
    let source = HelloWorldSource::new();
    let run = RunId::new();
    let unit = task_seven(&source, &run);

    // Only the first command ran.
    let mut ctx = ScriptedContext::new("ctx", always(Script::Outputs(vec![Some("x".into())])));
    let err = unit.invoke(&mut ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::MissingOutput { .. }));
    assert_eq!(source.count(&run), 0);
}

#[tokio::test]
async fn test_context_failure_is_recoverable() {
    let source = HelloWorldSource::new();
    let run = RunId::new();
    let unit = task_seven(&source, &run);

    let mut ctx = ScriptedContext::new("ctx", always(Script::Fail("boom".into())));
    let err = unit.invoke(&mut ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::Context { .. }));
    assert!(!err.is_fatal());
    assert_eq!(source.count(&run), 0);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let ledger = Arc::new(ResultLedger::new(RunId::new()));
    let unit = TaskUnit::new(
        TaskId(1),
        CommandBatch::new(Vec::new()),
        Duration::from_secs(1),
        ledger.clone(),
    );

    let mut ctx = ScriptedContext::new("ctx", hello_world());
    let err = unit.invoke(&mut ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::EmptyBatch(TaskId(1))));
    assert_eq!(ledger.count(), 0);
}

#[tokio::test]
async fn test_second_unit_with_same_id_is_duplicate() {
    let ledger = Arc::new(ResultLedger::new(RunId::new()));
    let make = |output: &str| {
        TaskUnit::new(
            TaskId(5),
            CommandBatch::new(vec![Command::run(format!("echo -n {}", output))]),
            Duration::from_secs(1),
            ledger.clone(),
        )
    };
    let mut first_ctx = ScriptedContext::new("a", always(Script::Outputs(vec![Some("35".into())])));
    let mut second_ctx =
        ScriptedContext::new("b", always(Script::Outputs(vec![Some("other".into())])));

    make("35").invoke(&mut first_ctx).await.unwrap();
    let err = make("other").invoke(&mut second_ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::DuplicateRecord { task_id } if task_id == TaskId(5)));
    assert_eq!(ledger.count(), 1);
    assert_eq!(ledger.get(TaskId(5)).unwrap().output, "35");
}

#[tokio::test]
async fn test_dropped_invocation_records_nothing() {
    let source = HelloWorldSource::new();
    let run = RunId::new();
    let unit = task_seven(&source, &run);

    let mut ctx = ScriptedContext::new("ctx", hello_world()).with_delay(Duration::from_secs(5));
    let cancelled = tokio::time::timeout(Duration::from_millis(20), unit.invoke(&mut ctx)).await;

    assert!(cancelled.is_err());
    assert_eq!(source.count(&run), 0);
}
