use std::fs;
use std::path::PathBuf;

use framedeck_core::operations::CompareOp;
use framedeck_core::{CellValue, OperationExpr};
use framedeck_engine::{
    EngineError, ExecutionMode, ReloadOutcome, ReloadPolicy,
};
use framedeck_harness::TestBench;

fn scores_csv(dir: &tempfile::TempDir) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.path().join("scores.csv");
    fs::write(&path, "name,score\na,5\nb,20\nc,30\n")?;
    Ok(path)
}

fn filter_score_over_10() -> OperationExpr {
    OperationExpr::Filter {
        column: "score".into(),
        op: CompareOp::Gt,
        value: CellValue::Integer(10),
    }
}

#[test]
fn reload_reapplies_the_executed_history() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = scores_csv(&dir)?;
    let mut bench = TestBench::new()?;
    let id = bench.open("scores", path.to_string_lossy(), ExecutionMode::Eager)?;

    bench.submit_ok(id, filter_score_over_10())?;
    assert_eq!(bench.row_count(id), 2);

    // The source grows behind the dataset's back.
    fs::write(&path, "name,score\na,5\nb,20\nc,30\nd,50\ne,8\n")?;
    let outcome = bench.session.reload(id, ReloadPolicy::Abort)?;
    assert_eq!(outcome, ReloadOutcome::Reloaded { replayed: 1 });

    assert_eq!(bench.row_count(id), 3);
    assert_eq!(
        bench.column(id, "name"),
        vec![
            CellValue::Text("b".into()),
            CellValue::Text("c".into()),
            CellValue::Text("d".into()),
        ]
    );
    assert_eq!(bench.executed_len(id), 1);
    Ok(())
}

#[test]
fn abort_policy_keeps_prior_state_when_replay_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = scores_csv(&dir)?;
    let mut bench = TestBench::new()?;
    let id = bench.open("scores", path.to_string_lossy(), ExecutionMode::Eager)?;

    bench.submit_ok(id, filter_score_over_10())?;
    let before = bench.fingerprint(id);

    // The refreshed source no longer has the filtered column.
    fs::write(&path, "name\na\nb\n")?;
    let outcome = bench.session.reload(id, ReloadPolicy::Abort)?;
    let ReloadOutcome::Aborted { failed } = outcome else {
        return Err("expected abort".into());
    };
    assert_eq!(failed.label, "Filter: score > 10");

    assert_eq!(bench.fingerprint(id), before);
    assert_eq!(bench.row_count(id), 2);
    assert_eq!(bench.executed_len(id), 1);
    assert_eq!(bench.column_names(id), vec!["name", "score"]);
    Ok(())
}

#[test]
fn clear_policy_adopts_the_refreshed_source() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = scores_csv(&dir)?;
    let mut bench = TestBench::new()?;
    let id = bench.open("scores", path.to_string_lossy(), ExecutionMode::Eager)?;

    bench.submit_ok(id, filter_score_over_10())?;

    fs::write(&path, "name\na\nb\n")?;
    let outcome = bench.session.reload(id, ReloadPolicy::ClearOperations)?;
    assert!(matches!(outcome, ReloadOutcome::OperationsCleared { .. }));

    assert_eq!(bench.executed_len(id), 0);
    assert_eq!(bench.queued_len(id), 0);
    assert_eq!(bench.column_names(id), vec!["name"]);
    assert_eq!(bench.row_count(id), 2);
    Ok(())
}

#[test]
fn load_failure_leaves_the_dataset_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = scores_csv(&dir)?;
    let mut bench = TestBench::new()?;
    let id = bench.open("scores", path.to_string_lossy(), ExecutionMode::Eager)?;

    bench.submit_ok(id, filter_score_over_10())?;
    let before = bench.fingerprint(id);

    fs::remove_file(&path)?;
    let result = bench.session.reload(id, ReloadPolicy::Abort);
    assert!(matches!(result, Err(EngineError::Load(_))));

    assert_eq!(bench.fingerprint(id), before);
    assert_eq!(bench.executed_len(id), 1);
    Ok(())
}

#[test]
fn queued_operations_survive_a_reload() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = scores_csv(&dir)?;
    let mut bench = TestBench::new()?;
    let id = bench.open("scores", path.to_string_lossy(), ExecutionMode::Lazy)?;

    bench.submit_ok(id, filter_score_over_10())?;
    assert_eq!(bench.queued_len(id), 1);

    fs::write(&path, "name,score\na,5\nb,20\nc,30\nd,50\n")?;
    let outcome = bench.session.reload(id, ReloadPolicy::Abort)?;
    assert_eq!(outcome, ReloadOutcome::Reloaded { replayed: 0 });
    assert_eq!(bench.queued_len(id), 1);
    assert_eq!(bench.row_count(id), 4);

    // The queue applies to the refreshed data on the next trigger.
    let summary = bench.session.execute_all(id)?;
    assert_eq!(summary.applied, 1);
    assert_eq!(bench.row_count(id), 3);
    Ok(())
}

#[test]
fn reload_refuses_while_the_dataset_is_locked() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = scores_csv(&dir)?;
    let mut bench = TestBench::new()?;
    let id = bench.open("scores", path.to_string_lossy(), ExecutionMode::Eager)?;

    let handle = bench.dataset(id);
    let guard = handle.lock().expect("dataset lock");
    let result = bench.session.reload(id, ReloadPolicy::Abort);
    assert!(matches!(result, Err(EngineError::Busy(_))));
    drop(guard);

    let outcome = bench.session.reload(id, ReloadPolicy::Abort)?;
    assert_eq!(outcome, ReloadOutcome::Reloaded { replayed: 0 });
    Ok(())
}
