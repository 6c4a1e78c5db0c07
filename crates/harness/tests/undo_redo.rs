use framedeck_core::operations::{CompareOp, JoinKind, SortKey};
use framedeck_core::{CellValue, OperationExpr};
use framedeck_engine::{EngineConfig, ExecutionMode, RedoOutcome, UndoOutcome};
use framedeck_harness::TestBench;

#[test]
fn undo_and_redo_restore_exact_frames() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let id = bench.open_people(ExecutionMode::Eager)?;
    let fp0 = bench.fingerprint(id);

    bench.submit_ok(id, OperationExpr::Filter {
        column: "age".into(),
        op: CompareOp::Gt,
        value: CellValue::Integer(25),
    })?;
    let fp1 = bench.fingerprint(id);

    bench.submit_ok(id, OperationExpr::Sort {
        keys: vec![SortKey::desc("name")],
    })?;
    let fp2 = bench.fingerprint(id);
    assert_ne!(fp0, fp1);
    assert_ne!(fp1, fp2);

    assert!(matches!(bench.session.undo(id)?, UndoOutcome::Undone(_)));
    assert_eq!(bench.fingerprint(id), fp1);
    assert_eq!(bench.executed_len(id), 1);
    assert_eq!(bench.with_dataset(id, |ds| ds.redo_depth()), 1);

    assert!(matches!(bench.session.undo(id)?, UndoOutcome::Undone(_)));
    assert_eq!(bench.fingerprint(id), fp0);

    assert!(matches!(bench.session.redo(id)?, RedoOutcome::Redone(_)));
    assert_eq!(bench.fingerprint(id), fp1);
    assert!(matches!(bench.session.redo(id)?, RedoOutcome::Redone(_)));
    assert_eq!(bench.fingerprint(id), fp2);
    assert_eq!(bench.executed_len(id), 2);
    Ok(())
}

#[test]
fn undo_and_redo_on_empty_stacks_are_noops() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let id = bench.open_people(ExecutionMode::Eager)?;

    assert_eq!(bench.session.undo(id)?, UndoOutcome::Nothing);
    assert_eq!(bench.session.redo(id)?, RedoOutcome::Nothing);
    Ok(())
}

#[test]
fn new_submission_discards_the_redo_branch() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let id = bench.open_people(ExecutionMode::Eager)?;

    bench.submit_ok(id, OperationExpr::Head { rows: 4 })?;
    bench.submit_ok(id, OperationExpr::Head { rows: 3 })?;
    bench.session.undo(id)?;
    assert_eq!(bench.with_dataset(id, |ds| ds.redo_depth()), 1);

    bench.submit_ok(id, OperationExpr::Head { rows: 2 })?;
    assert_eq!(bench.with_dataset(id, |ds| ds.redo_depth()), 0);
    assert_eq!(bench.session.redo(id)?, RedoOutcome::Nothing);
    assert_eq!(bench.row_count(id), 2);
    Ok(())
}

#[test]
fn failed_eager_submission_keeps_the_redo_branch() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let id = bench.open_people(ExecutionMode::Eager)?;

    bench.submit_ok(id, OperationExpr::Head { rows: 4 })?;
    bench.session.undo(id)?;
    assert_eq!(bench.with_dataset(id, |ds| ds.redo_depth()), 1);

    // The submission never lands, so no divergence happened.
    let record = framedeck_core::OperationRecord::create(OperationExpr::Filter {
        column: "salary".into(),
        op: CompareOp::Gt,
        value: CellValue::Integer(0),
    })?;
    assert!(bench.session.submit(id, record).is_err());

    assert_eq!(bench.with_dataset(id, |ds| ds.redo_depth()), 1);
    assert!(matches!(bench.session.redo(id)?, RedoOutcome::Redone(_)));
    assert_eq!(bench.row_count(id), 4);
    Ok(())
}

#[test]
fn undo_works_past_the_oldest_retained_checkpoint() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::with_config(EngineConfig {
        checkpoint_interval: 1,
        max_checkpoints: 2,
    })?;
    let id = bench.open_people(ExecutionMode::Eager)?;

    for rows in [5, 4, 3, 2, 1] {
        bench.submit_ok(id, OperationExpr::Head { rows })?;
    }
    // Only the newest snapshots survive the retention bound.
    assert_eq!(bench.with_dataset(id, |ds| ds.checkpoint_indices()), vec![4, 5]);

    // Undoing beyond the oldest checkpoint replays from the original.
    for expected in [2, 3, 4, 5] {
        assert!(matches!(bench.session.undo(id)?, UndoOutcome::Undone(_)));
        assert_eq!(bench.row_count(id), expected);
    }
    assert!(matches!(bench.session.undo(id)?, UndoOutcome::Undone(_)));
    assert_eq!(bench.row_count(id), 6);
    assert_eq!(bench.session.undo(id)?, UndoOutcome::Nothing);
    Ok(())
}

#[test]
fn undo_from_a_checkpoint_matches_a_from_scratch_replay() -> Result<(), Box<dyn std::error::Error>>
{
    let mut bench = TestBench::new()?;
    let mut wide = String::from("n\n");
    for i in 0..100 {
        wide.push_str(&format!("{i}\n"));
    }
    TestBench::register_csv(&bench.backend, "wide", &wide)?;

    // 25 operations with the default interval of 10 leave checkpoints
    // at 10 and 20.
    let id = bench.open("wide", "wide", ExecutionMode::Eager)?;
    for i in 1..=25 {
        bench.submit_ok(id, OperationExpr::Head { rows: 100 - i })?;
    }
    assert_eq!(bench.with_dataset(id, |ds| ds.checkpoint_indices()), vec![10, 20]);
    assert_eq!(bench.row_count(id), 75);

    // Undo to 23 executed operations: checkpoint 20 plus three replays.
    bench.session.undo(id)?;
    bench.session.undo(id)?;
    assert_eq!(bench.executed_len(id), 23);
    assert_eq!(bench.row_count(id), 77);

    // The restored frame is indistinguishable from running only the
    // first 23 operations on a fresh dataset.
    let fresh = bench.open("wide_fresh", "wide", ExecutionMode::Eager)?;
    for i in 1..=23 {
        bench.submit_ok(fresh, OperationExpr::Head { rows: 100 - i })?;
    }
    assert_eq!(bench.fingerprint(id), bench.fingerprint(fresh));
    Ok(())
}

#[test]
fn undo_all_returns_to_the_frame_as_loaded() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let id = bench.open_people(ExecutionMode::Eager)?;
    let fp0 = bench.fingerprint(id);

    bench.submit_ok(id, OperationExpr::Drop {
        columns: vec!["city".into()],
    })?;
    bench.submit_ok(id, OperationExpr::Head { rows: 2 })?;

    let handle = bench.dataset(id);
    let mut ds = handle.lock().expect("dataset lock");
    let undone = bench.session.engine().undo_all(&mut ds)?;
    drop(ds);

    assert_eq!(undone, 2);
    assert_eq!(bench.fingerprint(id), fp0);
    assert_eq!(bench.column_names(id), vec!["name", "age", "city"]);
    Ok(())
}

#[test]
fn failed_redo_stays_on_the_stack() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let id = bench.open_people(ExecutionMode::Eager)?;

    bench.submit_ok(id, OperationExpr::Join {
        right_source: "orders".into(),
        on: vec!["name".into()],
        how: JoinKind::Inner,
    })?;
    bench.session.undo(id)?;
    let before = bench.fingerprint(id);

    // The join's right side disappears while the operation sits undone.
    bench.backend.unregister("orders");
    let outcome = bench.session.redo(id)?;
    assert!(matches!(outcome, RedoOutcome::Failed { .. }));
    assert_eq!(bench.fingerprint(id), before);
    assert_eq!(bench.with_dataset(id, |ds| ds.redo_depth()), 1);

    // Restoring the source makes the same redo succeed.
    TestBench::register_csv(&bench.backend, "orders", framedeck_harness::ORDERS_CSV)?;
    assert!(matches!(bench.session.redo(id)?, RedoOutcome::Redone(_)));
    assert_eq!(bench.row_count(id), 4);
    Ok(())
}
