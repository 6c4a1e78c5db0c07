use framedeck_core::operations::CompareOp;
use framedeck_core::{CellValue, DatasetId, OperationExpr};
use framedeck_engine::{
    AddOutcome, EngineError, ExecutionMode, SubmitOutcome, MAX_DATASETS,
};
use framedeck_harness::TestBench;

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn open_is_rejected_at_the_dataset_cap() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;

    for i in 1..=MAX_DATASETS {
        let outcome = bench.session.open("people", "people", ExecutionMode::Lazy)?;
        match outcome {
            AddOutcome::Added(_) => assert!(i <= MAX_DATASETS - 2),
            AddOutcome::AddedNearLimit { slots_left, .. } => {
                assert_eq!(slots_left, MAX_DATASETS - i);
            }
            AddOutcome::RejectedAtLimit => return Err(format!("rejected at {i}").into()),
        }
    }
    assert_eq!(bench.session.len(), MAX_DATASETS);

    // The cap is checked before any loading work happens.
    let outcome = bench.session.open("people", "people", ExecutionMode::Lazy)?;
    assert_eq!(outcome, AddOutcome::RejectedAtLimit);
    assert_eq!(bench.session.len(), MAX_DATASETS);
    Ok(())
}

#[test]
fn duplicate_names_get_numeric_suffixes() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let a = bench.open_people(ExecutionMode::Lazy)?;
    let b = bench.open_people(ExecutionMode::Lazy)?;
    let c = bench.open_people(ExecutionMode::Lazy)?;

    assert_eq!(bench.with_dataset(a, |ds| ds.name().to_string()), "people");
    assert_eq!(bench.with_dataset(b, |ds| ds.name().to_string()), "people_2");
    assert_eq!(bench.with_dataset(c, |ds| ds.name().to_string()), "people_3");
    Ok(())
}

// ============================================================================
// Active dataset
// ============================================================================

#[test]
fn first_open_becomes_active_and_switching_moves_one_flag(
) -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let a = bench.open_people(ExecutionMode::Lazy)?;
    let b = bench.open_orders(ExecutionMode::Lazy)?;

    assert_eq!(bench.session.active_id(), Some(a));
    assert!(bench.with_dataset(a, |ds| ds.is_active()));
    assert!(!bench.with_dataset(b, |ds| ds.is_active()));

    bench.session.set_active(b)?;
    assert_eq!(bench.session.active_id(), Some(b));
    assert!(!bench.with_dataset(a, |ds| ds.is_active()));
    assert!(bench.with_dataset(b, |ds| ds.is_active()));

    let unknown = DatasetId::new();
    assert!(matches!(
        bench.session.set_active(unknown),
        Err(EngineError::DatasetNotFound(_))
    ));
    // The failed switch changed nothing.
    assert_eq!(bench.session.active_id(), Some(b));
    Ok(())
}

#[test]
fn removing_the_active_dataset_activates_the_first_remaining(
) -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let a = bench.open_people(ExecutionMode::Lazy)?;
    let b = bench.open_orders(ExecutionMode::Lazy)?;
    let c = bench.open("more_people", "people", ExecutionMode::Lazy)?;

    bench.session.set_active(b)?;
    bench.session.remove(b)?;
    assert_eq!(bench.session.active_id(), Some(a));
    assert!(bench.with_dataset(a, |ds| ds.is_active()));

    bench.session.remove(a)?;
    assert_eq!(bench.session.active_id(), Some(c));

    bench.session.remove(c)?;
    assert_eq!(bench.session.active_id(), None);
    assert!(bench.session.is_empty());
    Ok(())
}

// ============================================================================
// Pairing
// ============================================================================

#[test]
fn pairing_marks_two_open_datasets() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let a = bench.open_people(ExecutionMode::Lazy)?;
    let b = bench.open_orders(ExecutionMode::Lazy)?;

    bench.session.pair(a, b)?;
    assert_eq!(bench.session.paired(), Some((a, b)));

    bench.session.unpair();
    assert_eq!(bench.session.paired(), None);

    bench.session.pair(a, b)?;
    bench.session.remove(b)?;
    assert_eq!(bench.session.paired(), None);

    assert!(matches!(
        bench.session.pair(a, DatasetId::new()),
        Err(EngineError::DatasetNotFound(_))
    ));
    Ok(())
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn datasets_from_the_same_source_stay_independent() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let a = bench.open_people(ExecutionMode::Eager)?;
    let b = bench.open_people(ExecutionMode::Lazy)?;
    let fp_b = bench.fingerprint(b);

    bench.submit_ok(a, OperationExpr::Filter {
        column: "city".into(),
        op: CompareOp::Eq,
        value: CellValue::Text("lisbon".into()),
    })?;
    bench.submit_ok(b, OperationExpr::Head { rows: 2 })?;

    // a applied eagerly; b only queued, and neither sees the other.
    assert_eq!(bench.row_count(a), 3);
    assert_eq!(bench.row_count(b), 6);
    assert_eq!(bench.fingerprint(b), fp_b);
    assert_eq!(bench.queued_len(a), 0);
    assert_eq!(bench.queued_len(b), 1);
    assert_eq!(bench.executed_len(b), 0);
    Ok(())
}

// ============================================================================
// Operation history export
// ============================================================================

#[test]
fn export_lists_executed_then_queued_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let id = bench.open_people(ExecutionMode::Lazy)?;

    bench.submit_ok(id, OperationExpr::Filter {
        column: "age".into(),
        op: CompareOp::Gt,
        value: CellValue::Integer(25),
    })?;
    bench.submit_ok(id, OperationExpr::Head { rows: 3 })?;
    bench.session.execute_one(id)?;

    let export = bench.with_dataset(id, |ds| ds.export_operations());
    assert_eq!(export.name, "people");
    assert_eq!(export.source, "people");
    assert_eq!(export.executed.len(), 1);
    assert_eq!(export.executed[0].kind, "filter");
    assert_eq!(export.executed[0].label, "Filter: age > 25");
    assert_eq!(export.queued.len(), 1);
    assert_eq!(export.queued[0].kind, "head");

    let bytes = export.to_msgpack()?;
    let decoded = framedeck_core::export::DatasetOpsExport::from_msgpack(&bytes)?;
    assert_eq!(decoded, export);
    Ok(())
}

#[test]
fn submit_through_session_respects_each_mode() -> Result<(), Box<dyn std::error::Error>> {
    let mut bench = TestBench::new()?;
    let lazy = bench.open_people(ExecutionMode::Lazy)?;
    let eager = bench.open_orders(ExecutionMode::Eager)?;

    let q = bench.submit(lazy, OperationExpr::Head { rows: 1 })?;
    assert!(matches!(q, SubmitOutcome::Queued(_)));
    let a = bench.submit(eager, OperationExpr::Head { rows: 1 })?;
    assert!(matches!(a, SubmitOutcome::Applied(_)));
    Ok(())
}
