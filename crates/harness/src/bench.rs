use std::sync::{Arc, Mutex};

use framedeck_core::{
    CellValue, DatasetId, OpId, OperationExpr, OperationRecord, ValidationError,
};
use framedeck_engine::{
    Dataset, DatasetSession, Engine, EngineConfig, EngineError, ExecutionMode, SubmitOutcome,
};
use framedeck_frame::{FrameBackend, MemBackend, MemFrame};

/// Small people table used by most tests: mixed types, one null cell.
pub const PEOPLE_CSV: &str = "\
name,age,city
alice,34,lisbon
bob,28,porto
carol,41,lisbon
dave,28,faro
erin,,porto
frank,55,lisbon
";

/// Orders table keyed by person name, for join coverage.
pub const ORDERS_CSV: &str = "\
name,amount
alice,120
bob,75
alice,40
dave,300
";

/// One backend, one engine, one session, with the canned tables already
/// registered. Tests drive everything through the session the way a
/// frontend would.
pub struct TestBench {
    pub backend: Arc<MemBackend>,
    pub session: DatasetSession<MemBackend>,
}

impl TestBench {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let backend = Arc::new(MemBackend::new());
        Self::register_csv(&backend, "people", PEOPLE_CSV)?;
        Self::register_csv(&backend, "orders", ORDERS_CSV)?;
        let engine = Arc::new(Engine::with_config(Arc::clone(&backend), config));
        let session = DatasetSession::new(engine);
        Ok(Self { backend, session })
    }

    pub fn register_csv(
        backend: &MemBackend,
        name: &str,
        text: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let frame = framedeck_frame::csv::parse_frame(text, name)?;
        backend.register(name, frame);
        Ok(())
    }

    pub fn open_people(
        &mut self,
        mode: ExecutionMode,
    ) -> Result<DatasetId, Box<dyn std::error::Error>> {
        self.open("people", "people", mode)
    }

    pub fn open_orders(
        &mut self,
        mode: ExecutionMode,
    ) -> Result<DatasetId, Box<dyn std::error::Error>> {
        self.open("orders", "orders", mode)
    }

    pub fn open(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        mode: ExecutionMode,
    ) -> Result<DatasetId, Box<dyn std::error::Error>> {
        use framedeck_engine::AddOutcome;
        match self.session.open(name, source, mode)? {
            AddOutcome::Added(id) | AddOutcome::AddedNearLimit { id, .. } => Ok(id),
            AddOutcome::RejectedAtLimit => Err("session at dataset limit".into()),
        }
    }

    /// Validate, returning the validation result itself so tests can
    /// assert on rejections.
    pub fn prepare(
        &self,
        id: DatasetId,
        expr: OperationExpr,
    ) -> Result<Result<OperationRecord, ValidationError>, EngineError> {
        self.session.prepare(id, expr)
    }

    /// Validate and submit in one step, as the common path does.
    pub fn submit(
        &self,
        id: DatasetId,
        expr: OperationExpr,
    ) -> Result<SubmitOutcome, Box<dyn std::error::Error>> {
        let record = self.session.prepare(id, expr)??;
        Ok(self.session.submit(id, record)?)
    }

    /// Submit expecting queueing/application to succeed, returning the id.
    pub fn submit_ok(
        &self,
        id: DatasetId,
        expr: OperationExpr,
    ) -> Result<OpId, Box<dyn std::error::Error>> {
        match self.submit(id, expr)? {
            SubmitOutcome::Queued(op) | SubmitOutcome::Applied(op) => Ok(op),
        }
    }

    pub fn dataset(&self, id: DatasetId) -> Arc<Mutex<Dataset<Arc<MemFrame>>>> {
        self.session.dataset(id).expect("dataset open")
    }

    pub fn with_dataset<T>(
        &self,
        id: DatasetId,
        f: impl FnOnce(&Dataset<Arc<MemFrame>>) -> T,
    ) -> T {
        let handle = self.dataset(id);
        let ds = handle.lock().expect("dataset lock");
        f(&ds)
    }

    pub fn row_count(&self, id: DatasetId) -> usize {
        self.with_dataset(id, |ds| ds.frame().row_count())
    }

    pub fn column_names(&self, id: DatasetId) -> Vec<String> {
        self.with_dataset(id, |ds| {
            ds.schema().names().map(str::to_string).collect()
        })
    }

    pub fn column(&self, id: DatasetId, name: &str) -> Vec<CellValue> {
        self.with_dataset(id, |ds| {
            ds.frame().column(name).expect("column present")
        })
    }

    pub fn queued_len(&self, id: DatasetId) -> usize {
        self.with_dataset(id, |ds| ds.queued_operations().len())
    }

    pub fn executed_len(&self, id: DatasetId) -> usize {
        self.with_dataset(id, |ds| ds.executed_operations().len())
    }

    pub fn fingerprint(&self, id: DatasetId) -> [u8; 32] {
        let backend = Arc::clone(self.session.engine().backend());
        self.with_dataset(id, |ds| backend.fingerprint(ds.frame()))
    }
}
