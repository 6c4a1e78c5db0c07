//! In-memory reference backend. Frames are immutable row tables behind
//! `Arc`; every apply builds a fresh table, so handles held as
//! checkpoints or originals are never disturbed by later operations.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;

use framedeck_core::operations::{
    AggFunc, AggSpec, ArithOp, CompareOp, DeriveExpr, JoinKind, Operand, SortKey,
};
use framedeck_core::{CellValue, Column, ColumnType, OperationExpr, Schema};

use crate::csv;
use crate::error::{LoadError, TransformError};
use crate::traits::FrameBackend;

#[derive(Debug, Clone, PartialEq)]
pub struct MemFrame {
    schema: Schema,
    rows: Vec<Vec<CellValue>>,
}

impl MemFrame {
    pub fn new(schema: Schema, rows: Vec<Vec<CellValue>>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<CellValue>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|r| r[idx].clone()).collect())
    }
}

/// Named-table registry plus CSV files on disk. Registered tables double
/// as join right-hand sides, resolved by source locator.
pub struct MemBackend {
    tables: Mutex<HashMap<String, Arc<MemFrame>>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or replace) a named table. Replacing simulates a source
    /// changing underneath a dataset between load and reload.
    pub fn register(&self, name: impl Into<String>, frame: MemFrame) {
        self.tables
            .lock()
            .expect("table registry poisoned")
            .insert(name.into(), Arc::new(frame));
    }

    pub fn unregister(&self, name: &str) {
        self.tables
            .lock()
            .expect("table registry poisoned")
            .remove(name);
    }

    fn resolve(&self, source: &str) -> Option<Arc<MemFrame>> {
        self.tables
            .lock()
            .expect("table registry poisoned")
            .get(source)
            .cloned()
    }
}

impl Default for MemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBackend for MemBackend {
    type Frame = Arc<MemFrame>;

    fn apply(
        &self,
        frame: &Self::Frame,
        expr: &OperationExpr,
    ) -> Result<Self::Frame, TransformError> {
        let out = match expr {
            OperationExpr::Filter { column, op, value } => filter(frame, column, *op, value)?,
            OperationExpr::Select { columns } => select(frame, columns)?,
            OperationExpr::Sort { keys } => sort(frame, keys)?,
            OperationExpr::Aggregate {
                group_by,
                aggregates,
            } => aggregate(frame, group_by, aggregates)?,
            OperationExpr::Pivot {
                index,
                columns,
                values,
                agg,
            } => pivot(frame, index, columns, values, *agg)?,
            OperationExpr::Join {
                right_source,
                on,
                how,
            } => {
                let right = self
                    .resolve(right_source)
                    .or_else(|| {
                        let path = Path::new(right_source);
                        csv::read_frame(path).ok().map(Arc::new)
                    })
                    .ok_or_else(|| TransformError::UnknownRightSource(right_source.clone()))?;
                join(frame, &right, on, *how)?
            }
            OperationExpr::Rename { from, to } => rename(frame, from, to)?,
            OperationExpr::Drop { columns } => drop_columns(frame, columns)?,
            OperationExpr::FillNull { columns, value } => fill_null(frame, columns, value)?,
            OperationExpr::DropNull { columns } => drop_null(frame, columns)?,
            OperationExpr::Dedupe { columns } => dedupe(frame, columns)?,
            OperationExpr::Head { rows } => head_rows(frame, *rows),
            OperationExpr::Tail { rows } => tail_rows(frame, *rows),
            OperationExpr::Sample { rows, seed } => sample(frame, *rows, *seed),
            OperationExpr::DeriveColumn { name, expr } => derive_column(frame, name, expr)?,
        };
        Ok(Arc::new(out))
    }

    fn load(&self, source: &str) -> Result<(Self::Frame, Schema), LoadError> {
        if let Some(frame) = self.resolve(source) {
            let schema = frame.schema.clone();
            return Ok((frame, schema));
        }
        let path = Path::new(source);
        if source.ends_with(".csv") && path.exists() {
            let frame = csv::read_frame(path)?;
            let schema = frame.schema.clone();
            return Ok((Arc::new(frame), schema));
        }
        Err(LoadError::UnknownSource(source.to_string()))
    }

    fn schema(&self, frame: &Self::Frame) -> Schema {
        frame.schema.clone()
    }

    fn row_count(&self, frame: &Self::Frame) -> usize {
        frame.rows.len()
    }

    fn head(&self, frame: &Self::Frame, rows: usize) -> Self::Frame {
        Arc::new(head_rows(frame, rows))
    }

    fn fingerprint(&self, frame: &Self::Frame) -> [u8; 32] {
        hash_frame(frame)
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn column_index(schema: &Schema, name: &str) -> Result<usize, TransformError> {
    schema
        .index_of(name)
        .ok_or_else(|| TransformError::UnknownColumn(name.to_string()))
}

fn is_numeric(dtype: ColumnType) -> bool {
    matches!(dtype, ColumnType::Integer | ColumnType::Float)
}

fn type_name(value: &CellValue) -> String {
    match value.dtype() {
        Some(t) => t.to_string(),
        None => "null".to_string(),
    }
}

/// Total order over cells of one column: nulls sort last, numerics by
/// `total_cmp` (so an integer and a float column value interleave sanely).
fn cmp_cells(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Null, CellValue::Null) => Ordering::Equal,
        (CellValue::Null, _) => Ordering::Greater,
        (_, CellValue::Null) => Ordering::Less,
        (CellValue::Text(x), CellValue::Text(y)) => x.cmp(y),
        (CellValue::Boolean(x), CellValue::Boolean(y)) => x.cmp(y),
        _ => match (a.as_numeric(), b.as_numeric()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            // Mixed non-numeric variants cannot occur in a typed column;
            // fall back to a stable arbitrary order.
            _ => variant_rank(a).cmp(&variant_rank(b)),
        },
    }
}

fn variant_rank(value: &CellValue) -> u8 {
    match value {
        CellValue::Null => 0,
        CellValue::Boolean(_) => 1,
        CellValue::Integer(_) => 2,
        CellValue::Float(_) => 3,
        CellValue::Text(_) => 4,
    }
}

/// Infallible, injective byte encoding of a cell sequence; the basis for
/// group/dedupe/join keys and frame fingerprints.
fn encode_cells(buf: &mut Vec<u8>, cells: &[CellValue]) {
    for cell in cells {
        match cell {
            CellValue::Null => buf.push(0),
            CellValue::Text(s) => {
                buf.push(1);
                buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            CellValue::Integer(n) => {
                buf.push(2);
                buf.extend_from_slice(&n.to_le_bytes());
            }
            CellValue::Float(x) => {
                buf.push(3);
                buf.extend_from_slice(&x.to_bits().to_le_bytes());
            }
            CellValue::Boolean(b) => {
                buf.push(4);
                buf.push(*b as u8);
            }
        }
    }
}

fn key_bytes(row: &[CellValue], indices: &[usize]) -> Vec<u8> {
    let cells: Vec<CellValue> = indices.iter().map(|&i| row[i].clone()).collect();
    let mut buf = Vec::new();
    encode_cells(&mut buf, &cells);
    buf
}

fn hash_frame(frame: &MemFrame) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for column in frame.schema.columns() {
        hasher.update(&(column.name.len() as u64).to_le_bytes());
        hasher.update(column.name.as_bytes());
        hasher.update(column.dtype.to_string().as_bytes());
    }
    let mut buf = Vec::new();
    for row in &frame.rows {
        buf.clear();
        encode_cells(&mut buf, row);
        hasher.update(&(buf.len() as u64).to_le_bytes());
        hasher.update(&buf);
    }
    *hasher.finalize().as_bytes()
}

// ============================================================================
// Operations
// ============================================================================

fn filter(
    frame: &MemFrame,
    column: &str,
    op: CompareOp,
    value: &CellValue,
) -> Result<MemFrame, TransformError> {
    let idx = column_index(&frame.schema, column)?;
    let dtype = frame.schema.columns()[idx].dtype;
    check_compare_types(column, dtype, op, value)?;

    let rows = frame
        .rows
        .iter()
        .filter(|row| cell_matches(&row[idx], op, value))
        .cloned()
        .collect();
    Ok(MemFrame::new(frame.schema.clone(), rows))
}

fn check_compare_types(
    column: &str,
    dtype: ColumnType,
    op: CompareOp,
    value: &CellValue,
) -> Result<(), TransformError> {
    let mismatch = |expected: &str| TransformError::TypeMismatch {
        column: column.to_string(),
        expected: expected.to_string(),
        found: type_name(value),
    };
    if op == CompareOp::Contains {
        if dtype != ColumnType::Text || value.as_text().is_none() {
            return Err(mismatch("text"));
        }
        return Ok(());
    }
    let compatible = match dtype {
        ColumnType::Integer | ColumnType::Float => value.as_numeric().is_some(),
        ColumnType::Text => value.as_text().is_some(),
        ColumnType::Boolean => value.as_boolean().is_some(),
    };
    if compatible {
        Ok(())
    } else {
        Err(mismatch(&dtype.to_string()))
    }
}

/// Null cells match no predicate.
fn cell_matches(cell: &CellValue, op: CompareOp, value: &CellValue) -> bool {
    if cell.is_null() {
        return false;
    }
    if op == CompareOp::Contains {
        return match (cell.as_text(), value.as_text()) {
            (Some(hay), Some(needle)) => hay.contains(needle),
            _ => false,
        };
    }
    let ordering = cmp_cells(cell, value);
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Contains => unreachable!("handled above"),
    }
}

fn select(frame: &MemFrame, columns: &[String]) -> Result<MemFrame, TransformError> {
    let indices: Vec<usize> = columns
        .iter()
        .map(|c| column_index(&frame.schema, c))
        .collect::<Result<_, _>>()?;
    let schema = Schema::new(
        indices
            .iter()
            .map(|&i| frame.schema.columns()[i].clone())
            .collect(),
    );
    let rows = frame
        .rows
        .iter()
        .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Ok(MemFrame::new(schema, rows))
}

fn sort(frame: &MemFrame, keys: &[SortKey]) -> Result<MemFrame, TransformError> {
    let indices: Vec<(usize, bool)> = keys
        .iter()
        .map(|k| column_index(&frame.schema, &k.column).map(|i| (i, k.descending)))
        .collect::<Result<_, _>>()?;

    let mut rows = frame.rows.clone();
    rows.sort_by(|a, b| {
        for &(idx, descending) in &indices {
            let ord = cmp_cells(&a[idx], &b[idx]);
            let ord = if descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(MemFrame::new(frame.schema.clone(), rows))
}

fn agg_output_dtype(func: AggFunc, input: ColumnType) -> ColumnType {
    match func {
        AggFunc::Count => ColumnType::Integer,
        AggFunc::Mean => ColumnType::Float,
        AggFunc::Sum | AggFunc::Min | AggFunc::Max => input,
    }
}

fn check_agg_input(column: &str, func: AggFunc, dtype: ColumnType) -> Result<(), TransformError> {
    if matches!(func, AggFunc::Sum | AggFunc::Mean) && !is_numeric(dtype) {
        return Err(TransformError::TypeMismatch {
            column: column.to_string(),
            expected: "integer or float".to_string(),
            found: dtype.to_string(),
        });
    }
    Ok(())
}

fn aggregate_values(values: &[&CellValue], func: AggFunc, dtype: ColumnType) -> CellValue {
    let non_null: Vec<&CellValue> = values.iter().copied().filter(|v| !v.is_null()).collect();
    match func {
        AggFunc::Count => CellValue::Integer(non_null.len() as i64),
        AggFunc::Sum => {
            if dtype == ColumnType::Integer {
                CellValue::Integer(non_null.iter().filter_map(|v| v.as_integer()).sum())
            } else {
                CellValue::Float(non_null.iter().filter_map(|v| v.as_numeric()).sum())
            }
        }
        AggFunc::Mean => {
            if non_null.is_empty() {
                CellValue::Null
            } else {
                let sum: f64 = non_null.iter().filter_map(|v| v.as_numeric()).sum();
                CellValue::Float(sum / non_null.len() as f64)
            }
        }
        AggFunc::Min => non_null
            .iter()
            .copied()
            .min_by(|a, b| cmp_cells(a, b))
            .cloned()
            .unwrap_or(CellValue::Null),
        AggFunc::Max => non_null
            .iter()
            .copied()
            .max_by(|a, b| cmp_cells(a, b))
            .cloned()
            .unwrap_or(CellValue::Null),
    }
}

fn aggregate(
    frame: &MemFrame,
    group_by: &[String],
    aggregates: &[AggSpec],
) -> Result<MemFrame, TransformError> {
    let group_indices: Vec<usize> = group_by
        .iter()
        .map(|c| column_index(&frame.schema, c))
        .collect::<Result<_, _>>()?;

    let mut agg_inputs = Vec::with_capacity(aggregates.len());
    for spec in aggregates {
        let idx = column_index(&frame.schema, &spec.column)?;
        let dtype = frame.schema.columns()[idx].dtype;
        check_agg_input(&spec.column, spec.func, dtype)?;
        agg_inputs.push((idx, dtype));
    }

    let mut out_columns: Vec<Column> = group_indices
        .iter()
        .map(|&i| frame.schema.columns()[i].clone())
        .collect();
    for (spec, &(_, dtype)) in aggregates.iter().zip(&agg_inputs) {
        let name = spec.output_name();
        if out_columns.iter().any(|c| c.name == name) {
            return Err(TransformError::DuplicateColumn(name));
        }
        out_columns.push(Column::new(name, agg_output_dtype(spec.func, dtype)));
    }

    // Groups in first-appearance order.
    let mut order: Vec<Vec<u8>> = Vec::new();
    let mut groups: HashMap<Vec<u8>, (Vec<CellValue>, Vec<usize>)> = HashMap::new();
    for (row_idx, row) in frame.rows.iter().enumerate() {
        let key = key_bytes(row, &group_indices);
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            let key_values = group_indices.iter().map(|&i| row[i].clone()).collect();
            (key_values, Vec::new())
        });
        entry.1.push(row_idx);
    }

    let mut rows = Vec::with_capacity(order.len());
    for key in &order {
        let (key_values, row_indices) = &groups[key];
        let mut out_row = key_values.clone();
        for (spec, &(idx, dtype)) in aggregates.iter().zip(&agg_inputs) {
            let values: Vec<&CellValue> = row_indices.iter().map(|&r| &frame.rows[r][idx]).collect();
            out_row.push(aggregate_values(&values, spec.func, dtype));
        }
        rows.push(out_row);
    }

    Ok(MemFrame::new(Schema::new(out_columns), rows))
}

fn pivot(
    frame: &MemFrame,
    index: &str,
    columns: &str,
    values: &str,
    agg: AggFunc,
) -> Result<MemFrame, TransformError> {
    let index_idx = column_index(&frame.schema, index)?;
    let columns_idx = column_index(&frame.schema, columns)?;
    let values_idx = column_index(&frame.schema, values)?;
    let values_dtype = frame.schema.columns()[values_idx].dtype;
    check_agg_input(values, agg, values_dtype)?;

    // Distinct spread values in first-appearance order become columns.
    let mut spread: Vec<CellValue> = Vec::new();
    for row in &frame.rows {
        let cell = &row[columns_idx];
        if !spread.contains(cell) {
            spread.push(cell.clone());
        }
    }

    let out_dtype = agg_output_dtype(agg, values_dtype);
    let mut out_columns = vec![frame.schema.columns()[index_idx].clone()];
    for cell in &spread {
        let name = cell.to_string();
        if out_columns.iter().any(|c| c.name == name) {
            return Err(TransformError::DuplicateColumn(name));
        }
        out_columns.push(Column::new(name, out_dtype));
    }

    // Buckets keyed by (index value, spread position), index groups in
    // first-appearance order.
    let mut index_order: Vec<Vec<u8>> = Vec::new();
    let mut buckets: HashMap<Vec<u8>, (CellValue, Vec<Vec<&CellValue>>)> = HashMap::new();
    for row in &frame.rows {
        let key = key_bytes(row, &[index_idx]);
        let entry = buckets.entry(key.clone()).or_insert_with(|| {
            index_order.push(key);
            (row[index_idx].clone(), vec![Vec::new(); spread.len()])
        });
        let spread_pos = spread
            .iter()
            .position(|c| c == &row[columns_idx])
            .expect("spread value collected above");
        entry.1[spread_pos].push(&row[values_idx]);
    }

    let mut rows = Vec::with_capacity(index_order.len());
    for key in &index_order {
        let (index_value, cells) = &buckets[key];
        let mut out_row = vec![index_value.clone()];
        for bucket in cells {
            if bucket.is_empty() {
                out_row.push(CellValue::Null);
            } else {
                out_row.push(aggregate_values(bucket, agg, values_dtype));
            }
        }
        rows.push(out_row);
    }

    Ok(MemFrame::new(Schema::new(out_columns), rows))
}

fn join(
    left: &MemFrame,
    right: &MemFrame,
    on: &[String],
    how: JoinKind,
) -> Result<MemFrame, TransformError> {
    let left_keys: Vec<usize> = on
        .iter()
        .map(|c| column_index(&left.schema, c))
        .collect::<Result<_, _>>()?;
    let right_keys: Vec<usize> = on
        .iter()
        .map(|c| column_index(&right.schema, c))
        .collect::<Result<_, _>>()?;

    for ((&l, &r), name) in left_keys.iter().zip(&right_keys).zip(on) {
        let left_dtype = left.schema.columns()[l].dtype;
        let right_dtype = right.schema.columns()[r].dtype;
        if left_dtype != right_dtype {
            return Err(TransformError::TypeMismatch {
                column: name.clone(),
                expected: left_dtype.to_string(),
                found: right_dtype.to_string(),
            });
        }
    }

    // Right columns minus keys, disambiguated on name collision.
    let carried: Vec<usize> = (0..right.schema.len())
        .filter(|i| !right_keys.contains(i))
        .collect();
    let mut out_columns = left.schema.columns().to_vec();
    for &i in &carried {
        let column = &right.schema.columns()[i];
        let name = if left.schema.has_column(&column.name) {
            format!("{}_right", column.name)
        } else {
            column.name.clone()
        };
        if out_columns.iter().any(|c| c.name == name) {
            return Err(TransformError::DuplicateColumn(name));
        }
        out_columns.push(Column::new(name, column.dtype));
    }

    // Hash the right side; null keys never match.
    let mut right_map: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
    for (idx, row) in right.rows.iter().enumerate() {
        if right_keys.iter().any(|&k| row[k].is_null()) {
            continue;
        }
        right_map
            .entry(key_bytes(row, &right_keys))
            .or_default()
            .push(idx);
    }

    let mut rows = Vec::new();
    for row in &left.rows {
        let null_key = left_keys.iter().any(|&k| row[k].is_null());
        let matches = if null_key {
            None
        } else {
            right_map.get(&key_bytes(row, &left_keys))
        };
        match matches {
            Some(indices) => {
                for &r in indices {
                    let mut out_row = row.clone();
                    out_row.extend(carried.iter().map(|&i| right.rows[r][i].clone()));
                    rows.push(out_row);
                }
            }
            None => {
                if how == JoinKind::Left {
                    let mut out_row = row.clone();
                    out_row.extend(carried.iter().map(|_| CellValue::Null));
                    rows.push(out_row);
                }
            }
        }
    }

    Ok(MemFrame::new(Schema::new(out_columns), rows))
}

fn rename(frame: &MemFrame, from: &str, to: &str) -> Result<MemFrame, TransformError> {
    let idx = column_index(&frame.schema, from)?;
    if frame.schema.has_column(to) {
        return Err(TransformError::DuplicateColumn(to.to_string()));
    }
    let mut columns = frame.schema.columns().to_vec();
    columns[idx].name = to.to_string();
    Ok(MemFrame::new(Schema::new(columns), frame.rows.clone()))
}

fn drop_columns(frame: &MemFrame, columns: &[String]) -> Result<MemFrame, TransformError> {
    for name in columns {
        column_index(&frame.schema, name)?;
    }
    if columns.len() >= frame.schema.len() {
        return Err(TransformError::WouldDropAllColumns);
    }
    let kept: Vec<String> = frame
        .schema
        .names()
        .filter(|n| !columns.iter().any(|c| c == n))
        .map(|n| n.to_string())
        .collect();
    select(frame, &kept)
}

fn fill_null(
    frame: &MemFrame,
    columns: &[String],
    value: &CellValue,
) -> Result<MemFrame, TransformError> {
    let targets: Vec<usize> = if columns.is_empty() {
        (0..frame.schema.len()).collect()
    } else {
        columns
            .iter()
            .map(|c| column_index(&frame.schema, c))
            .collect::<Result<_, _>>()?
    };

    // Coerce the fill value per target column; incompatible targets fail
    // before any row is touched.
    let mut fills: Vec<(usize, CellValue)> = Vec::with_capacity(targets.len());
    for &idx in &targets {
        let column = &frame.schema.columns()[idx];
        let fill = coerce_value(value, column.dtype).ok_or_else(|| {
            TransformError::TypeMismatch {
                column: column.name.clone(),
                expected: column.dtype.to_string(),
                found: type_name(value),
            }
        })?;
        fills.push((idx, fill));
    }

    let rows = frame
        .rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            for (idx, fill) in &fills {
                if row[*idx].is_null() {
                    row[*idx] = fill.clone();
                }
            }
            row
        })
        .collect();
    Ok(MemFrame::new(frame.schema.clone(), rows))
}

fn coerce_value(value: &CellValue, dtype: ColumnType) -> Option<CellValue> {
    match (value, dtype) {
        (CellValue::Integer(n), ColumnType::Integer) => Some(CellValue::Integer(*n)),
        (CellValue::Integer(n), ColumnType::Float) => Some(CellValue::Float(*n as f64)),
        (CellValue::Float(x), ColumnType::Float) => Some(CellValue::Float(*x)),
        (CellValue::Text(s), ColumnType::Text) => Some(CellValue::Text(s.clone())),
        (CellValue::Boolean(b), ColumnType::Boolean) => Some(CellValue::Boolean(*b)),
        _ => None,
    }
}

fn drop_null(frame: &MemFrame, columns: &[String]) -> Result<MemFrame, TransformError> {
    let targets: Vec<usize> = if columns.is_empty() {
        (0..frame.schema.len()).collect()
    } else {
        columns
            .iter()
            .map(|c| column_index(&frame.schema, c))
            .collect::<Result<_, _>>()?
    };
    let rows = frame
        .rows
        .iter()
        .filter(|row| targets.iter().all(|&i| !row[i].is_null()))
        .cloned()
        .collect();
    Ok(MemFrame::new(frame.schema.clone(), rows))
}

fn dedupe(frame: &MemFrame, columns: &[String]) -> Result<MemFrame, TransformError> {
    let targets: Vec<usize> = if columns.is_empty() {
        (0..frame.schema.len()).collect()
    } else {
        columns
            .iter()
            .map(|c| column_index(&frame.schema, c))
            .collect::<Result<_, _>>()?
    };
    let mut seen: std::collections::HashSet<Vec<u8>> = std::collections::HashSet::new();
    let rows = frame
        .rows
        .iter()
        .filter(|row| seen.insert(key_bytes(row, &targets)))
        .cloned()
        .collect();
    Ok(MemFrame::new(frame.schema.clone(), rows))
}

fn head_rows(frame: &MemFrame, rows: usize) -> MemFrame {
    MemFrame::new(
        frame.schema.clone(),
        frame.rows.iter().take(rows).cloned().collect(),
    )
}

fn tail_rows(frame: &MemFrame, rows: usize) -> MemFrame {
    let skip = frame.rows.len().saturating_sub(rows);
    MemFrame::new(
        frame.schema.clone(),
        frame.rows.iter().skip(skip).cloned().collect(),
    )
}

/// Deterministic: an explicit seed is honored, otherwise the seed derives
/// from the frame's own fingerprint, so identical frame + operation always
/// sample identically. Row order of the sample follows the input.
fn sample(frame: &MemFrame, rows: usize, seed: Option<u64>) -> MemFrame {
    if rows >= frame.rows.len() {
        return frame.clone();
    }
    let seed = seed.unwrap_or_else(|| {
        let digest = hash_frame(frame);
        u64::from_le_bytes(digest[..8].try_into().expect("8-byte slice"))
    });
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, frame.rows.len(), rows).into_vec();
    indices.sort_unstable();
    MemFrame::new(
        frame.schema.clone(),
        indices.iter().map(|&i| frame.rows[i].clone()).collect(),
    )
}

fn derive_column(
    frame: &MemFrame,
    name: &str,
    expr: &DeriveExpr,
) -> Result<MemFrame, TransformError> {
    if frame.schema.has_column(name) {
        return Err(TransformError::DuplicateColumn(name.to_string()));
    }

    let resolve = |operand: &Operand| -> Result<(Option<usize>, ColumnType), TransformError> {
        match operand {
            Operand::Column(column) => {
                let idx = column_index(&frame.schema, column)?;
                let dtype = frame.schema.columns()[idx].dtype;
                if !is_numeric(dtype) {
                    return Err(TransformError::TypeMismatch {
                        column: column.clone(),
                        expected: "integer or float".to_string(),
                        found: dtype.to_string(),
                    });
                }
                Ok((Some(idx), dtype))
            }
            Operand::Literal(value) => match value.dtype() {
                Some(dtype) if is_numeric(dtype) => Ok((None, dtype)),
                _ => Err(TransformError::Arithmetic(format!(
                    "non-numeric literal operand: {value}"
                ))),
            },
        }
    };

    let (left_idx, left_dtype) = resolve(&expr.left)?;
    let (right_idx, right_dtype) = resolve(&expr.right)?;
    let integral = left_dtype == ColumnType::Integer
        && right_dtype == ColumnType::Integer
        && expr.op != ArithOp::Div;
    let out_dtype = if integral {
        ColumnType::Integer
    } else {
        ColumnType::Float
    };

    let operand_value = |idx: Option<usize>, literal: &Operand, row: &[CellValue]| -> CellValue {
        match idx {
            Some(i) => row[i].clone(),
            None => match literal {
                Operand::Literal(v) => v.clone(),
                Operand::Column(_) => unreachable!("column operands resolve to an index"),
            },
        }
    };

    let mut rows = Vec::with_capacity(frame.rows.len());
    for row in &frame.rows {
        let left = operand_value(left_idx, &expr.left, row);
        let right = operand_value(right_idx, &expr.right, row);
        let cell = if left.is_null() || right.is_null() {
            CellValue::Null
        } else if integral {
            let a = left.as_integer().expect("integer operand");
            let b = right.as_integer().expect("integer operand");
            let result = match expr.op {
                ArithOp::Add => a.checked_add(b),
                ArithOp::Sub => a.checked_sub(b),
                ArithOp::Mul => a.checked_mul(b),
                ArithOp::Div => unreachable!("integer division produces float"),
            };
            match result {
                Some(n) => CellValue::Integer(n),
                None => {
                    return Err(TransformError::Arithmetic(format!(
                        "integer overflow computing {name}"
                    )))
                }
            }
        } else {
            let a = left.as_numeric().expect("numeric operand");
            let b = right.as_numeric().expect("numeric operand");
            if expr.op == ArithOp::Div && b == 0.0 {
                return Err(TransformError::Arithmetic(format!(
                    "division by zero computing {name}"
                )));
            }
            let x = match expr.op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
            };
            CellValue::Float(x)
        };
        let mut out_row = row.clone();
        out_row.push(cell);
        rows.push(out_row);
    }

    let mut columns = frame.schema.columns().to_vec();
    columns.push(Column::new(name.to_string(), out_dtype));
    Ok(MemFrame::new(Schema::new(columns), rows))
}
