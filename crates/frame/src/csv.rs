//! Minimal CSV source reader with per-column type inference. Header row
//! required; types widen Integer -> Float, anything inconsistent falls
//! back to Text; empty cells are null and do not affect inference.

use std::fs;
use std::path::Path;

use framedeck_core::{CellValue, Column, ColumnType, Schema};

use crate::error::LoadError;
use crate::mem::MemFrame;

pub fn read_frame(path: &Path) -> Result<MemFrame, LoadError> {
    let text = fs::read_to_string(path)?;
    parse_frame(&text, &path.display().to_string())
}

pub fn parse_frame(text: &str, source: &str) -> Result<MemFrame, LoadError> {
    let mut lines = text.lines().enumerate();
    let (_, header) = lines
        .next()
        .ok_or_else(|| LoadError::Empty(source.to_string()))?;

    let names: Vec<String> = split_line(header);
    if names.is_empty() || names.iter().all(|n| n.is_empty()) {
        return Err(LoadError::Empty(source.to_string()));
    }

    let mut raw_rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_line(line);
        if cells.len() != names.len() {
            return Err(LoadError::Parse {
                line: idx + 1,
                message: format!("expected {} fields, found {}", names.len(), cells.len()),
            });
        }
        raw_rows.push((idx + 1, cells));
    }

    let dtypes: Vec<ColumnType> = (0..names.len())
        .map(|col| infer_column(raw_rows.iter().map(|(_, cells)| cells[col].as_str())))
        .collect();

    let schema = Schema::new(
        names
            .iter()
            .zip(&dtypes)
            .map(|(name, dtype)| Column::new(name.clone(), *dtype))
            .collect(),
    );

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (line, cells) in &raw_rows {
        let mut row = Vec::with_capacity(cells.len());
        for (cell, dtype) in cells.iter().zip(&dtypes) {
            row.push(parse_cell(cell, *dtype, *line)?);
        }
        rows.push(row);
    }

    Ok(MemFrame::new(schema, rows))
}

fn split_line(line: &str) -> Vec<String> {
    line.trim_end_matches('\r')
        .split(',')
        .map(|s| s.trim().to_string())
        .collect()
}

/// Inference lattice per column: Integer widens to Float; any cell that
/// fits neither numeric nor boolean forces Text for the whole column.
fn infer_column<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut inferred: Option<ColumnType> = None;
    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        let cell_type = if cell.parse::<i64>().is_ok() {
            ColumnType::Integer
        } else if cell.parse::<f64>().is_ok() {
            ColumnType::Float
        } else if cell == "true" || cell == "false" {
            ColumnType::Boolean
        } else {
            ColumnType::Text
        };
        inferred = Some(match (inferred, cell_type) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(ColumnType::Integer), ColumnType::Float)
            | (Some(ColumnType::Float), ColumnType::Integer) => ColumnType::Float,
            _ => ColumnType::Text,
        });
        if inferred == Some(ColumnType::Text) {
            break;
        }
    }
    inferred.unwrap_or(ColumnType::Text)
}

fn parse_cell(cell: &str, dtype: ColumnType, line: usize) -> Result<CellValue, LoadError> {
    if cell.is_empty() {
        return Ok(CellValue::Null);
    }
    let parse_err = |message: String| LoadError::Parse { line, message };
    match dtype {
        ColumnType::Integer => cell
            .parse::<i64>()
            .map(CellValue::Integer)
            .map_err(|e| parse_err(format!("bad integer {cell:?}: {e}"))),
        ColumnType::Float => cell
            .parse::<f64>()
            .map(CellValue::Float)
            .map_err(|e| parse_err(format!("bad float {cell:?}: {e}"))),
        ColumnType::Boolean => match cell {
            "true" => Ok(CellValue::Boolean(true)),
            "false" => Ok(CellValue::Boolean(false)),
            other => Err(parse_err(format!("bad boolean {other:?}"))),
        },
        ColumnType::Text => Ok(CellValue::Text(cell.to_string())),
    }
}
