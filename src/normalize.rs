//! Shapes raw result sets into display-ready tables.
//!
//! The database decides which rows come back; everything about how they are
//! presented (row order, rounding, entities that must always be present) is
//! decided here so that every encoding sees the same table.

use crate::error::{Guidance, ReportError};
use crate::query::Value;
use crate::render::Format;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    /// Sales volume in millions; always shown with two decimals.
    Metric,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub label: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn text(label: impl Into<String>) -> Self {
        Self::new(label, ColumnKind::Text)
    }

    pub fn integer(label: impl Into<String>) -> Self {
        Self::new(label, ColumnKind::Integer)
    }

    pub fn metric(label: impl Into<String>) -> Self {
        Self::new(label, ColumnKind::Metric)
    }

    fn new(label: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }

    /// The value a synthesized row carries in this column.
    fn zero(&self) -> Value {
        match self.kind {
            ColumnKind::Text => Value::Null,
            ColumnKind::Integer => Value::Integer(0),
            ColumnKind::Metric => Value::Float(0.0),
        }
    }
}

pub type Row = Vec<Value>;

/// Uniformly shaped rows: every row has one value per column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) {
        assert_eq!(row.len(), self.columns.len(), "row width does not match columns");
        self.rows.push(row);
    }

    /// Guarantees each of `keys` appears exactly once in `column`. Missing
    /// keys get a synthesized row with zeroed numeric fields; duplicates
    /// after the first are dropped.
    pub fn ensure_entities(&mut self, column: usize, keys: &[String]) {
        let mut seen = vec![false; keys.len()];
        self.rows.retain(|row| {
            let Some(idx) = key_index(row, column, keys) else {
                return true;
            };
            if seen[idx] {
                return false;
            }
            seen[idx] = true;
            true
        });

        for (idx, key) in keys.iter().enumerate() {
            if seen[idx] {
                continue;
            }
            let mut row: Row = self.columns.iter().map(Column::zero).collect();
            row[column] = Value::Text(key.clone());
            self.rows.push(row);
        }
    }

    pub fn sort(&mut self, sort: &Sort) {
        match sort {
            Sort::Retrieval => {}
            Sort::Ascending(column) => {
                let column = *column;
                self.rows.sort_by(|a, b| compare_asc(&a[column], &b[column]));
            }
            Sort::Descending(column) => {
                let column = *column;
                self.rows
                    .sort_by(|a, b| compare_desc(&a[column], &b[column]));
            }
            Sort::Natural { column, keys } => {
                let column = *column;
                self.rows.sort_by_key(|row| {
                    key_index(row, column, keys).unwrap_or(keys.len())
                });
            }
        }
    }

    /// Rounds every metric column to two decimals; a missing metric is zero.
    pub fn round_metrics(&mut self) {
        for (idx, col) in self.columns.iter().enumerate() {
            if col.kind != ColumnKind::Metric {
                continue;
            }
            for row in &mut self.rows {
                let v = row[idx].as_f64().unwrap_or(0.0);
                row[idx] = Value::Float(round2(v));
            }
        }
    }
}

/// Row order requested by the caller; the database's order is never trusted.
#[derive(Clone, Debug, PartialEq)]
pub enum Sort {
    /// Keep the order rows were retrieved in.
    Retrieval,
    /// Lowest number or alphabetically first text first; nulls last.
    Ascending(usize),
    /// Highest value first; ties keep their retrieval order.
    Descending(usize),
    /// Rows keyed by `keys[0]` first, then `keys[1]`, ...; other rows last.
    Natural { column: usize, keys: Vec<String> },
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn key_index(row: &Row, column: usize, keys: &[String]) -> Option<usize> {
    let value = row[column].as_str()?;
    keys.iter().position(|k| k == value)
}

fn compare_asc(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn compare_desc(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A normalized result set plus what the presentation layer needs to
/// label it.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayTable {
    pub title: String,
    /// Active request options as (label, value), restated above the table.
    pub filters: Vec<(String, String)>,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl DisplayTable {
    /// Rounds, orders and bounds `set`. `limit` is re-applied after sorting
    /// so synthesized rows cannot exceed it.
    pub fn build(
        title: impl Into<String>,
        filters: Vec<(String, String)>,
        mut set: ResultSet,
        sort: &Sort,
        limit: Option<usize>,
    ) -> Self {
        set.round_metrics();
        set.sort(sort);
        if let Some(limit) = limit {
            set.rows.truncate(limit);
        }
        Self {
            title: title.into(),
            filters,
            columns: set.columns,
            rows: set.rows,
        }
    }

    /// Empty tables are reported as no data instead of being rendered.
    pub fn non_empty(self, guidance: Guidance, format: Format) -> Result<Self, ReportError> {
        if self.rows.is_empty() {
            return Err(ReportError::NoData { guidance, format });
        }
        Ok(self)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.label.as_str())
    }
}
