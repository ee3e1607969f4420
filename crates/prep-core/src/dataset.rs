//! Dataset model: tabular columns and raster frames
//!
//! A [`TabularDataset`] is an ordered list of named columns whose lengths
//! always agree. A [`Raster`] is a fixed-size pixel grid holding intensities
//! in `[0, 1]`; conversion to 8-bit happens only at the save boundary.
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::PrepError;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tokens read as missing from text sources.
const NA_TOKENS: &[&str] = &["", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None"];

/// A typed scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Infer a typed value from a raw text cell.
    pub fn infer(raw: &str) -> Self {
        let s = raw.trim();
        if NA_TOKENS.contains(&s) {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
        match s {
            "true" | "True" | "TRUE" => Value::Bool(true),
            "false" | "False" | "FALSE" => Value::Bool(false),
            _ => Value::Str(raw.to_string()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            other => Value::Str(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.format(DATETIME_FORMAT).to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by the scaling and outlier steps.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Text rendering used for CSV output and for label/one-hot categories.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.1}", f),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }

    /// Type-tagged key; two cells share a key only if they are identical.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.type_name(), self.render())
    }
}

/// Dominant type of a column, ignoring missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Empty,
    Bool,
    Int,
    Float,
    Numeric,
    Str,
    DateTime,
    Mixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// True when no cell holds a value, including a column with no rows.
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    pub fn kind(&self) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for value in self.values.iter().filter(|v| !v.is_null()) {
            let cell = match value {
                Value::Bool(_) => ColumnKind::Bool,
                Value::Int(_) => ColumnKind::Int,
                Value::Float(_) => ColumnKind::Float,
                Value::Str(_) => ColumnKind::Str,
                Value::DateTime(_) => ColumnKind::DateTime,
                Value::Null => continue,
            };
            kind = match (kind, cell) {
                (ColumnKind::Empty, c) => c,
                (k, c) if k == c => k,
                (ColumnKind::Int | ColumnKind::Float | ColumnKind::Numeric, ColumnKind::Int | ColumnKind::Float) => {
                    ColumnKind::Numeric
                }
                _ => return ColumnKind::Mixed,
            };
        }
        kind
    }

    /// Numeric cells by row; `None` marks a missing cell. Returns `None`
    /// overall when any present cell is not a number.
    pub fn numeric_values(&self) -> Option<Vec<Option<f64>>> {
        self.values
            .iter()
            .map(|v| match v {
                Value::Null => Some(None),
                other => other.as_f64().map(Some),
            })
            .collect()
    }

    /// Promote integers to floats when a column mixes both.
    pub fn unify_numeric(&mut self) {
        if self.kind() == ColumnKind::Numeric {
            for value in &mut self.values {
                if let Value::Int(i) = value {
                    *value = Value::Float(*i as f64);
                }
            }
        }
    }
}

/// Ordered columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularDataset {
    columns: Vec<Column>,
    rows: usize,
}

impl TabularDataset {
    pub fn new(columns: Vec<Column>) -> Result<Self, PrepError> {
        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
            return Err(PrepError::Dataset(format!(
                "column '{}' has {} rows, expected {}",
                bad.name,
                bad.values.len(),
                rows
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build from JSON records. Column order is first-seen key order and
    /// keys absent from a record become missing cells.
    pub fn from_records(records: &[serde_json::Map<String, serde_json::Value>]) -> Self {
        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
            }
        }
        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(&name).map(Value::from_json).unwrap_or(Value::Null))
                    .collect();
                let mut column = Column::new(name, values);
                column.unify_numeric();
                column
            })
            .collect();
        Self {
            columns,
            rows: records.len(),
        }
    }

    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        (0..self.rows)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[row].to_json()))
                    .collect()
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        vec![self.rows, self.columns.len()]
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.position(name)?;
        Some(self.columns.remove(idx))
    }

    pub fn insert_column(&mut self, index: usize, column: Column) -> Result<(), PrepError> {
        self.check_length(&column)?;
        if self.columns.is_empty() {
            self.rows = column.values.len();
        }
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
        Ok(())
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), PrepError> {
        let end = self.columns.len();
        self.insert_column(end, column)
    }

    /// Keep only the named columns, in the given order. Unknown names are
    /// returned so callers can report them.
    pub fn project(&mut self, names: &[String]) -> Vec<String> {
        let mut missing = Vec::new();
        let mut kept = Vec::with_capacity(names.len());
        for name in names {
            match self.remove_column(name) {
                Some(column) => kept.push(column),
                None => missing.push(name.clone()),
            }
        }
        self.columns = kept;
        missing
    }

    /// Drop every row whose mask entry is `false`.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            let mut idx = 0;
            column.values.retain(|_| {
                let k = keep.get(idx).copied().unwrap_or(true);
                idx += 1;
                k
            });
        }
        self.rows = (0..self.rows)
            .filter(|i| keep.get(*i).copied().unwrap_or(true))
            .count();
    }

    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    pub fn null_count(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }

    fn check_length(&self, column: &Column) -> Result<(), PrepError> {
        if !self.columns.is_empty() && column.values.len() != self.rows {
            return Err(PrepError::Dataset(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.values.len(),
                self.rows
            )));
        }
        Ok(())
    }
}

/// Channel layout of a raster buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channels {
    Gray,
    Rgb,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb => 3,
        }
    }
}

/// Pixel grid with intensities normalized to `[0, 1]`, row-major and
/// channel-interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<f32>,
}

impl Raster {
    pub fn new(width: u32, height: u32, channels: Channels, data: Vec<f32>) -> Result<Self, PrepError> {
        let expected = width as usize * height as usize * channels.count();
        if data.len() != expected {
            return Err(PrepError::Dataset(format!(
                "raster {}x{}x{} needs {} samples, got {}",
                width,
                height,
                channels.count(),
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Scale 8-bit samples into `[0, 1]`.
    pub fn from_u8(width: u32, height: u32, channels: Channels, bytes: &[u8]) -> Result<Self, PrepError> {
        let data = bytes.iter().map(|b| f32::from(*b) / 255.0).collect();
        Self::new(width, height, channels, data)
    }

    /// Rescale to `[0, 255]` for saving.
    pub fn to_u8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn sample(&self, x: u32, y: u32, channel: usize) -> f32 {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels.count() + channel;
        self.data[idx]
    }
}

/// One decoded image or video frame and the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub source: String,
    pub raster: Raster,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_cells() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("NaN"), Value::Null);
        assert_eq!(Value::infer("42"), Value::Int(42));
        assert_eq!(Value::infer("4.5"), Value::Float(4.5));
        assert_eq!(Value::infer("True"), Value::Bool(true));
        assert_eq!(Value::infer(" hello "), Value::Str(" hello ".to_string()));
    }

    #[test]
    fn test_from_records_keeps_first_seen_order() {
        let records: Vec<serde_json::Map<String, serde_json::Value>> = vec![
            json!({"b": 1, "a": null}).as_object().unwrap().clone(),
            json!({"a": 2.5, "c": "x"}).as_object().unwrap().clone(),
        ];
        let ds = TabularDataset::from_records(&records);
        assert_eq!(ds.column_names(), vec!["b", "a", "c"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column("b").unwrap().values[1], Value::Null);
        assert_eq!(ds.column("a").unwrap().values[1], Value::Float(2.5));
        assert_eq!(ds.null_count(), 3);
    }

    #[test]
    fn test_mixed_ints_promote_to_float() {
        let mut column = Column::new("x", vec![Value::Int(1), Value::Float(2.5), Value::Null]);
        column.unify_numeric();
        assert_eq!(column.values[0], Value::Float(1.0));
        assert_eq!(column.kind(), ColumnKind::Float);
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let result = TabularDataset::new(vec![
            Column::new("a", vec![Value::Int(1)]),
            Column::new("b", vec![]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_all_null_includes_empty_column() {
        assert!(Column::new("a", vec![]).is_all_null());
        assert!(Column::new("b", vec![Value::Null, Value::Null]).is_all_null());
        assert!(!Column::new("c", vec![Value::Null, Value::Int(0)]).is_all_null());
    }

    #[test]
    fn test_retain_rows_and_project() {
        let mut ds = TabularDataset::new(vec![
            Column::new("a", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            Column::new("b", vec![Value::Int(4), Value::Int(5), Value::Int(6)]),
        ])
        .unwrap();
        ds.retain_rows(&[true, false, true]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column("b").unwrap().values, vec![Value::Int(4), Value::Int(6)]);

        let missing = ds.project(&["b".to_string(), "zzz".to_string()]);
        assert_eq!(missing, vec!["zzz"]);
        assert_eq!(ds.column_names(), vec!["b"]);
    }

    #[test]
    fn test_raster_round_trips_u8() {
        let raster = Raster::from_u8(2, 1, Channels::Gray, &[0, 255]).unwrap();
        assert_eq!(raster.data(), &[0.0, 1.0]);
        assert_eq!(raster.to_u8(), vec![0, 255]);
        assert!(Raster::new(2, 2, Channels::Rgb, vec![0.0; 3]).is_err());
    }
}
