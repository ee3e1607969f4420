use chrono::{NaiveDate, NaiveDateTime};
use prep_core::{StepConfig, StepError, StepMetadata, TabularDataset, Value};
use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::{debug, info, warn};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeTarget {
    Int,
    Float,
    Str,
    Bool,
    DateTime,
}

impl DtypeTarget {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "int" | "integer" | "int64" | "int32" => Some(DtypeTarget::Int),
            "float" | "float64" | "float32" | "double" => Some(DtypeTarget::Float),
            "str" | "string" | "object" => Some(DtypeTarget::Str),
            "bool" | "boolean" => Some(DtypeTarget::Bool),
            "datetime" | "datetime64" | "timestamp" => Some(DtypeTarget::DateTime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DtypeTarget::Int => "int",
            DtypeTarget::Float => "float",
            DtypeTarget::Str => "str",
            DtypeTarget::Bool => "bool",
            DtypeTarget::DateTime => "datetime",
        }
    }
}

/// Why one column could not be converted. Never escapes the step: each
/// becomes a warning and the column keeps its original values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("could not convert column '{column}' to {target}: row {row}: {reason}")]
    Cell {
        column: String,
        target: &'static str,
        row: usize,
        reason: String,
    },

    #[error("unsupported target type '{target}' for column '{column}'")]
    UnsupportedTarget { column: String, target: String },
}

fn convert_cell(value: &Value, target: DtypeTarget) -> Result<Value, String> {
    use DtypeTarget::*;
    match (target, value) {
        (Int, Value::Null) => Err("missing value cannot be an integer".to_string()),
        (_, Value::Null) => Ok(Value::Null),

        (Int, Value::Int(i)) => Ok(Value::Int(*i)),
        (Int, Value::Float(f)) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        (Int, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (Int, Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| format!("'{}': {}", s, e)),

        (Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
        (Float, Value::Float(f)) => Ok(Value::Float(*f)),
        (Float, Value::Bool(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        (Float, Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("'{}': {}", s, e)),

        (Str, v) => Ok(Value::Str(v.render())),

        (Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (Bool, Value::Int(i)) => Ok(Value::Bool(*i != 0)),
        (Bool, Value::Float(f)) => Ok(Value::Bool(*f != 0.0)),
        (Bool, Value::Str(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "n" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", s)),
        },

        (DateTime, Value::DateTime(dt)) => Ok(Value::DateTime(*dt)),
        (DateTime, Value::Int(secs)) => chrono::DateTime::from_timestamp(*secs, 0)
            .map(|dt| Value::DateTime(dt.naive_utc()))
            .ok_or_else(|| format!("timestamp {} out of range", secs)),
        (DateTime, Value::Str(s)) => parse_datetime(s.trim())
            .map(Value::DateTime)
            .ok_or_else(|| format!("'{}' is not a recognized date/time", s)),

        (_, other) => Err(format!("{} value cannot become {}", other.type_name(), target.name())),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn convert_column(column: &str, values: &[Value], target: DtypeTarget) -> Result<Vec<Value>, ConversionError> {
    values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            convert_cell(v, target).map_err(|reason| ConversionError::Cell {
                column: column.to_string(),
                target: target.name(),
                row,
                reason,
            })
        })
        .collect()
}

/// Each configured column converts independently. Failures are collected
/// per column and reported as warnings; other columns still convert.
pub fn convert_dtypes(ds: &mut TabularDataset, cfg: &StepConfig) -> Result<StepMetadata, StepError> {
    let requested: Map<String, Json> = cfg.value_as()?;

    let mut outcomes: Vec<(String, Result<Vec<Value>, ConversionError>)> = Vec::new();
    for (name, target) in &requested {
        let Some(column) = ds.column(name) else {
            debug!(column = %name, "dtype conversion skipped, column not present");
            continue;
        };
        let target_name = target.as_str().unwrap_or_default();
        let result = match DtypeTarget::parse(target_name) {
            Some(target) => convert_column(name, &column.values, target),
            None => Err(ConversionError::UnsupportedTarget {
                column: name.clone(),
                target: target.as_str().map(str::to_string).unwrap_or_else(|| target.to_string()),
            }),
        };
        outcomes.push((name.clone(), result));
    }

    let mut converted = Map::new();
    let mut warnings = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(values) => {
                if let Some(column) = ds.column_mut(&name) {
                    column.values = values;
                }
                if let Some(target) = requested.get(&name) {
                    converted.insert(name, target.clone());
                }
            }
            Err(err) => {
                warn!("{}", err);
                warnings.push(err.to_string());
            }
        }
    }

    info!(converted = converted.len(), failed = warnings.len(), "converted dtypes");
    Ok(StepMetadata::new("convert_dtypes")
        .with_fact("dtype_conversions", converted)
        .with_warnings(warnings))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_is_per_column() {
        let mut ds = dataset(vec![
            ("price", strs(&["1.5", "2"])),
            ("qty", strs(&["3", "x"])),
            ("flag", ints(&[0, 1])),
        ]);
        let cfg = StepConfig::new(
            "dtype_conversion",
            json!({"price": "float", "qty": "int", "flag": "bool"}),
        );
        let meta = convert_dtypes(&mut ds, &cfg).unwrap();

        assert_eq!(ds.column("price").unwrap().values, vec![Value::Float(1.5), Value::Float(2.0)]);
        assert_eq!(ds.column("qty").unwrap().values, strs(&["3", "x"]));
        assert_eq!(ds.column("flag").unwrap().values, vec![Value::Bool(false), Value::Bool(true)]);
        assert_eq!(meta.fact("dtype_conversions"), Some(&json!({"price": "float", "flag": "bool"})));
        assert_eq!(meta.warnings().len(), 1);
        assert!(meta.warnings()[0].contains("qty"));
    }

    #[test]
    fn test_missing_cell_blocks_int() {
        let values = vec![Value::Int(1), Value::Null];
        assert!(convert_column("a", &values, DtypeTarget::Int).is_err());
        assert_eq!(
            convert_column("a", &values, DtypeTarget::Float).unwrap(),
            vec![Value::Float(1.0), Value::Null]
        );
    }

    #[test]
    fn test_datetime_and_str() {
        let values = strs(&["2024-05-01", "2024-05-01 10:30:00"]);
        let out = convert_column("d", &values, DtypeTarget::DateTime).unwrap();
        assert_eq!(out[1].render(), "2024-05-01 10:30:00");
        assert_eq!(
            convert_column("n", &[Value::Float(2.0)], DtypeTarget::Str).unwrap(),
            strs(&["2.0"])
        );
    }

    #[test]
    fn test_unsupported_target_is_warning() {
        let mut ds = dataset(vec![("a", ints(&[1]))]);
        let cfg = StepConfig::new("dtype_conversion", json!({"a": "complex128"}));
        let meta = convert_dtypes(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column("a").unwrap().values, ints(&[1]));
        assert!(meta.warnings()[0].contains("complex128"));
    }
}
