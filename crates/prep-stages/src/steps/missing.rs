use prep_core::{ColumnKind, StepConfig, StepMetadata, TabularDataset, Value};
use serde_json::{Map, Value as Json};
use tracing::{debug, info};

use super::StepResult;

/// Global fill first, then per-column overrides. The reported count is the
/// drop in missing cells, so a cell covered by both is counted once.
pub fn handle_missing_values(ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
    let global: Option<Json> = cfg.get("global_fill")?;
    let per_column: Map<String, Json> = cfg.get_or("columns", Map::new())?;

    let before = ds.null_count();
    let mut warnings = Vec::new();

    for name in per_column.keys() {
        if ds.position(name).is_none() {
            warnings.push(format!("column '{}' not found, no fill applied", name));
        }
    }

    for column in ds.columns_mut() {
        let fill = per_column.get(&column.name).or(global.as_ref());
        let Some(fill) = fill.map(Value::from_json).filter(|v| !v.is_null()) else {
            continue;
        };
        let fill = match (column.kind(), fill) {
            (ColumnKind::Float | ColumnKind::Numeric, Value::Int(i)) => Value::Float(i as f64),
            (_, fill) => fill,
        };
        for cell in column.values.iter_mut().filter(|v| v.is_null()) {
            *cell = fill.clone();
        }
        debug!(column = %column.name, "filled missing values");
    }

    let filled = before - ds.null_count();
    info!(filled, "handled missing values");
    Ok(StepMetadata::new("handle_missing_values")
        .with_fact("missing_values_filled", filled)
        .with_warnings(warnings))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_global_fill() {
        let mut ds = dataset(vec![
            ("a", ints(&[1, 2])),
            ("b", vec![Value::Null, Value::Int(5)]),
        ]);
        let cfg = StepConfig::new("missing_values", json!({"global_fill": 0}));
        let meta = handle_missing_values(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column("b").unwrap().values, ints(&[0, 5]));
        assert_eq!(meta.fact("missing_values_filled"), Some(&json!(1)));
    }

    #[test]
    fn test_per_column_wins_and_is_not_double_counted() {
        let mut ds = dataset(vec![
            ("a", vec![Value::Null, Value::Float(2.5)]),
            ("b", vec![Value::Null, Value::Null]),
        ]);
        let cfg = StepConfig::new(
            "missing_values",
            json!({"global_fill": 0, "columns": {"b": "unknown", "ghost": 1}}),
        );
        let meta = handle_missing_values(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column("a").unwrap().values, vec![Value::Float(0.0), Value::Float(2.5)]);
        assert_eq!(ds.column("b").unwrap().values, strs(&["unknown", "unknown"]));
        assert_eq!(meta.fact("missing_values_filled"), Some(&json!(3)));
        assert_eq!(meta.warnings().len(), 1);
    }

    #[test]
    fn test_no_fill_configured() {
        let mut ds = dataset(vec![("a", vec![Value::Null])]);
        let cfg = StepConfig::new("missing_values", json!({}));
        let meta = handle_missing_values(&mut ds, &cfg).unwrap();
        assert_eq!(meta.fact("missing_values_filled"), Some(&json!(0)));
        assert_eq!(ds.null_count(), 1);
    }
}
