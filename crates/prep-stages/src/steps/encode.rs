use std::collections::BTreeSet;

use prep_core::{Column, StepConfig, StepError, StepMetadata, TabularDataset, Value};
use serde_json::{Map, Value as Json};
use tracing::{info, warn};

use super::{string_list, StepResult};

/// Label codes follow sorted order of the rendered values so the same
/// input always maps to the same integers.
pub fn encode_categorical(ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
    let method: String = cfg.get_or("method", "onehot".to_string())?;
    let requested = string_list(cfg, "columns")?;
    let meta = StepMetadata::new("encode_categorical");

    let existing: Vec<String> = requested
        .iter()
        .filter(|c| ds.position(c).is_some())
        .cloned()
        .collect();

    match method.to_lowercase().as_str() {
        "label" => {
            let mut mappings = Map::new();
            for name in &existing {
                if let Some(column) = ds.column_mut(name) {
                    mappings.insert(name.clone(), Json::Object(label_encode(column)));
                }
            }
            info!(columns = ?existing, "label encoded columns");
            Ok(meta
                .with_fact("encoded_columns", existing)
                .with_fact("encoding_method", "label")
                .with_fact("label_mappings", mappings))
        }
        "onehot" | "one_hot" => {
            let mut new_columns = Vec::new();
            let mut planned = Vec::new();
            for name in &existing {
                if let Some(column) = ds.column(name) {
                    let indicators = one_hot(column);
                    new_columns.extend(indicators.iter().map(|c| c.name.clone()));
                    planned.push((name.clone(), indicators));
                }
            }
            let taken: BTreeSet<String> = ds
                .column_names()
                .into_iter()
                .filter(|n| !existing.contains(n))
                .collect();
            let mut fresh = BTreeSet::new();
            if let Some(clash) = new_columns
                .iter()
                .find(|n| taken.contains(*n) || !fresh.insert(n.as_str()))
            {
                return Err(StepError::ExecutionFailed(format!(
                    "one-hot column '{}' already exists",
                    clash
                )));
            }

            for (name, indicators) in planned {
                ds.remove_column(&name);
                for column in indicators {
                    ds.push_column(column)
                        .map_err(|e| StepError::ExecutionFailed(e.to_string()))?;
                }
            }
            info!(columns = ?existing, created = new_columns.len(), "one-hot encoded columns");
            Ok(meta
                .with_fact("encoded_columns", existing)
                .with_fact("encoding_method", "onehot")
                .with_fact("new_columns", new_columns))
        }
        other => {
            let msg = format!("unknown encoding method '{}'; skipping", other);
            warn!("{}", msg);
            Ok(meta.with_warning(msg))
        }
    }
}

fn categories(column: &Column) -> BTreeSet<String> {
    column
        .values
        .iter()
        .filter(|v| !v.is_null())
        .map(Value::render)
        .collect()
}

fn label_encode(column: &mut Column) -> Map<String, Json> {
    let mapping: Map<String, Json> = categories(column)
        .into_iter()
        .enumerate()
        .map(|(code, value)| (value, Json::from(code)))
        .collect();
    for cell in column.values.iter_mut().filter(|v| !v.is_null()) {
        if let Some(code) = mapping.get(&cell.render()).and_then(Json::as_i64) {
            *cell = Value::Int(code);
        }
    }
    mapping
}

/// One boolean column per distinct value; missing cells are false everywhere.
fn one_hot(column: &Column) -> Vec<Column> {
    categories(column)
        .into_iter()
        .map(|category| {
            let values = column
                .values
                .iter()
                .map(|v| Value::Bool(!v.is_null() && v.render() == category))
                .collect();
            Column::new(format!("{}_{}", column.name, category), values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_encoding_sorted() {
        let mut ds = dataset(vec![(
            "color",
            vec![
                Value::Str("red".into()),
                Value::Str("blue".into()),
                Value::Null,
                Value::Str("red".into()),
            ],
        )]);
        let cfg = StepConfig::new("categorical_encoding", json!({"method": "label", "columns": ["color"]}));
        let meta = encode_categorical(&mut ds, &cfg).unwrap();
        assert_eq!(
            ds.column("color").unwrap().values,
            vec![Value::Int(1), Value::Int(0), Value::Null, Value::Int(1)]
        );
        assert_eq!(meta.fact("label_mappings"), Some(&json!({"color": {"blue": 0, "red": 1}})));
    }

    #[test]
    fn test_one_hot_creates_k_columns() {
        let mut ds = dataset(vec![
            ("id", ints(&[1, 2, 3, 4])),
            ("size", strs(&["s", "m", "l", "m"])),
        ]);
        let cfg = StepConfig::new("categorical_encoding", json!({"method": "onehot", "columns": ["size", "nope"]}));
        let meta = encode_categorical(&mut ds, &cfg).unwrap();

        assert_eq!(ds.column_names(), vec!["id", "size_l", "size_m", "size_s"]);
        assert_eq!(
            ds.column("size_m").unwrap().values,
            vec![Value::Bool(false), Value::Bool(true), Value::Bool(false), Value::Bool(true)]
        );
        assert_eq!(meta.fact("encoded_columns"), Some(&json!(["size"])));
    }

    #[test]
    fn test_one_hot_rejects_colliding_indicator_names() {
        let mut ds = dataset(vec![("a", strs(&["b_c"])), ("a_b", strs(&["c"]))]);
        let before = ds.clone();
        let cfg = StepConfig::new("categorical_encoding", json!({"method": "onehot", "columns": ["a", "a_b"]}));
        let err = encode_categorical(&mut ds, &cfg).unwrap_err();
        assert!(matches!(err, StepError::ExecutionFailed(ref msg) if msg.contains("a_b_c")));
        assert_eq!(ds, before);
    }

    #[test]
    fn test_default_method_is_onehot() {
        let mut ds = dataset(vec![("flag", strs(&["y", "n"]))]);
        let cfg = StepConfig::new("categorical_encoding", json!({"columns": ["flag"]}));
        encode_categorical(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column_count(), 2);
        assert!(ds.column("flag").is_none());
    }

    #[test]
    fn test_unknown_method_is_noop() {
        let mut ds = dataset(vec![("flag", strs(&["y", "n"]))]);
        let before = ds.clone();
        let cfg = StepConfig::new("categorical_encoding", json!({"method": "target", "columns": ["flag"]}));
        let meta = encode_categorical(&mut ds, &cfg).unwrap();
        assert_eq!(ds, before);
        assert_eq!(meta.warnings().len(), 1);
    }
}
