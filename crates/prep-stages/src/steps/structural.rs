use std::collections::HashSet;

use prep_core::{Column, StepConfig, StepError, StepMetadata, TabularDataset, Value};
use serde_json::{Map, Value as Json};
use tracing::info;

use super::StepResult;

const ROW_ID: &str = "row_id";

pub fn remove_empty_columns(ds: &mut TabularDataset) -> StepResult {
    let empty: Vec<String> = ds
        .columns()
        .iter()
        .filter(|c| c.is_all_null())
        .map(|c| c.name.clone())
        .collect();
    for name in &empty {
        ds.remove_column(name);
    }
    if !empty.is_empty() {
        info!(columns = ?empty, "removed empty columns");
    }
    Ok(StepMetadata::new("remove_empty_columns").with_fact("empty_columns_removed", empty))
}

/// 1-based sequential id as the new first column.
pub fn add_row_id(ds: &mut TabularDataset) -> StepResult {
    if ds.position(ROW_ID).is_some() {
        return Err(StepError::ExecutionFailed(format!(
            "column '{}' already exists",
            ROW_ID
        )));
    }
    let ids = (1..=ds.row_count() as i64).map(Value::Int).collect();
    ds.insert_column(0, Column::new(ROW_ID, ids))
        .map_err(|e| StepError::ExecutionFailed(e.to_string()))?;
    info!("added row_id column");
    Ok(StepMetadata::new("add_row_id").with_fact("row_id_added", true))
}

/// Exact duplicates only; the first occurrence survives.
pub fn drop_duplicates(ds: &mut TabularDataset) -> StepResult {
    let mut seen = HashSet::new();
    let keep: Vec<bool> = (0..ds.row_count())
        .map(|row| {
            let key: Vec<String> = ds.row(row).iter().map(|v| v.identity_key()).collect();
            seen.insert(key)
        })
        .collect();
    let before = ds.row_count();
    ds.retain_rows(&keep);
    let removed = before - ds.row_count();
    info!(removed, "removed duplicate rows");
    Ok(StepMetadata::new("drop_duplicates").with_fact("duplicates_removed", removed))
}

pub fn rename_columns(ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
    let mapping: Map<String, Json> = cfg.value_as()?;
    let mut renames = Vec::with_capacity(mapping.len());
    for (old, new) in &mapping {
        let new = new.as_str().ok_or_else(|| StepError::InvalidParameter {
            key: old.clone(),
            message: format!("new name must be a string, got {}", new),
        })?;
        renames.push((old.clone(), new.to_string()));
    }

    let mut final_names = ds.column_names();
    let mut applied = Map::new();
    let mut warnings = Vec::new();
    for (old, new) in &renames {
        match final_names.iter().position(|n| n == old) {
            Some(idx) => {
                final_names[idx] = new.clone();
                applied.insert(old.clone(), Json::String(new.clone()));
            }
            None => warnings.push(format!("column '{}' not found, not renamed", old)),
        }
    }
    let unique: HashSet<&String> = final_names.iter().collect();
    if unique.len() != final_names.len() {
        return Err(StepError::ExecutionFailed(
            "renaming would produce duplicate column names".to_string(),
        ));
    }

    for (column, name) in ds.columns_mut().iter_mut().zip(final_names) {
        column.name = name;
    }
    info!(renamed = applied.len(), "renamed columns");
    Ok(StepMetadata::new("rename_columns")
        .with_fact("columns_renamed", applied)
        .with_warnings(warnings))
}
