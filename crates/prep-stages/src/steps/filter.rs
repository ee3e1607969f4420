use prep_core::{StepConfig, StepMetadata, TabularDataset};
use tracing::{info, warn};

use super::{string_list, StepResult};

/// A non-empty `keep` list wins over `drop`.
pub fn filter_columns(ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
    let keep = string_list(cfg, "keep")?;
    let drop = string_list(cfg, "drop")?;
    let meta = StepMetadata::new("filter_columns");

    if !keep.is_empty() {
        let missing = ds.project(&keep);
        let warnings: Vec<String> = missing
            .iter()
            .map(|name| format!("column '{}' not found, not kept", name))
            .collect();
        for w in &warnings {
            warn!("{}", w);
        }
        let kept = ds.column_names();
        info!(columns = ?kept, "kept columns");
        return Ok(meta.with_fact("columns_kept", kept).with_warnings(warnings));
    }

    if !drop.is_empty() {
        let dropped: Vec<String> = drop
            .iter()
            .filter(|name| ds.remove_column(name).is_some())
            .cloned()
            .collect();
        info!(columns = ?dropped, "dropped columns");
        return Ok(meta.with_fact("columns_dropped", dropped));
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use serde_json::json;

    fn sample() -> TabularDataset {
        dataset(vec![("a", ints(&[1])), ("b", ints(&[2])), ("c", ints(&[3]))])
    }

    #[test]
    fn test_keep_projects_in_config_order() {
        let mut ds = sample();
        let cfg = StepConfig::new("column_filtering", json!({"keep": ["c", "a"], "drop": ["c"]}));
        filter_columns(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column_names(), vec!["c", "a"]);
    }

    #[test]
    fn test_drop_ignores_unknown_names() {
        let mut ds = sample();
        let cfg = StepConfig::new("column_filtering", json!({"drop": ["b", "ghost"]}));
        let meta = filter_columns(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column_names(), vec!["a", "c"]);
        assert_eq!(meta.fact("columns_dropped"), Some(&json!(["b"])));
    }

    #[test]
    fn test_missing_keep_name_warns() {
        let mut ds = sample();
        let cfg = StepConfig::new("column_filtering", json!({"keep": ["a", "ghost"]}));
        let meta = filter_columns(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column_names(), vec!["a"]);
        assert_eq!(meta.warnings().len(), 1);
    }
}
