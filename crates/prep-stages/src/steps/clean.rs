use prep_core::{StepConfig, StepMetadata, TabularDataset, Value};
use tracing::info;

use super::StepResult;

/// Trim and lowercase act on string cells only and are toggled separately.
pub fn clean_data(ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
    let trim: bool = cfg.get_or("trim_strings", false)?;
    let lowercase: bool = cfg.get_or("lowercase", false)?;

    let mut changed = 0usize;
    if trim || lowercase {
        for column in ds.columns_mut() {
            for cell in column.values.iter_mut() {
                let Value::Str(s) = cell else { continue };
                let mut cleaned = if trim { s.trim().to_string() } else { s.clone() };
                if lowercase {
                    cleaned = cleaned.to_lowercase();
                }
                if cleaned != *s {
                    *s = cleaned;
                    changed += 1;
                }
            }
        }
    }

    info!(trim, lowercase, changed, "cleaned string cells");
    let mut meta = StepMetadata::new("clean_data");
    if trim {
        meta = meta.with_fact("trim_strings", true);
    }
    if lowercase {
        meta = meta.with_fact("lowercase", true);
    }
    Ok(meta.with_fact("cells_changed", changed))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trim_and_lowercase() {
        let mut ds = dataset(vec![
            ("name", strs(&["  Ada ", "bob", "CAROL"])),
            ("n", ints(&[1, 2, 3])),
        ]);
        let cfg = StepConfig::new("cleaning", json!({"trim_strings": true, "lowercase": true}));
        let meta = clean_data(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column("name").unwrap().values, strs(&["ada", "bob", "carol"]));
        assert_eq!(ds.column("n").unwrap().values, ints(&[1, 2, 3]));
        assert_eq!(meta.fact("cells_changed"), Some(&json!(2)));
    }

    #[test]
    fn test_trim_only() {
        let mut ds = dataset(vec![("name", strs(&[" Ada "]))]);
        let cfg = StepConfig::new("cleaning", json!({"trim_strings": true}));
        let meta = clean_data(&mut ds, &cfg).unwrap();
        assert_eq!(ds.column("name").unwrap().values, strs(&["Ada"]));
        assert!(meta.fact("lowercase").is_none());
    }
}
