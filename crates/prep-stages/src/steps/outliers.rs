use prep_core::{StepConfig, StepMetadata, TabularDataset};
use tracing::{debug, info, warn};

use super::normalize::mean_std;
use super::{string_list, StepResult};

const IQR_THRESHOLD: f64 = 1.5;
const ZSCORE_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutlierRule {
    Iqr,
    ZScore,
}

/// Linear-interpolation quantile over sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Columns are evaluated in configured order and exclusion is cumulative:
/// each column's statistics come from the rows that survived the previous
/// columns. Missing and non-numeric cells never exclude a row.
pub fn remove_outliers(ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
    let method: String = cfg.get_or("method", "iqr".to_string())?;
    let columns = string_list(cfg, "columns")?;
    let meta = StepMetadata::new("remove_outliers");

    let rule = match method.to_lowercase().as_str() {
        "iqr" => OutlierRule::Iqr,
        "zscore" | "z-score" => OutlierRule::ZScore,
        other => {
            let msg = format!("unknown outlier removal method '{}'; skipping", other);
            warn!("{}", msg);
            return Ok(meta.with_fact("outliers_removed", 0).with_warning(msg));
        }
    };
    let default = match rule {
        OutlierRule::Iqr => IQR_THRESHOLD,
        OutlierRule::ZScore => ZSCORE_THRESHOLD,
    };
    let threshold: f64 = cfg.get_or("threshold", default)?;

    let before = ds.row_count();
    let mut alive = vec![true; before];
    let mut warnings = Vec::new();

    for name in &columns {
        let Some(column) = ds.column(name) else {
            warnings.push(format!("column '{}' not found", name));
            continue;
        };
        let cells: Vec<Option<f64>> = column.values.iter().map(|v| v.as_f64()).collect();
        let surviving: Vec<(usize, f64)> = cells
            .iter()
            .enumerate()
            .filter(|(row, _)| alive[*row])
            .filter_map(|(row, v)| v.map(|x| (row, x)))
            .collect();
        if surviving.is_empty() {
            warnings.push(format!("column '{}' has no numeric values", name));
            continue;
        }
        let values: Vec<f64> = surviving.iter().map(|(_, x)| *x).collect();

        let outside: Box<dyn Fn(f64) -> bool> = match rule {
            OutlierRule::Iqr => {
                let mut sorted = values.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let q1 = quantile(&sorted, 0.25);
                let q3 = quantile(&sorted, 0.75);
                let iqr = q3 - q1;
                let (lower, upper) = (q1 - threshold * iqr, q3 + threshold * iqr);
                Box::new(move |x: f64| x < lower || x > upper)
            }
            OutlierRule::ZScore => {
                let (mean, std) = mean_std(&values);
                Box::new(move |x: f64| std > 0.0 && ((x - mean) / std).abs() >= threshold)
            }
        };

        let mut excluded = 0;
        for (row, x) in surviving {
            if outside(x) {
                alive[row] = false;
                excluded += 1;
            }
        }
        debug!(column = %name, excluded, "outlier pass");
    }

    ds.retain_rows(&alive);
    let removed = before - ds.row_count();
    info!(method = %method, threshold, removed, "removed outliers");
    Ok(meta
        .with_fact("outliers_removed", removed)
        .with_fact("outlier_method", method.to_lowercase())
        .with_fact("threshold", threshold)
        .with_warnings(warnings))
}
