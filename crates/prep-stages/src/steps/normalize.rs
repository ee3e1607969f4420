use prep_core::{StepConfig, StepMetadata, TabularDataset, Value};
use serde_json::{json, Map};
use tracing::{info, warn};

use super::{string_list, StepResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMethod {
    MinMax,
    Standard,
}

impl ScaleMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "minmax" | "min_max" => Some(ScaleMethod::MinMax),
            "standard" | "zscore" | "z-score" => Some(ScaleMethod::Standard),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScaleMethod::MinMax => "minmax",
            ScaleMethod::Standard => "standard",
        }
    }
}

/// Population mean and standard deviation of the present values.
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn normalize_columns(ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
    let method_name: String = cfg.get_or("method", "minmax".to_string())?;
    let columns = string_list(cfg, "columns")?;
    let meta = StepMetadata::new("normalize_columns");

    if columns.is_empty() {
        info!("no columns specified for normalization; skipping");
        return Ok(meta);
    }
    let Some(method) = ScaleMethod::parse(&method_name) else {
        let msg = format!("unknown normalization method '{}'; skipping", method_name);
        warn!("{}", msg);
        return Ok(meta.with_warning(msg));
    };

    let mut normalized = Vec::new();
    let mut params = Map::new();
    let mut warnings = Vec::new();

    for name in &columns {
        let Some(column) = ds.column_mut(name) else {
            warnings.push(format!("column '{}' not found", name));
            continue;
        };
        let Some(cells) = column.numeric_values() else {
            warnings.push(format!("column '{}' is not numeric", name));
            continue;
        };
        let present: Vec<f64> = cells.iter().flatten().copied().collect();
        if present.is_empty() {
            warnings.push(format!("column '{}' has no values", name));
            continue;
        }

        let scale: Box<dyn Fn(f64) -> f64> = match method {
            ScaleMethod::MinMax => {
                let min = present.iter().copied().fold(f64::INFINITY, f64::min);
                let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                params.insert(name.clone(), json!({"min": min, "max": max}));
                let range = max - min;
                Box::new(move |x: f64| if range == 0.0 { 0.0 } else { (x - min) / range })
            }
            ScaleMethod::Standard => {
                let (mean, std) = mean_std(&present);
                params.insert(name.clone(), json!({"mean": mean, "std": std}));
                Box::new(move |x: f64| if std == 0.0 { 0.0 } else { (x - mean) / std })
            }
        };

        for (cell, raw) in column.values.iter_mut().zip(cells) {
            if let Some(x) = raw {
                *cell = Value::Float(scale(x));
            }
        }
        normalized.push(name.clone());
    }

    info!(method = method.name(), columns = ?normalized, "normalized columns");
    Ok(meta
        .with_fact("normalized_columns", normalized)
        .with_fact("normalization_method", method.name())
        .with_fact("scaler_params", params)
        .with_warnings(warnings))
}
