//! Tabular Step Library
//!
//! Every step has the same shape: validate parameters, then mutate the
//! dataset and describe the change. A step that returns `Err` has not
//! touched the dataset.

mod clean;
mod dtype;
mod encode;
mod filter;
mod missing;
mod normalize;
mod outliers;
mod structural;

pub use dtype::{ConversionError, DtypeTarget};
pub use normalize::ScaleMethod;

use prep_core::{StepConfig, StepError, StepMetadata, TabularDataset};

use crate::registry::StepKind;

pub type StepResult = Result<StepMetadata, StepError>;

/// Closed set of tabular operations, listed in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabularStep {
    RemoveEmptyColumns,
    AddRowId,
    DropDuplicates,
    RenameColumns,
    MissingValues,
    Normalization,
    CategoricalEncoding,
    OutlierRemoval,
    Cleaning,
    ColumnFiltering,
    DtypeConversion,
}

impl TabularStep {
    /// Structural cleanup, then value rewrites, then row/column filters;
    /// dtype conversion sees only the final columns.
    pub const ORDER: [TabularStep; 11] = [
        TabularStep::RemoveEmptyColumns,
        TabularStep::AddRowId,
        TabularStep::DropDuplicates,
        TabularStep::RenameColumns,
        TabularStep::MissingValues,
        TabularStep::Normalization,
        TabularStep::CategoricalEncoding,
        TabularStep::OutlierRemoval,
        TabularStep::Cleaning,
        TabularStep::ColumnFiltering,
        TabularStep::DtypeConversion,
    ];

    /// Name recorded in step metadata.
    pub fn step_name(self) -> &'static str {
        match self {
            TabularStep::RemoveEmptyColumns => "remove_empty_columns",
            TabularStep::AddRowId => "add_row_id",
            TabularStep::DropDuplicates => "drop_duplicates",
            TabularStep::RenameColumns => "rename_columns",
            TabularStep::MissingValues => "handle_missing_values",
            TabularStep::Normalization => "normalize_columns",
            TabularStep::CategoricalEncoding => "encode_categorical",
            TabularStep::OutlierRemoval => "remove_outliers",
            TabularStep::Cleaning => "clean_data",
            TabularStep::ColumnFiltering => "filter_columns",
            TabularStep::DtypeConversion => "convert_dtypes",
        }
    }

    pub fn apply_in_place(self, ds: &mut TabularDataset, cfg: &StepConfig) -> StepResult {
        match self {
            TabularStep::RemoveEmptyColumns => structural::remove_empty_columns(ds),
            TabularStep::AddRowId => structural::add_row_id(ds),
            TabularStep::DropDuplicates => structural::drop_duplicates(ds),
            TabularStep::RenameColumns => structural::rename_columns(ds, cfg),
            TabularStep::MissingValues => missing::handle_missing_values(ds, cfg),
            TabularStep::Normalization => normalize::normalize_columns(ds, cfg),
            TabularStep::CategoricalEncoding => encode::encode_categorical(ds, cfg),
            TabularStep::OutlierRemoval => outliers::remove_outliers(ds, cfg),
            TabularStep::Cleaning => clean::clean_data(ds, cfg),
            TabularStep::ColumnFiltering => filter::filter_columns(ds, cfg),
            TabularStep::DtypeConversion => dtype::convert_dtypes(ds, cfg),
        }
    }

    /// `(Dataset, StepConfig) -> (Dataset, StepMetadata)`. A step that
    /// cannot run leaves the dataset as it was and says why.
    pub fn apply(self, mut ds: TabularDataset, cfg: &StepConfig) -> (TabularDataset, StepMetadata) {
        let meta = match self.apply_in_place(&mut ds, cfg) {
            Ok(meta) => meta,
            Err(err) => skipped(self.step_name(), &err),
        };
        (ds, meta)
    }
}

impl StepKind for TabularStep {
    fn config_key(self) -> &'static str {
        match self {
            TabularStep::RemoveEmptyColumns => "remove_empty_columns",
            TabularStep::AddRowId => "add_row_id",
            TabularStep::DropDuplicates => "drop_duplicates",
            TabularStep::RenameColumns => "rename_columns",
            TabularStep::MissingValues => "missing_values",
            TabularStep::Normalization => "normalization",
            TabularStep::CategoricalEncoding => "categorical_encoding",
            TabularStep::OutlierRemoval => "outlier_removal",
            TabularStep::Cleaning => "cleaning",
            TabularStep::ColumnFiltering => "column_filtering",
            TabularStep::DtypeConversion => "dtype_conversion",
        }
    }

    fn is_flag(self) -> bool {
        matches!(
            self,
            TabularStep::RemoveEmptyColumns | TabularStep::AddRowId | TabularStep::DropDuplicates
        )
    }
}

/// Metadata for a step that aborted before touching the data.
pub fn skipped(step: &str, err: &StepError) -> StepMetadata {
    StepMetadata::new(step)
        .with_fact("skipped", true)
        .with_warning(err.to_string())
}

/// String list parameter; absent means empty.
fn string_list(cfg: &StepConfig, key: &str) -> Result<Vec<String>, StepError> {
    cfg.get_or(key, Vec::new())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use prep_core::{Column, TabularDataset, Value};

    pub fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    pub fn strs(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::Str(v.to_string())).collect()
    }

    pub fn dataset(columns: Vec<(&str, Vec<Value>)>) -> TabularDataset {
        TabularDataset::new(
            columns
                .into_iter()
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_step_leaves_dataset_untouched() {
        let ds = dataset(vec![("row_id", ints(&[7, 8]))]);
        let (out, meta) = TabularStep::AddRowId.apply(ds.clone(), &StepConfig::new("add_row_id", json!(true)));
        assert_eq!(out, ds);
        assert_eq!(meta.step, "add_row_id");
        assert_eq!(meta.fact("skipped"), Some(&json!(true)));
        assert_eq!(meta.warnings().len(), 1);
    }

    #[test]
    fn test_config_keys_round_trip() {
        for step in TabularStep::ORDER {
            let key = step.config_key();
            assert_eq!(TabularStep::ORDER.into_iter().find(|s| s.config_key() == key), Some(step));
        }
    }
}
