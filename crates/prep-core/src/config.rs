//! Run configuration
//!
//! Sections are kept as raw values until a modality asks for them, so a
//! malformed `images` block cannot prevent `tabular` from running.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data_model::Modality;
use crate::error::PrepError;
use crate::stage::StepConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabular: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos: Option<Value>,
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, PrepError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PrepError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    fn raw(&self, modality: Modality) -> Option<&Value> {
        match modality {
            Modality::Tabular => self.tabular.as_ref(),
            Modality::Images => self.images.as_ref(),
            Modality::Videos => self.videos.as_ref(),
        }
    }

    fn raw_mut(&mut self, modality: Modality) -> &mut Option<Value> {
        match modality {
            Modality::Tabular => &mut self.tabular,
            Modality::Images => &mut self.images,
            Modality::Videos => &mut self.videos,
        }
    }

    pub fn is_present(&self, modality: Modality) -> bool {
        self.raw(modality).is_some()
    }

    pub fn present(&self) -> Vec<Modality> {
        Modality::ALL
            .into_iter()
            .filter(|m| self.is_present(*m))
            .collect()
    }

    /// Resolve one section. `None` when the modality is absent from the run.
    pub fn section(&self, modality: Modality) -> Option<Result<ModalitySection, PrepError>> {
        self.raw(modality)
            .map(|raw| ModalitySection::resolve(modality, raw))
    }

    /// Set the source location of a modality, creating the section if needed.
    pub fn inject_path(&mut self, modality: Modality, path: impl AsRef<Path>) {
        let path = Value::String(path.as_ref().display().to_string());
        let slot = self.raw_mut(modality);
        match slot {
            Some(Value::Object(map)) => {
                map.insert("path".to_string(), path);
            }
            _ => {
                let mut map = Map::new();
                map.insert("path".to_string(), path);
                *slot = Some(Value::Object(map));
            }
        }
    }
}

/// A validated modality block: required keys present, preprocessing kept raw.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalitySection {
    pub modality: Modality,
    pub path: PathBuf,
    pub source_type: Option<String>,
    pub output_folder: PathBuf,
    pub output_format: Option<String>,
    preprocessing: Map<String, Value>,
}

impl ModalitySection {
    pub fn resolve(modality: Modality, raw: &Value) -> Result<Self, PrepError> {
        let map = raw
            .as_object()
            .ok_or_else(|| PrepError::config(modality.config_key(), "section must be a mapping"))?;

        let required = |key: &str| -> Result<PathBuf, PrepError> {
            match map.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Ok(PathBuf::from(s)),
                Some(Value::Null) | None => Err(PrepError::config(
                    modality.config_key(),
                    format!("missing required key '{}'", key),
                )),
                Some(other) => Err(PrepError::config(
                    modality.config_key(),
                    format!("'{}' must be a string, got {}", key, other),
                )),
            }
        };
        let optional = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_lowercase);

        // output_folder is checked first: it is the key the caller writes,
        // path is normally injected by the upload collaborator.
        let output_folder = required("output_folder")?;
        let path = required("path")?;

        let preprocessing = match map.get("preprocessing") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(steps)) => steps.clone(),
            Some(_) => {
                return Err(PrepError::config(
                    modality.config_key(),
                    "'preprocessing' must be a mapping",
                ))
            }
        };

        Ok(Self {
            modality,
            path,
            source_type: optional("type"),
            output_folder,
            output_format: optional("output_format"),
            preprocessing,
        })
    }

    pub fn step(&self, key: &str) -> Option<StepConfig> {
        self.preprocessing
            .get(key)
            .map(|v| StepConfig::new(key, v.clone()))
    }

    /// Configured step keys in document order.
    pub fn step_keys(&self) -> impl Iterator<Item = &str> {
        self.preprocessing.keys().map(String::as_str)
    }
}

/// Where run records go. Passed to the runner at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub metadata_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            metadata_dir: PathBuf::from("."),
        }
    }
}

impl PipelineSettings {
    pub fn with_metadata_dir(metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
tabular:
  path: data/input.csv
  type: CSV
  output_folder: out/tabular
  preprocessing:
    missing_values:
      global_fill: 0
    drop_duplicates: true
images:
  path: data/images
"#;

    #[test]
    fn test_only_present_sections() {
        let config = RunConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.present(), vec![Modality::Tabular, Modality::Images]);
        assert!(config.section(Modality::Videos).is_none());
    }

    #[test]
    fn test_resolve_tabular() {
        let config = RunConfig::from_yaml_str(YAML).unwrap();
        let section = config.section(Modality::Tabular).unwrap().unwrap();
        assert_eq!(section.source_type.as_deref(), Some("csv"));
        assert_eq!(section.output_folder, PathBuf::from("out/tabular"));
        let keys: Vec<_> = section.step_keys().collect();
        assert_eq!(keys, vec!["missing_values", "drop_duplicates"]);
        let step = section.step("missing_values").unwrap();
        assert_eq!(step.require::<i64>("global_fill").unwrap(), 0);
    }

    #[test]
    fn test_missing_output_folder_is_configuration_error() {
        let config = RunConfig::from_yaml_str(YAML).unwrap();
        let err = config.section(Modality::Images).unwrap().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("output_folder"));
    }

    #[test]
    fn test_inject_path() {
        let mut config = RunConfig::from_yaml_str("videos:\n  output_folder: out/v\n").unwrap();
        config.inject_path(Modality::Videos, "uploads/frames");
        let section = config.section(Modality::Videos).unwrap().unwrap();
        assert_eq!(section.path, PathBuf::from("uploads/frames"));
    }

    #[test]
    fn test_empty_document() {
        let config = RunConfig::from_yaml_str("").unwrap();
        assert!(config.present().is_empty());
    }
}
