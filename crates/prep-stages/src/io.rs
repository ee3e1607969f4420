//! Tabular sources and sinks, plus the per-modality output index
use std::path::Path;

use prep_core::{ArtifactIndexEntry, Column, PrepError, TabularDataset, Value};
use serde_json::{Map, Value as Json};

pub const INDEX_FILE: &str = "metadata.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Json,
}

impl TabularFormat {
    /// `None` means "use the default" (csv).
    pub fn parse(name: Option<&str>) -> Result<Self, PrepError> {
        match name.map(str::to_lowercase).as_deref() {
            None | Some("csv") => Ok(TabularFormat::Csv),
            Some("json") => Ok(TabularFormat::Json),
            Some(other) => Err(PrepError::UnsupportedFormat(format!(
                "tabular format '{}' (expected csv or json)",
                other
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TabularFormat::Csv => "csv",
            TabularFormat::Json => "json",
        }
    }
}

/// Parse CSV bytes with a header row. Cells are typed per value; integer
/// cells in a column that also holds floats are promoted.
pub fn parse_csv(bytes: &[u8]) -> Result<TabularDataset, PrepError> {
    let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PrepError::Parse(format!("csv header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PrepError::Parse(format!("csv record {}: {}", line + 1, e)))?;
        for (idx, cell) in record.iter().enumerate() {
            values[idx].push(Value::infer(cell));
        }
    }

    let columns = headers
        .into_iter()
        .zip(values)
        .map(|(name, values)| {
            let mut column = Column::new(name, values);
            column.unify_numeric();
            column
        })
        .collect();
    TabularDataset::new(columns)
}

/// Parse a JSON array of records.
pub fn parse_json(bytes: &[u8]) -> Result<TabularDataset, PrepError> {
    let records: Vec<Map<String, Json>> =
        serde_json::from_slice(bytes).map_err(|e| PrepError::Parse(format!("json records: {}", e)))?;
    Ok(TabularDataset::from_records(&records))
}

pub fn parse_tabular(bytes: &[u8], format: TabularFormat) -> Result<TabularDataset, PrepError> {
    match format {
        TabularFormat::Csv => parse_csv(bytes),
        TabularFormat::Json => parse_json(bytes),
    }
}

pub fn render_csv(ds: &TabularDataset) -> Result<Vec<u8>, PrepError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(ds.column_names())
        .map_err(|e| PrepError::Serialize(e.to_string()))?;
    for row in 0..ds.row_count() {
        writer
            .write_record(ds.row(row).iter().map(|v| v.render()))
            .map_err(|e| PrepError::Serialize(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| PrepError::Serialize(e.to_string()))
}

pub fn render_json(ds: &TabularDataset) -> Result<Vec<u8>, PrepError> {
    Ok(serde_json::to_vec_pretty(&ds.to_records())?)
}

pub fn render_tabular(ds: &TabularDataset, format: TabularFormat) -> Result<Vec<u8>, PrepError> {
    match format {
        TabularFormat::Csv => render_csv(ds),
        TabularFormat::Json => render_json(ds),
    }
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, PrepError> {
    std::fs::read(path).map_err(|e| PrepError::io(path, e))
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), PrepError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PrepError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| PrepError::io(path, e))
}

/// Write `metadata.csv` (filename,width,height,timestamp,path) into `folder`.
pub fn write_index(folder: &Path, entries: &[ArtifactIndexEntry]) -> Result<(), PrepError> {
    let path = folder.join(INDEX_FILE);
    let mut writer = csv::Writer::from_path(&path).map_err(|e| PrepError::io(&path, e))?;
    if entries.is_empty() {
        writer
            .write_record(["filename", "width", "height", "timestamp", "path"])
            .map_err(|e| PrepError::io(&path, e))?;
    }
    for entry in entries {
        writer.serialize(entry).map_err(|e| PrepError::io(&path, e))?;
    }
    writer.flush().map_err(|e| PrepError::io(&path, e))
}

pub fn read_index(folder: &Path) -> Result<Vec<ArtifactIndexEntry>, PrepError> {
    let path = folder.join(INDEX_FILE);
    let mut reader = csv::Reader::from_path(&path).map_err(|e| PrepError::io(&path, e))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| PrepError::Parse(format!("{}: {}", path.display(), e))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_csv_infers_types() {
        let ds = parse_csv(b"id,score,name,ok\n1,2.5,ann,true\n2,,bob,false\n3,4,,true\n").unwrap();
        assert_eq!(ds.shape(), vec![3, 4]);
        assert_eq!(ds.column("score").unwrap().values[2], Value::Float(4.0));
        assert_eq!(ds.column("score").unwrap().values[1], Value::Null);
        assert_eq!(ds.column("name").unwrap().values[2], Value::Null);
        assert_eq!(ds.column("ok").unwrap().values[0], Value::Bool(true));
    }

    #[test]
    fn test_json_round_trip_keeps_nulls() {
        let ds = parse_json(br#"[{"a":1,"b":null},{"a":2,"b":5}]"#).unwrap();
        let text = String::from_utf8(render_json(&ds).unwrap()).unwrap();
        let back: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(back, serde_json::json!([{"a":1,"b":null},{"a":2,"b":5}]));
    }

    #[test]
    fn test_render_csv() {
        let ds = parse_json(br#"[{"a":1,"b":"x, y"},{"a":2,"b":null}]"#).unwrap();
        let text = String::from_utf8(render_csv(&ds).unwrap()).unwrap();
        assert_eq!(text, "a,b\n1,\"x, y\"\n2,\n");
    }

    #[test]
    fn test_unknown_format() {
        assert!(TabularFormat::parse(Some("parquet")).is_err());
        assert_eq!(TabularFormat::parse(None).unwrap(), TabularFormat::Csv);
        assert_eq!(TabularFormat::parse(Some("JSON")).unwrap(), TabularFormat::Json);
    }

    #[test]
    fn test_index_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![ArtifactIndexEntry {
            filename: "frame_0000.png".to_string(),
            width: 4,
            height: 2,
            timestamp: Utc::now(),
            path: dir.path().join("frame_0000.png").display().to_string(),
        }];
        write_index(dir.path(), &entries).unwrap();
        let text = std::fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        assert!(text.starts_with("filename,width,height,timestamp,path\n"));
        assert_eq!(read_index(dir.path()).unwrap(), entries);
    }
}
