use std::path::Path;

use anyhow::{bail, Context, Result};
use prep_core::{Modality, ModalityStatus, PipelineRunner, PipelineSettings, RunConfig};
use prep_provenance::{
    ArtifactRef, EntryFields, FsObjectStore, HttpListingClient, Ledger, LedgerSettings, ListingService,
    UploadRequest,
};
use tracing::{info, warn};

use crate::cli::{FieldArgs, ListingArgs, RegisterArgs, RunArgs, StoreArgs, UploadArgs};

pub fn run(args: RunArgs) -> Result<()> {
    let mut config = RunConfig::from_file(&args.config)
        .with_context(|| format!("loading run config {}", args.config.display()))?;
    let overrides = [
        (Modality::Tabular, &args.tabular_path),
        (Modality::Images, &args.images_path),
        (Modality::Videos, &args.videos_path),
    ];
    for (modality, path) in overrides {
        if let Some(path) = path {
            config.inject_path(modality, path);
        }
    }

    let runner = PipelineRunner::new(
        prep_stages::default_executors(),
        PipelineSettings::with_metadata_dir(&args.metadata_dir),
    );
    info!(pipeline = runner.pipeline_id(), "starting run");
    let outcome = runner.run(&config)?;

    println!("run {} -> {}", outcome.record.run_id, outcome.record_path.display());
    for summary in &outcome.record.modalities {
        match summary.status {
            ModalityStatus::Completed => println!(
                "  {}: completed {:?} -> {:?} in {} ms",
                summary.modality, summary.input_shape, summary.output_shape, summary.latency_ms
            ),
            ModalityStatus::Failed => println!(
                "  {}: failed: {}",
                summary.modality,
                summary.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let failed = outcome.failed_modalities();
    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(|m| m.to_string()).collect();
        bail!("modalities failed: {}", names.join(", "));
    }
    Ok(())
}

pub fn register(args: RegisterArgs) -> Result<()> {
    let ledger = open_ledger(&args.store);
    let artifact = ArtifactRef {
        artifact_filename: args.artifact,
        original_filename: args.original_filename,
        project: args.project,
    };
    let entry = ledger
        .register(&artifact, entry_fields(args.fields))
        .with_context(|| format!("registering {}", artifact.artifact_filename))?;
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

pub fn upload(args: UploadArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let original_filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let ledger = open_ledger(&args.store);
    let receipt = ledger.upload(UploadRequest {
        project: args.project,
        base_name: args.base_name,
        original_filename,
        add_prefix: !args.no_prefix,
        bytes,
        fields: entry_fields(args.fields),
    })?;
    println!("uploaded {} to {}", receipt.artifact_filename, receipt.bucket);
    println!("signature {}", receipt.entry.signature);
    Ok(())
}

pub fn lookup(store: StoreArgs, tag: &str) -> Result<()> {
    let matches = open_ledger(&store).lookup_by_tag(tag)?;
    println!("{}", serde_json::to_string_pretty(&matches)?);
    Ok(())
}

pub fn history(store: StoreArgs, artifact: &str) -> Result<()> {
    let record = open_ledger(&store)
        .history(artifact)
        .with_context(|| format!("loading history of {}", artifact))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub fn verify(store: StoreArgs, artifact: &str) -> Result<()> {
    let invalid = open_ledger(&store).verify(artifact)?;
    if invalid.is_empty() {
        println!("{}: all entries verified", artifact);
        return Ok(());
    }
    for index in &invalid {
        warn!(artifact, entry = index, "signature mismatch");
    }
    bail!("{}: {} entries failed verification", artifact, invalid.len())
}

pub fn list(listing: ListingArgs) -> Result<()> {
    let client = HttpListingClient::new(listing.listing_url);
    let files = client.list_files(&listing.bucket)?;
    for (project, names) in &files {
        println!("{}", if project.is_empty() { "(no project)" } else { project });
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

pub fn download(listing: ListingArgs, project: &str, filename: &str, output: Option<&Path>) -> Result<()> {
    let client = HttpListingClient::new(listing.listing_url);
    let bytes = client.download_file(&listing.bucket, project, filename)?;
    let target = output.map(Path::to_path_buf).unwrap_or_else(|| {
        Path::new(filename)
            .file_name()
            .map(Into::into)
            .unwrap_or_else(|| filename.into())
    });
    std::fs::write(&target, &bytes).with_context(|| format!("writing {}", target.display()))?;
    println!("saved {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

fn open_ledger(store: &StoreArgs) -> Ledger<FsObjectStore> {
    Ledger::new(
        FsObjectStore::new(&store.store_root),
        LedgerSettings::with_bucket(store.bucket.clone()),
    )
}

fn entry_fields(args: FieldArgs) -> EntryFields {
    EntryFields {
        source_description: args.description,
        source_url: args.url,
        processing_intent: args.intent,
        uploader_identity: args.uploader.unwrap_or_else(default_uploader),
        file_type: args.file_type,
        tags: args.tags.into_iter().collect(),
    }
}

/// `$USERNAME`, then `$USER`, then "unknown".
pub fn default_uploader() -> String {
    uploader_from(|key| std::env::var(key).ok())
}

fn uploader_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["USERNAME", "USER"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploader_precedence() {
        let both = |key: &str| match key {
            "USERNAME" => Some("win".to_string()),
            "USER" => Some("unix".to_string()),
            _ => None,
        };
        assert_eq!(uploader_from(both), "win");
        assert_eq!(uploader_from(|key: &str| (key == "USER").then(|| "unix".to_string())), "unix");
        assert_eq!(uploader_from(|_: &str| None), "unknown");
    }

    #[test]
    fn test_register_then_history_through_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreArgs {
            store_root: dir.path().to_path_buf(),
            bucket: "bronze".to_string(),
        };
        let args = RegisterArgs {
            store: StoreArgs {
                store_root: dir.path().to_path_buf(),
                bucket: "bronze".to_string(),
            },
            artifact: "data.csv".to_string(),
            original_filename: "report.csv".to_string(),
            project: "proj1".to_string(),
            fields: FieldArgs {
                description: "Kaggle".to_string(),
                url: String::new(),
                intent: String::new(),
                file_type: "csv".to_string(),
                tags: vec!["raw".to_string()],
                uploader: Some("ana".to_string()),
            },
        };
        register(args).unwrap();

        let record = open_ledger(&store).history("data.csv").unwrap();
        assert_eq!(record.history[0].uploader_identity, "ana");
        verify(store, "data.csv").unwrap();
    }
}
