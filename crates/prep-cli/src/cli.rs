use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use prep_provenance::DEFAULT_BUCKET;

#[derive(Parser, Debug)]
#[command(name = "prep")]
#[command(about = "Preprocess tabular, image and video data and track artifact provenance")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the preprocessing pipeline described by a YAML config
    Run(RunArgs),
    /// Append a provenance entry for an artifact already in the store
    Register(RegisterArgs),
    /// Store a file under its generated name and register its provenance
    Upload(UploadArgs),
    /// Find artifacts whose latest entry carries a tag
    Lookup {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        tag: String,
    },
    /// Print the full provenance record of an artifact
    History {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        artifact: String,
    },
    /// Recompute every signature in an artifact's history
    Verify {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        artifact: String,
    },
    /// List files known to the listing service, grouped by project
    List {
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Download one file through the listing service
    Download {
        #[command(flatten)]
        listing: ListingArgs,
        #[arg(long)]
        project: String,
        #[arg(long)]
        filename: String,
        /// Destination file; defaults to the file name in the working directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML run configuration
    #[arg(long, short)]
    pub config: PathBuf,

    /// Directory where run records are written
    #[arg(long, env = "PREP_METADATA_DIR", default_value = ".")]
    pub metadata_dir: PathBuf,

    /// Override the tabular source path
    #[arg(long)]
    pub tabular_path: Option<PathBuf>,

    /// Override the image source path
    #[arg(long)]
    pub images_path: Option<PathBuf>,

    /// Override the video frames path
    #[arg(long)]
    pub videos_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Root directory of the filesystem object store
    #[arg(long, env = "PREP_STORE_ROOT", default_value = "object-store")]
    pub store_root: PathBuf,

    #[arg(long, env = "PREP_BUCKET", default_value = DEFAULT_BUCKET)]
    pub bucket: String,
}

#[derive(Args, Debug)]
pub struct ListingArgs {
    /// Base URL of the listing/download service
    #[arg(long, env = "PREP_LISTING_URL")]
    pub listing_url: String,

    #[arg(long, env = "PREP_BUCKET", default_value = DEFAULT_BUCKET)]
    pub bucket: String,
}

/// Descriptive provenance fields shared by `register` and `upload`.
#[derive(Args, Debug)]
pub struct FieldArgs {
    /// Where the data came from
    #[arg(long)]
    pub description: String,

    #[arg(long, default_value = "")]
    pub url: String,

    #[arg(long, default_value = "")]
    pub intent: String,

    #[arg(long, default_value = "")]
    pub file_type: String,

    /// Repeatable
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Defaults to $USERNAME, then $USER
    #[arg(long)]
    pub uploader: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Artifact name as stored (ex: proj1/data_20240501.csv)
    #[arg(long)]
    pub artifact: String,

    #[arg(long)]
    pub original_filename: String,

    #[arg(long)]
    pub project: String,

    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Local file to upload
    #[arg(long)]
    pub file: PathBuf,

    #[arg(long)]
    pub project: String,

    /// Alphanumeric base of the stored name
    #[arg(long)]
    pub base_name: String,

    /// Store as `{base}.{ext}` instead of `{project}/{base}_{YYYYMMDD}.{ext}`
    #[arg(long)]
    pub no_prefix: bool,

    #[command(flatten)]
    pub fields: FieldArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_upload_collects_repeated_tags() {
        let cli = Cli::try_parse_from([
            "prep",
            "upload",
            "--file",
            "report.csv",
            "--project",
            "proj1",
            "--base-name",
            "data",
            "--description",
            "Kaggle",
            "--tag",
            "raw",
            "--tag",
            "finance",
        ])
        .unwrap();
        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.fields.tags, vec!["raw", "finance"]);
                assert!(!args.no_prefix);
                assert_eq!(args.store.bucket, DEFAULT_BUCKET);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
