//! Signed, append-only provenance for uploaded artifacts.
//!
//! Every registration appends a [`ProvenanceEntry`] whose signature is a
//! blake3 fingerprint of its canonical JSON; a [`Ledger`] keeps one
//! [`ProvenanceRecord`] per artifact in an [`ObjectStore`].

pub mod canonical;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod listing;
pub mod naming;
pub mod record;
pub mod store;

pub use canonical::{fingerprint, to_canonical_json};
pub use entry::{EntryFields, ProvenanceEntry};
pub use error::ProvenanceError;
pub use ledger::{
    ArtifactRef, Ledger, LedgerSettings, UploadReceipt, UploadRequest, DEFAULT_BUCKET, RECORD_SUFFIX,
};
pub use listing::{FileListing, HttpListingClient, ListingService, StoreListing};
pub use naming::{generate_name, is_valid_url, validate_base_name};
pub use record::{ProvenanceRecord, RecordSummary};
pub use store::{FsObjectStore, InMemoryStore, ObjectStore};
