//! Listing/download service collaborator
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::ProvenanceError;
use crate::store::ObjectStore;

/// Project name -> file names within that project.
pub type FileListing = BTreeMap<String, Vec<String>>;

pub trait ListingService {
    fn list_files(&self, bucket: &str) -> Result<FileListing, ProvenanceError>;

    fn download_file(&self, bucket: &str, project: &str, filename: &str) -> Result<Vec<u8>, ProvenanceError>;
}

/// Blocking HTTP client for the upload service's listing endpoints.
pub struct HttpListingClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpListingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::blocking::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::blocking::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<reqwest::blocking::Response, ProvenanceError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, "listing service request");
        let response = self.client.get(&url).query(query).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvenanceError::Network(format!("{} returned {}", url, status)));
        }
        Ok(response)
    }
}

impl ListingService for HttpListingClient {
    fn list_files(&self, bucket: &str) -> Result<FileListing, ProvenanceError> {
        let listing: FileListing = self.get("list-files", &[("bucket", bucket)])?.json()?;
        info!(bucket, projects = listing.len(), "listed files");
        Ok(listing)
    }

    fn download_file(&self, bucket: &str, project: &str, filename: &str) -> Result<Vec<u8>, ProvenanceError> {
        let response = self.get(
            "download-file",
            &[("bucket", bucket), ("project", project), ("filename", filename)],
        )?;
        let bytes = response.bytes()?;
        info!(bucket, project, filename, bytes = bytes.len(), "downloaded file");
        Ok(bytes.to_vec())
    }
}

/// Serves listings straight from an object store, grouping keys by their
/// first path segment. Keys without a `/` are grouped under `""`.
pub struct StoreListing<'a, S: ObjectStore> {
    store: &'a S,
}

impl<'a, S: ObjectStore> StoreListing<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: ObjectStore> ListingService for StoreListing<'_, S> {
    fn list_files(&self, bucket: &str) -> Result<FileListing, ProvenanceError> {
        let mut listing = FileListing::new();
        for key in self.store.list(bucket)? {
            let (project, file) = key.split_once('/').unwrap_or(("", key.as_str()));
            listing
                .entry(project.to_string())
                .or_default()
                .push(file.to_string());
        }
        Ok(listing)
    }

    fn download_file(&self, bucket: &str, project: &str, filename: &str) -> Result<Vec<u8>, ProvenanceError> {
        let key = if project.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", project, filename)
        };
        self.store.get(bucket, &key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[test]
    fn test_store_listing_groups_by_project() {
        let store = InMemoryStore::new();
        store.put("bronze", "proj1/a.csv", b"a").unwrap();
        store.put("bronze", "proj1/b.csv", b"b").unwrap();
        store.put("bronze", "loose.csv", b"c").unwrap();

        let listing = StoreListing::new(&store);
        let files = listing.list_files("bronze").unwrap();
        assert_eq!(files["proj1"], vec!["a.csv", "b.csv"]);
        assert_eq!(files[""], vec!["loose.csv"]);

        assert_eq!(listing.download_file("bronze", "proj1", "b.csv").unwrap(), b"b");
        assert!(listing
            .download_file("bronze", "proj2", "a.csv")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_http_client_trims_base_url() {
        let client = HttpListingClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_unreachable_service_is_network_error() {
        let client = HttpListingClient::new("http://127.0.0.1:9");
        assert!(matches!(
            client.list_files("bronze"),
            Err(ProvenanceError::Network(_))
        ));
    }
}
