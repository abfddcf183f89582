//! On-disk artifact store.
//!
//! Layout: one subdirectory per visitor session under the configured root,
//! each holding a single `info.json` metadata sidecar and zero or more
//! `<ms-timestamp>.png` capture files. The tree is append-only; nothing is
//! ever rewritten or deleted.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::error::ApiError;
use crate::session::VisitorRecord;

/// Filename of the per-visitor metadata sidecar.
const METADATA_FILE: &str = "info.json";

/// Suffix of capture artifacts.
const IMAGE_SUFFIX: &str = ".png";

/// One aggregated entry of the admin listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorEntry {
    /// Directory name under the store root
    pub folder_name: String,
    /// Parsed metadata sidecar; `{}` when missing or corrupt
    pub info: Value,
    /// Capture filenames within the folder
    pub images: Vec<String>,
}

/// Filesystem-backed store for visitor folders and capture artifacts.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store root if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), ApiError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Create the directory for a new visitor session.
    pub async fn create_visitor_dir(&self, folder_name: &str) -> Result<(), ApiError> {
        fs::create_dir_all(self.root.join(folder_name)).await?;
        Ok(())
    }

    /// Write the metadata sidecar. Called exactly once per session, at creation.
    pub async fn write_metadata(&self, record: &VisitorRecord) -> Result<(), ApiError> {
        let path = self.root.join(&record.folder_name).join(METADATA_FILE);
        let body = serde_json::to_vec_pretty(record)?;
        fs::write(&path, body).await?;
        debug!(path = %path.display(), "Wrote session metadata");
        Ok(())
    }

    /// Persist one decoded capture into the visitor's folder.
    ///
    /// Returns the generated `<ms-timestamp>.png` filename. Two captures
    /// landing in the same millisecond get consecutive timestamps instead of
    /// overwriting each other.
    #[instrument(level = "debug", skip(self, bytes), fields(folder = folder_name, size = bytes.len()))]
    pub async fn save_capture(
        &self,
        folder_name: &str,
        bytes: &[u8],
    ) -> Result<String, ApiError> {
        let dir = self.root.join(folder_name);
        let mut timestamp = Utc::now().timestamp_millis();

        loop {
            let filename = format!("{}{}", timestamp, IMAGE_SUFFIX);
            let path = dir.join(&filename);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    debug!(path = %path.display(), "Wrote capture artifact");
                    return Ok(filename);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    timestamp += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read a folder's metadata sidecar, degrading to `{}` when the file is
    /// missing or unparsable.
    pub async fn read_metadata(&self, folder_name: &str) -> Value {
        let path = self.root.join(folder_name).join(METADATA_FILE);
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No readable metadata sidecar");
                return Value::Object(Default::default());
            }
        };
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt metadata sidecar");
                Value::Object(Default::default())
            }
        }
    }

    /// Walk every visitor folder and assemble the combined admin listing.
    ///
    /// Entries come back in directory-listing order; a folder with a missing
    /// or corrupt sidecar still appears, with `info: {}`.
    pub async fn list_visitors(&self) -> Result<Vec<VisitorEntry>, ApiError> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let folder_name = entry.file_name().to_string_lossy().into_owned();
            let info = self.read_metadata(&folder_name).await;
            let images = self.list_images(&folder_name).await?;
            entries.push(VisitorEntry {
                folder_name,
                info,
                images,
            });
        }

        Ok(entries)
    }

    /// List `.png` capture filenames inside one visitor folder.
    pub async fn list_images(&self, folder_name: &str) -> Result<Vec<String>, ApiError> {
        let mut images = Vec::new();
        let mut dir = fs::read_dir(self.root.join(folder_name)).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(IMAGE_SUFFIX) {
                images.push(name);
            }
        }

        Ok(images)
    }

    /// Parse every metadata sidecar under the root. Folders without a valid
    /// sidecar are skipped.
    pub async fn read_all_metadata(&self) -> Result<Vec<VisitorRecord>, ApiError> {
        let mut records = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path().join(METADATA_FILE);
            let Ok(body) = fs::read(&path).await else {
                continue;
            };
            match serde_json::from_slice::<VisitorRecord>(&body) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt metadata sidecar");
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoRecord;
    use tempfile::tempdir;

    fn sample_record(folder_name: &str) -> VisitorRecord {
        VisitorRecord {
            folder_name: folder_name.to_string(),
            ip: "1.2.3.4".to_string(),
            user_agent: "TestAgent/1.0".to_string(),
            location: GeoRecord::default(),
            start_time: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_save_capture_writes_png() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.create_visitor_dir("v1").await.unwrap();

        let filename = store.save_capture("v1", b"png-bytes").await.unwrap();
        assert!(filename.ends_with(".png"));

        let written = std::fs::read(tmp.path().join("v1").join(&filename)).unwrap();
        assert_eq!(written, b"png-bytes");
    }

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.create_visitor_dir("v1").await.unwrap();
        store.write_metadata(&sample_record("v1")).await.unwrap();

        let info = store.read_metadata("v1").await;
        assert_eq!(info["ip"], "1.2.3.4");
        assert_eq!(info["folderName"], "v1");
    }

    #[tokio::test]
    async fn test_missing_metadata_degrades_to_empty_object() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.create_visitor_dir("bare").await.unwrap();

        let info = store.read_metadata("bare").await;
        assert_eq!(info, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_corrupt_metadata_degrades_to_empty_object() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.create_visitor_dir("v1").await.unwrap();
        std::fs::write(tmp.path().join("v1").join("info.json"), b"{not json").unwrap();

        let info = store.read_metadata("v1").await;
        assert_eq!(info, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_list_visitors_filters_images_by_suffix() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.create_visitor_dir("v1").await.unwrap();
        store.write_metadata(&sample_record("v1")).await.unwrap();
        store.save_capture("v1", b"a").await.unwrap();
        std::fs::write(tmp.path().join("v1").join("notes.txt"), b"x").unwrap();

        let listing = store.list_visitors().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].folder_name, "v1");
        assert_eq!(listing[0].images.len(), 1);
        assert!(listing[0].images[0].ends_with(".png"));
        // The sidecar itself is not listed as an image
        assert!(!listing[0].images.contains(&"info.json".to_string()));
    }

    #[tokio::test]
    async fn test_list_visitors_skips_plain_files_at_root() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        std::fs::write(tmp.path().join("stray.txt"), b"x").unwrap();
        store.create_visitor_dir("v1").await.unwrap();

        let listing = store.list_visitors().await.unwrap();
        assert_eq!(listing.len(), 1);
    }

    #[tokio::test]
    async fn test_read_all_metadata_skips_invalid() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.create_visitor_dir("good").await.unwrap();
        store.write_metadata(&sample_record("good")).await.unwrap();
        store.create_visitor_dir("bad").await.unwrap();
        std::fs::write(tmp.path().join("bad").join("info.json"), b"nope").unwrap();
        store.create_visitor_dir("bare").await.unwrap();

        let records = store.read_all_metadata().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].folder_name, "good");
    }
}
