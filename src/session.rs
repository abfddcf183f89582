//! Visitor session identity.
//!
//! A visitor is identified by the pair (IP, User-Agent). The first request
//! from a new pair provisions a storage folder, runs the geolocation lookup
//! and writes the `info.json` sidecar; every later request from the same pair
//! reuses the record unchanged.
//!
//! Creation is at-most-once per key: the index maps each key to a
//! `tokio::sync::OnceCell`, so concurrent first sightings of one visitor are
//! serialized against each other without blocking unrelated visitors.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::ApiError;
use crate::geo::{GeoRecord, IpLocator};
use crate::store::ArtifactStore;

/// Maximum number of User-Agent characters carried into the folder name.
const UA_FOLDER_PREFIX_LEN: usize = 50;

/// Structured session key.
///
/// The raw IP and User-Agent strings are kept verbatim; keying on the pair
/// (instead of a separator-joined string) makes collisions between different
/// pairs impossible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitorKey {
    pub ip: String,
    pub user_agent: String,
}

impl VisitorKey {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Metadata record for one visitor session.
///
/// Serialized verbatim as the `info.json` sidecar inside the visitor's folder;
/// field names stay camelCase on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRecord {
    /// Directory name under the artifact store root
    pub folder_name: String,
    /// Raw connection IP
    pub ip: String,
    /// Raw User-Agent header
    pub user_agent: String,
    /// Best-effort location; empty object when the lookup failed
    #[serde(default)]
    pub location: GeoRecord,
    /// ISO-8601 session start time
    pub start_time: String,
}

/// In-memory index of visitor sessions with lazy on-disk provisioning.
pub struct SessionStore {
    index: DashMap<VisitorKey, Arc<OnceCell<Arc<VisitorRecord>>>>,
    store: Arc<ArtifactStore>,
    locator: Arc<dyn IpLocator>,
}

impl SessionStore {
    pub fn new(store: Arc<ArtifactStore>, locator: Arc<dyn IpLocator>) -> Self {
        Self {
            index: DashMap::new(),
            store,
            locator,
        }
    }

    /// Number of sessions currently indexed.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Rebuild the index from `info.json` sidecars already on disk.
    ///
    /// Lets returning visitors reuse their folder across restarts instead of
    /// getting a fresh one. When several folders carry the same (IP, UA) pair
    /// (left behind by earlier runs) the first one listed wins.
    pub async fn load_existing(&self) -> Result<usize, ApiError> {
        let records = self.store.read_all_metadata().await?;
        let mut loaded = 0;

        for record in records {
            let key = VisitorKey::new(&record.ip, &record.user_agent);
            if self.index.contains_key(&key) {
                debug!(folder = %record.folder_name, "Skipping duplicate session folder");
                continue;
            }
            self.index.insert(
                key,
                Arc::new(OnceCell::new_with(Some(Arc::new(record)))),
            );
            loaded += 1;
        }

        Ok(loaded)
    }

    /// Resolve the session for (ip, user_agent), creating it on first sighting.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(
        &self,
        ip: &str,
        user_agent: &str,
    ) -> Result<Arc<VisitorRecord>, ApiError> {
        let key = VisitorKey::new(ip, user_agent);

        // Entry guard is dropped before awaiting; the OnceCell serializes
        // concurrent creation attempts for this key.
        let cell = Arc::clone(self.index.entry(key).or_default().value());

        let record = cell
            .get_or_try_init(|| async {
                self.create_session(ip, user_agent).await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(record))
    }

    /// Provision folder, metadata and location for a first-seen visitor.
    async fn create_session(&self, ip: &str, user_agent: &str) -> Result<VisitorRecord, ApiError> {
        let timestamp = Utc::now().timestamp_millis();
        let folder_name = format!(
            "{}_{}_{}",
            timestamp,
            sanitize_component(ip),
            sanitize_component(&truncate_chars(user_agent, UA_FOLDER_PREFIX_LEN)),
        );

        self.store.create_visitor_dir(&folder_name).await?;

        // Best-effort; an unreachable geolocation service leaves the record empty
        let location = self.locator.lookup(ip).await;
        if location.is_empty() {
            warn!(ip, "No geolocation data for visitor");
        }

        let record = VisitorRecord {
            folder_name,
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            location,
            start_time: Utc::now().to_rfc3339(),
        };

        self.store.write_metadata(&record).await?;

        info!(
            folder = %record.folder_name,
            ip = %record.ip,
            "New visitor session"
        );

        Ok(record)
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`, keeping folder
/// names filesystem-safe on every platform.
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn truncate_chars(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::NullLocator;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_ip() {
        assert_eq!(sanitize_component("1.2.3.4"), "1_2_3_4");
        assert_eq!(sanitize_component("::ffff:10.0.0.1"), "__ffff_10_0_0_1");
        assert_eq!(sanitize_component("unknown"), "unknown");
    }

    #[test]
    fn test_sanitize_user_agent() {
        assert_eq!(sanitize_component("TestAgent/1.0"), "TestAgent_1_0");
        assert_eq!(
            sanitize_component("Mozilla/5.0 (X11; Linux x86_64)"),
            "Mozilla_5_0__X11__Linux_x86_64_"
        );
    }

    #[test]
    fn test_truncate_chars_bounds_folder_component() {
        let long_ua = "a".repeat(200);
        assert_eq!(truncate_chars(&long_ua, UA_FOLDER_PREFIX_LEN).len(), 50);
        assert_eq!(truncate_chars("short", UA_FOLDER_PREFIX_LEN), "short");
    }

    #[test]
    fn test_visitor_key_equality() {
        let a = VisitorKey::new("1.2.3.4", "UA");
        let b = VisitorKey::new("1.2.3.4", "UA");
        let c = VisitorKey::new("1.2.3.5", "UA");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = VisitorRecord {
            folder_name: "f".into(),
            ip: "1.2.3.4".into(),
            user_agent: "UA".into(),
            location: GeoRecord::default(),
            start_time: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["folderName"], "f");
        assert_eq!(json["userAgent"], "UA");
        assert_eq!(json["startTime"], "2026-01-01T00:00:00Z");
        assert_eq!(json["location"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_resolve_creates_then_reuses() {
        let tmp = tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(tmp.path()));
        let sessions = SessionStore::new(store, Arc::new(NullLocator));

        let first = sessions.resolve("1.2.3.4", "TestAgent/1.0").await.unwrap();
        let second = sessions.resolve("1.2.3.4", "TestAgent/1.0").await.unwrap();
        assert_eq!(first.folder_name, second.folder_name);
        assert_eq!(sessions.len(), 1);

        assert!(tmp.path().join(&first.folder_name).join("info.json").exists());
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_folders() {
        let tmp = tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(tmp.path()));
        let sessions = SessionStore::new(store, Arc::new(NullLocator));

        let a = sessions.resolve("1.2.3.4", "AgentA").await.unwrap();
        let b = sessions.resolve("1.2.3.4", "AgentB").await.unwrap();
        let c = sessions.resolve("5.6.7.8", "AgentA").await.unwrap();
        assert_ne!(a.folder_name, b.folder_name);
        assert_ne!(a.folder_name, c.folder_name);
        assert_eq!(sessions.len(), 3);
    }

    #[tokio::test]
    async fn test_load_existing_restores_index() {
        let tmp = tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(tmp.path()));

        {
            let sessions = SessionStore::new(Arc::clone(&store), Arc::new(NullLocator));
            sessions.resolve("1.2.3.4", "TestAgent/1.0").await.unwrap();
        }

        // Fresh process: index rebuilt from disk, folder reused
        let sessions = SessionStore::new(Arc::clone(&store), Arc::new(NullLocator));
        assert_eq!(sessions.load_existing().await.unwrap(), 1);

        let record = sessions.resolve("1.2.3.4", "TestAgent/1.0").await.unwrap();
        let dirs: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(dirs.len(), 1);
        assert!(record.folder_name.ends_with("_1_2_3_4_TestAgent_1_0"));
    }
}
