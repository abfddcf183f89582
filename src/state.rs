//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use crate::session::SessionStore;
use crate::store::ArtifactStore;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Visitor session index with lazy folder provisioning
    pub sessions: Arc<SessionStore>,
    /// On-disk store of visitor folders and captures
    pub store: Arc<ArtifactStore>,
    /// Whether a real geolocation backend is configured
    pub geo_enabled: bool,
}
