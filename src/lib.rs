//! Lenslog Library - visitor snapshot capture server components
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::ApiError;
pub use geo::{GeoRecord, IpLocator, IpinfoLocator, NullLocator};
pub use routes::create_router;
pub use session::{SessionStore, VisitorKey, VisitorRecord};
pub use state::AppState;
pub use store::{ArtifactStore, VisitorEntry};
