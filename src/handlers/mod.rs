//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod admin;
pub mod capture;
pub mod health;

pub use admin::admin_data_handler;
pub use capture::{capture_handler, CaptureRequest, CaptureResponse};
pub use health::{health, ready, HealthResponse, ReadyResponse};
