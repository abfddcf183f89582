//! Admin aggregation handler
//!
//! Handles GET /admin/data: walks every visitor folder and returns the
//! combined metadata + capture listing.

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::VisitorEntry;

/// GET /admin/data - aggregated listing of all visitor sessions
///
/// One entry per folder under the store root, in directory-listing order.
/// A folder whose `info.json` is missing or corrupt still appears with an
/// empty `info` object.
pub async fn admin_data_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<VisitorEntry>>, ApiError> {
    let entries = state.store.list_visitors().await?;
    Ok(Json(entries))
}
