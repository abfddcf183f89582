//! Visitor resolution middleware.
//!
//! Runs for every request path except the admin surface and the raw uploads
//! tree, resolving (or lazily creating) the visitor session for the caller's
//! (IP, User-Agent) pair and attaching the record to request extensions for
//! downstream handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::session::VisitorRecord;
use crate::state::AppState;

/// Fallback identity component when a header or peer address is unavailable.
const UNKNOWN: &str = "unknown";

/// Path prefixes that never resolve a session. Monitoring probes are skipped
/// so liveness checks do not provision visitor folders.
const SKIP_PREFIXES: &[&str] = &["/admin", "/uploads", "/health", "/ready"];

/// Extension attached to resolved requests.
pub type ResolvedVisitor = Arc<VisitorRecord>;

/// Middleware: resolve-or-create the visitor session for this request.
///
/// Side effect by design: a session folder may be created for a visitor who
/// never submits a capture.
pub async fn resolve_visitor(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path();
    if SKIP_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return Ok(next.run(req).await);
    }

    let ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN)
        .to_string();

    let record = state.sessions.resolve(&ip, &user_agent).await?;
    req.extensions_mut().insert::<ResolvedVisitor>(record);

    Ok(next.run(req).await)
}

/// Client IP: `x-forwarded-for` wins, then the socket peer address.
fn client_ip(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        // First hop of the forwarding chain
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn req_with_forwarded(value: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_forwarded_header_wins() {
        assert_eq!(client_ip(&req_with_forwarded("1.2.3.4")), "1.2.3.4");
    }

    #[test]
    fn test_forwarded_chain_takes_first_hop() {
        assert_eq!(
            client_ip(&req_with_forwarded("9.9.9.9, 10.0.0.1")),
            "9.9.9.9"
        );
    }

    #[test]
    fn test_connect_info_fallback() {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("5.6.7.8:1234".parse().unwrap()));
        assert_eq!(client_ip(&req), "5.6.7.8");
    }

    #[test]
    fn test_unknown_without_any_source() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}
