// handlers/auth/session.rs - DELETE /api/auth/session handler

use axum::{extract::State, http::HeaderMap, Extension};
use serde_json::{json, Value};

use crate::gateway::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// Drop every cached resolution for the credentials on this request.
///
/// The session itself is revoked by the hosted auth service; this only makes
/// sure the gateway stops honouring it before the cache TTL runs out.
pub async fn session_delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    let evicted = state.gateway.resolver().logout(&headers).await;
    tracing::info!("Logout for {} evicted {} cache entries", ctx.principal.describe(), evicted);

    Ok(ApiResponse::success(json!({
        "logged_out": true,
        "evicted": evicted
    })))
}
