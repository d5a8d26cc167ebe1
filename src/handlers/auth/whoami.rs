// handlers/auth/whoami.rs - GET /api/auth/whoami handler

use axum::Extension;
use serde::Serialize;

use crate::auth::Principal;
use crate::gateway::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    #[serde(flatten)]
    pub principal: Principal,
    pub rule: String,
}

/// Resolved principal for the caller, exactly as the gateway sees it.
pub async fn whoami_get(Extension(ctx): Extension<AuthContext>) -> ApiResult<WhoamiResponse> {
    Ok(ApiResponse::success(WhoamiResponse {
        principal: ctx.principal,
        rule: ctx.rule,
    }))
}
