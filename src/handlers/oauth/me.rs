// handlers/oauth/me.rs - GET /api/v1/me handler

use axum::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Role;
use crate::error::ApiError;
use crate::gateway::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub school_id: Option<Uuid>,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
}

/// Profile of the user the token acts for. Client-credential tokens and API
/// keys have no user to describe.
pub async fn me_get(Extension(ctx): Extension<AuthContext>) -> ApiResult<MeResponse> {
    let principal = ctx.principal;
    let id = principal
        .user_id
        .ok_or_else(|| ApiError::not_found("credential is not bound to a user"))?;

    Ok(ApiResponse::success(MeResponse {
        id,
        client_id: principal.client_id().map(str::to_string),
        email: principal.email,
        role: principal.role,
        school_id: principal.school_id,
        scopes: principal.scopes.into_iter().collect(),
    }))
}
