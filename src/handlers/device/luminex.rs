// handlers/device/luminex.rs - POST /api/device/luminex/activate handler

use axum::Extension;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::gateway::{AuthContext, DEFAULT_DEVICE_CLASS};
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct Activation {
    pub device_id: String,
    pub device_class: String,
    pub activated: bool,
    /// Signed timestamp from the device, when it sent one.
    pub signed_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
}

/// Acknowledge a device activation. The gateway has already checked the
/// signature, freshness window and replay guard.
pub async fn activate_post(Extension(ctx): Extension<AuthContext>) -> ApiResult<Activation> {
    let verified = ctx.payload.ok_or_else(|| {
        tracing::error!("Activation reached handler without a verified payload");
        ApiError::internal_server_error("activation unavailable")
    })?;

    let device_id = verified
        .payload
        .get("device_id")
        .and_then(|v| v.as_str())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("device_id is required"))?
        .to_string();

    let device_class = verified
        .device_class
        .unwrap_or_else(|| DEFAULT_DEVICE_CLASS.to_string());
    tracing::info!("Activated device {} ({})", device_id, device_class);

    Ok(ApiResponse::created(Activation {
        device_id,
        device_class,
        activated: true,
        signed_at: verified.timestamp,
        received_at: Utc::now(),
    }))
}
