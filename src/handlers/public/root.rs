// handlers/public/root.rs - GET / handler

use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};

pub async fn root_get() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": "Campus Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Auth & signed-request gateway for the campus platform",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "auth": "/api/auth/whoami, /api/auth/session (session)",
            "schools": "/api/schools/:school_id/students (session, tenant-isolated)",
            "oauth": "/api/v1/me, /api/v1/schools/:school_id/students (bearer or api key)",
            "device": "/api/device/luminex/activate (signed)",
        }
    })))
}
