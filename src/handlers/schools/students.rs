// handlers/schools/students.rs - GET /api/schools/:school_id/students handler

use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::StudentRow;
use crate::gateway::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn students_get(
    Extension(ctx): Extension<AuthContext>,
    Path(school_id): Path<Uuid>,
) -> ApiResult<Vec<StudentRow>> {
    let students = ctx.tenant().students(school_id).await?;
    Ok(ApiResponse::success(students))
}
