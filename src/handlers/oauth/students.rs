// handlers/oauth/students.rs - GET /api/v1/schools/:school_id/students handler

use axum::{extract::Path, Extension};
use serde::Serialize;
use uuid::Uuid;

use crate::database::StudentRow;
use crate::gateway::AuthContext;
use crate::middleware::{ApiResponse, ApiResult};

/// Third-party view of a student; the internal profile id stays private.
#[derive(Debug, Serialize)]
pub struct ApiStudent {
    pub id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub school_id: Uuid,
}

impl From<StudentRow> for ApiStudent {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            school_id: row.school_id,
        }
    }
}

pub async fn students_get(
    Extension(ctx): Extension<AuthContext>,
    Path(school_id): Path<Uuid>,
) -> ApiResult<Vec<ApiStudent>> {
    let students = ctx.tenant().students(school_id).await?;
    for row in &students {
        ctx.ensure_tenant(row.school_id)?;
    }

    Ok(ApiResponse::success(
        students.into_iter().map(ApiStudent::from).collect(),
    ))
}
