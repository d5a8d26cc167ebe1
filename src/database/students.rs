use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Student profile as listed to school staff.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub school_id: Uuid,
}
