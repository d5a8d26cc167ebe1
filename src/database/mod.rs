pub mod students;
pub mod store;
pub mod tenant;

use thiserror::Error;

pub use students::StudentRow;
pub use store::DataStore;
pub use tenant::{ScopedError, TenantScope};

/// Errors from the data store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
