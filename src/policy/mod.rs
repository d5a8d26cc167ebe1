//! Declarative per-route policy: who may call a route, with which
//! credentials, scopes and budget.

pub mod engine;
pub mod rule;
pub mod table;

use thiserror::Error;

pub use engine::{ensure_same_tenant, PolicyEngine, TenantTarget};
pub use rule::{PolicyRule, RateLimitRule, RouteMethod, TENANT_PARAM};
pub use table::PolicyTable;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Policy YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid policy: {0}")]
    Invalid(String),

    #[error("Invalid rule '{name}': {message}")]
    Rule { name: String, message: String },

    #[error("Duplicate rule for {0}")]
    Duplicate(String),
}
