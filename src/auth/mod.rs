pub mod error;
pub mod principal;
pub mod scopes;

pub use error::AuthError;
pub use principal::{CredentialKind, CredentialSource, Principal, Role};
