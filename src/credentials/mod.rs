pub mod cache;
pub mod extract;
pub mod resolver;

pub use cache::CredentialCache;
pub use extract::{cookie_value, extract_credentials, Credential, API_KEY_HEADER};
pub use resolver::CredentialResolver;
