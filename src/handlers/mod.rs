// handlers/mod.rs - Route handlers grouped by how the gateway admits them
//
// Public (no credential) → Session (browser users) → OAuth (bearer tokens
// and API keys) → Device (HMAC-signed payloads)
//
// Every handler runs behind `gateway_middleware`; anything beyond the public
// tier takes the resolved `AuthContext` from the request extensions.

pub mod auth;
pub mod device;
pub mod oauth;
pub mod public;
pub mod schools;
