// handlers/public/mod.rs - Public handlers (no credential required)
//
// Still routed through the gateway so the health route is rate limited.

pub mod health; // GET /health
pub mod root; // GET /

pub use health::health_get;
pub use root::root_get;
