// handlers/oauth/mod.rs - Third-party API (OAuth bearer tokens and API keys)
//
// Scope checks happen in the gateway; handlers only shape the response.

pub mod me; // GET /api/v1/me
pub mod students; // GET /api/v1/schools/:school_id/students

pub use me::me_get;
pub use students::students_get;
