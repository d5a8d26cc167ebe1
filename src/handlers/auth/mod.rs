// handlers/auth/mod.rs - Session handlers for signed-in users

pub mod session; // DELETE /api/auth/session
pub mod whoami; // GET /api/auth/whoami

pub use session::session_delete;
pub use whoami::whoami_get;
