// handlers/device/mod.rs - Device protocol handlers (HMAC-signed, no session)

pub mod luminex; // POST /api/device/luminex/activate

pub use luminex::activate_post;
