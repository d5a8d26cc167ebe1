//! The single entry point route handlers go through: resolve the caller,
//! authorize against the route's policy, verify signed payloads and charge
//! the rate limit.

pub mod context;
pub mod facade;

pub use context::AuthContext;
pub use facade::{Gateway, GatewayError, GatewayRequest, DEFAULT_DEVICE_CLASS, DEVICE_CLASS_HEADER};
