pub mod canonicalize;
pub mod policy;
pub mod sign;
pub mod verify;
