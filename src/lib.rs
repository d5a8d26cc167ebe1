pub mod auth;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod housekeeping;
pub mod identity;
pub mod middleware;
pub mod policy;
pub mod rate_limit;
pub mod server;
pub mod signature;
