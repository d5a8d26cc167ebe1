//! Fixed-window request budgets per caller and route class.

pub mod memory;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::auth::{CredentialSource, Principal};
use crate::policy::PolicyRule;

pub use memory::MemoryRateLimitStore;

/// Outcome of one `check_and_consume`, returned whether or not the call was
/// allowed so callers can always report the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    #[serde(skip)]
    pub reset_in: Duration,
}

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

impl RateLimitDecision {
    /// Whole seconds until the window resets, at least one.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_in.as_secs() + u64::from(self.reset_in.subsec_nanos() > 0);
        secs.max(1)
    }

    /// Informational `X-RateLimit-*` headers; the reset time is RFC 3339.
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(REMAINING_HEADER, HeaderValue::from(self.remaining));
        let reset = self.reset_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        if let Ok(value) = HeaderValue::from_str(&reset) {
            headers.insert(RESET_HEADER, value);
        }
    }
}

/// Counter storage. The in-memory store covers a single instance; a shared
/// store goes behind this trait for multi-instance deployments.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check_and_consume(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision;
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    default_budget: Option<(u32, Duration)>,
}

impl RateLimiter {
    /// `default_budget` applies to rules without their own limit.
    pub fn new(store: Arc<dyn RateLimitStore>, default_budget: Option<(u32, Duration)>) -> Self {
        Self {
            store,
            default_budget,
        }
    }

    /// Consume one request from the caller's budget for `rule`. `None` when
    /// the route is not rate limited.
    pub async fn check(
        &self,
        principal: &Principal,
        rule: &PolicyRule,
        client_ip: Option<IpAddr>,
    ) -> Option<RateLimitDecision> {
        let budget = rule.effective_rate_limit(self.default_budget)?;

        // A per-application budget replaces the route budget
        let (limit, window) = match principal.rate_limit_per_minute {
            Some(per_minute) => (per_minute, Duration::from_secs(60)),
            None => (budget.limit, budget.window),
        };

        let key = bucket_key(principal, client_ip, &budget.class);
        let decision = self.store.check_and_consume(&key, limit, window).await;

        if !decision.allowed {
            tracing::warn!(
                "Rate limited {} on {} (limit {} per {:?})",
                principal.describe(),
                rule.name,
                limit,
                window
            );
        }
        Some(decision)
    }
}

/// `<caller>|<class>`, where the caller is the user, the OAuth client, or
/// the client address for devices and anonymous callers.
pub fn bucket_key(principal: &Principal, client_ip: Option<IpAddr>, class: &str) -> String {
    let ip = client_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let caller = match (principal.caller_key(), &principal.source) {
        (Some(key), _) => key,
        (None, CredentialSource::Device { class }) => format!("device:{}:{}", class, ip),
        (None, _) => format!("ip:{}", ip),
    };

    format!("{}|{}", caller, class)
}

/// Client address. Forwarding headers (first `X-Forwarded-For` entry, then
/// `X-Real-IP`) count only when the socket peer is a trusted proxy;
/// otherwise the peer itself is the client.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted: &[IpAddr],
) -> Option<IpAddr> {
    let peer_ip = peer.map(|addr| addr.ip());
    let behind_proxy = peer_ip.map_or(false, |ip| trusted.contains(&ip));
    if !behind_proxy {
        return peer_ip;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        })
        .or(peer_ip)
}
