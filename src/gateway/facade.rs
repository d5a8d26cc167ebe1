use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Method};
use thiserror::Error;

use super::context::AuthContext;
use crate::auth::{AuthError, Principal};
use crate::config::AppConfig;
use crate::credentials::{CredentialCache, CredentialResolver};
use crate::database::{DataStore, TenantScope};
use crate::housekeeping::Sweep;
use crate::identity::IdentityStore;
use crate::policy::{PolicyEngine, PolicyRule, PolicyTable, TenantTarget};
use crate::rate_limit::{MemoryRateLimitStore, RateLimitDecision, RateLimiter};
use crate::signature::SignatureVerifier;

pub const DEVICE_CLASS_HEADER: &str = "x-device-class";
pub const DEFAULT_DEVICE_CLASS: &str = "default";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("rate limited, retry in {}s", .0.retry_after_secs())]
    RateLimited(RateLimitDecision),

    #[error("no policy for {0}")]
    NoPolicy(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

/// The parts of an HTTP request the gateway looks at.
#[derive(Debug, Clone, Copy)]
pub struct GatewayRequest<'a> {
    pub headers: &'a HeaderMap,
    pub client_ip: Option<IpAddr>,
    /// Raw `:school_id` path parameter, when the route has one.
    pub school_param: Option<&'a str>,
    /// Buffered body; required on signed routes.
    pub body: Option<&'a [u8]>,
}

impl<'a> GatewayRequest<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self {
            headers,
            client_ip: None,
            school_param: None,
            body: None,
        }
    }

    fn device_class(&self) -> Option<&'a str> {
        self.headers
            .get(DEVICE_CLASS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

pub struct Gateway {
    resolver: Arc<CredentialResolver>,
    engine: PolicyEngine,
    verifier: Arc<SignatureVerifier>,
    limiter: RateLimiter,
    policies: Arc<PolicyTable>,
    data: DataStore,
    sweepers: Vec<Arc<dyn Sweep>>,
}

impl Gateway {
    /// Wire the gateway from configuration. The identity store and data
    /// store are created by the caller so tests can substitute them.
    pub fn from_config(
        config: &AppConfig,
        identity: Arc<dyn IdentityStore>,
        data: DataStore,
        policies: PolicyTable,
    ) -> Self {
        let cache = Arc::new(CredentialCache::new(
            Duration::from_secs(config.cache.credential_ttl_secs),
            config.cache.max_entries,
        ));
        let resolver = Arc::new(CredentialResolver::new(
            identity,
            cache.clone(),
            Duration::from_millis(config.identity.timeout_ms),
            config.identity.session_cookie.clone(),
        ));

        let buckets = Arc::new(MemoryRateLimitStore::new());
        let default_budget = config.api.enable_rate_limiting.then(|| {
            (
                config.api.rate_limit_requests,
                Duration::from_secs(config.api.rate_limit_window_secs),
            )
        });
        let limiter = RateLimiter::new(buckets.clone(), default_budget);

        let verifier = Arc::new(SignatureVerifier::from_config(&config.signature));

        let mut sweepers: Vec<Arc<dyn Sweep>> = vec![cache as Arc<dyn Sweep>, buckets as Arc<dyn Sweep>];
        if let Some(guard) = verifier.replay_guard() {
            sweepers.push(guard.clone());
        }

        Self {
            resolver,
            engine: PolicyEngine::new(config.security.enable_audit_logging),
            verifier,
            limiter,
            policies: Arc::new(policies),
            data,
            sweepers,
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn resolver(&self) -> &Arc<CredentialResolver> {
        &self.resolver
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    /// State the housekeeping task should sweep.
    pub fn sweepers(&self) -> Vec<Arc<dyn Sweep>> {
        self.sweepers.clone()
    }

    /// Rule for a matched route; unmatched routes are denied.
    /// A route the table covers only for other methods is a method error,
    /// never a handler call.
    pub fn rule_for(&self, method: &Method, route: &str) -> Result<&PolicyRule, GatewayError> {
        if let Some(rule) = self.policies.lookup(method, route) {
            return Ok(rule);
        }
        if self.policies.has_route(route) {
            tracing::debug!("{} not allowed on {}", method, route);
            return Err(GatewayError::MethodNotAllowed(format!("{} {}", method, route)));
        }
        tracing::warn!("No policy for {} {}", method, route);
        Err(GatewayError::NoPolicy(format!("{} {}", method, route)))
    }

    /// Resolve, authorize, verify and rate limit, stopping at the first
    /// failure.
    pub async fn authenticate_request(
        &self,
        request: &GatewayRequest<'_>,
        rule: &PolicyRule,
    ) -> Result<AuthContext, GatewayError> {
        let device_class = request.device_class();

        let principal = if rule.public {
            if rule.signed {
                Principal::device(device_class.unwrap_or(DEFAULT_DEVICE_CLASS))
            } else {
                Principal::anonymous()
            }
        } else {
            let principal = self.resolve(request, rule).await?;
            let target = TenantTarget::from_param(request.school_param);
            self.engine.authorize(&principal, rule, &target)?;
            principal
        };

        let payload = if rule.signed {
            let body = request
                .body
                .ok_or_else(|| AuthError::malformed("signed route without a body"))?;
            Some(self.verifier.verify_body(body, device_class).await?)
        } else {
            None
        };

        let rate_limit = self
            .limiter
            .check(&principal, rule, request.client_ip)
            .await;
        if let Some(decision) = &rate_limit {
            if !decision.allowed {
                return Err(GatewayError::RateLimited(decision.clone()));
            }
        }

        let tenant = TenantScope::new(self.data.pool().clone(), principal.clone());
        Ok(AuthContext::new(principal, rule.name.clone(), tenant, rate_limit, payload))
    }

    /// Only credentials the route admits are tried, so a browser cookie
    /// sent alongside a token cannot stand in for it.
    async fn resolve(&self, request: &GatewayRequest<'_>, rule: &PolicyRule) -> Result<Principal, AuthError> {
        let presented = self.resolver.credentials(request.headers);
        let admitted: Vec<_> = presented
            .iter()
            .filter(|credential| rule.admits(credential.kind()))
            .cloned()
            .collect();

        if admitted.is_empty() && !presented.is_empty() {
            tracing::debug!("No admitted credential for {} among {:?}", rule.name, presented);
            return Err(AuthError::unauthenticated("credential kind not accepted by route"));
        }

        self.resolver.resolve_credentials(&admitted).await
    }
}
