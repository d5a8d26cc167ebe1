use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use axum::http::Method;
use serde::Deserialize;

use super::PolicyError;
use crate::auth::{CredentialKind, Role};

/// Path parameter that names the tenant a request targets.
pub const TENANT_PARAM: &str = "school_id";

/// Method a rule applies to; `Any` matches every method on the route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Any,
    Exact(Method),
}

impl RouteMethod {
    pub fn parse(value: Option<&str>) -> Result<Self, PolicyError> {
        match value.map(str::trim) {
            None | Some("") | Some("*") => Ok(RouteMethod::Any),
            Some(m) if m.eq_ignore_ascii_case("any") => Ok(RouteMethod::Any),
            Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map(RouteMethod::Exact)
                .map_err(|_| PolicyError::Invalid(format!("unknown method '{}'", m))),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Any => f.write_str("ANY"),
            RouteMethod::Exact(method) => f.write_str(method.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window: Duration,
    /// Bucket grouping; routes sharing a class share a budget.
    pub class: String,
}

/// One entry of the policy table. Built only through validation, so every
/// field combination here is coherent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub name: String,
    pub route: String,
    pub method: RouteMethod,
    pub allowed_roles: BTreeSet<Role>,
    pub required_scopes: BTreeSet<String>,
    pub tenant_isolation: bool,
    pub rate_limit: Option<RateLimitRule>,
    pub signed: bool,
    pub public: bool,
    pub accept: BTreeSet<CredentialKind>,
}

impl PolicyRule {
    pub fn admits(&self, kind: CredentialKind) -> bool {
        self.accept.contains(&kind)
    }

    /// Scoped routes that admit OAuth bearer tokens.
    pub fn takes_bearer_scopes(&self) -> bool {
        !self.required_scopes.is_empty() && self.admits(CredentialKind::Bearer)
    }

    /// Rate limit for this rule, falling back to `default` (limit, window).
    pub fn effective_rate_limit(&self, default: Option<(u32, Duration)>) -> Option<RateLimitRule> {
        self.rate_limit.clone().or_else(|| {
            default.map(|(limit, window)| RateLimitRule {
                limit,
                window,
                class: self.name.clone(),
            })
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRateLimit {
    pub limit: u32,
    pub window_ms: u64,
    #[serde(default)]
    pub class: Option<String>,
}

/// A rule as written in the YAML policy file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRule {
    pub name: String,
    pub route: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
    #[serde(default)]
    pub tenant_isolation: bool,
    #[serde(default)]
    pub rate_limit: Option<RawRateLimit>,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub accept: Option<Vec<CredentialKind>>,
}

impl TryFrom<RawRule> for PolicyRule {
    type Error = PolicyError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let invalid = |msg: String| PolicyError::Rule {
            name: raw.name.clone(),
            message: msg,
        };

        if raw.name.trim().is_empty() {
            return Err(PolicyError::Invalid("rule name cannot be empty".into()));
        }
        if !raw.route.starts_with('/') {
            return Err(invalid(format!("route '{}' must start with '/'", raw.route)));
        }

        let method = RouteMethod::parse(raw.method.as_deref()).map_err(|e| invalid(e.to_string()))?;

        let allowed_roles = raw
            .allowed_roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(invalid)?;

        let required_scopes: BTreeSet<String> = raw
            .required_scopes
            .iter()
            .map(|s| s.trim().to_string())
            .collect();
        if required_scopes.iter().any(|s| s.is_empty()) {
            return Err(invalid("scopes cannot be empty strings".into()));
        }

        let rate_limit = match &raw.rate_limit {
            None => None,
            Some(rl) if rl.limit == 0 => return Err(invalid("rate_limit.limit must be > 0".into())),
            Some(rl) if rl.window_ms == 0 => {
                return Err(invalid("rate_limit.window_ms must be > 0".into()))
            }
            Some(rl) => Some(RateLimitRule {
                limit: rl.limit,
                window: Duration::from_millis(rl.window_ms),
                class: rl.class.clone().unwrap_or_else(|| raw.name.clone()),
            }),
        };

        if raw.public
            && (!allowed_roles.is_empty()
                || !required_scopes.is_empty()
                || raw.tenant_isolation
                || raw.accept.is_some())
        {
            return Err(invalid(
                "public rules cannot require roles, scopes, credentials or tenant isolation".into(),
            ));
        }

        if raw.tenant_isolation && !raw.route.contains(&format!(":{}", TENANT_PARAM)) {
            return Err(invalid(format!(
                "tenant_isolation needs a :{} route parameter",
                TENANT_PARAM
            )));
        }

        // Scoped routes are for OAuth clients; everything else is for sessions
        let accept: BTreeSet<CredentialKind> = match &raw.accept {
            Some(kinds) => kinds.iter().copied().collect(),
            None if raw.public => BTreeSet::new(),
            None if required_scopes.is_empty() => [CredentialKind::Session].into(),
            None => [CredentialKind::Bearer, CredentialKind::ApiKey].into(),
        };
        if !raw.public && accept.is_empty() {
            return Err(invalid("accept must list at least one credential kind".into()));
        }

        Ok(PolicyRule {
            name: raw.name.clone(),
            route: raw.route.clone(),
            method,
            allowed_roles,
            required_scopes,
            tenant_isolation: raw.tenant_isolation,
            rate_limit,
            signed: raw.signed,
            public: raw.public,
            accept,
        })
    }
}
