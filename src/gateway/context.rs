use uuid::Uuid;

use crate::auth::{AuthError, Principal};
use crate::database::TenantScope;
use crate::rate_limit::RateLimitDecision;
use crate::signature::VerifiedPayload;

/// Everything a handler needs about the caller, resolved once per request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    /// Name of the policy rule that admitted the request.
    pub rule: String,
    pub rate_limit: Option<RateLimitDecision>,
    /// Present on signed routes.
    pub payload: Option<VerifiedPayload>,
    tenant: TenantScope,
}

impl AuthContext {
    pub fn new(
        principal: Principal,
        rule: impl Into<String>,
        tenant: TenantScope,
        rate_limit: Option<RateLimitDecision>,
        payload: Option<VerifiedPayload>,
    ) -> Self {
        Self {
            principal,
            rule: rule.into(),
            rate_limit,
            payload,
            tenant,
        }
    }

    pub fn tenant(&self) -> &TenantScope {
        &self.tenant
    }

    /// Check a row discovered by the handler against the caller's school.
    pub fn ensure_tenant(&self, row_school: Uuid) -> Result<(), AuthError> {
        self.tenant.ensure_owns(row_school)
    }
}
