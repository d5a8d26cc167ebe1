use uuid::Uuid;

use super::rule::PolicyRule;
use crate::auth::{scopes, AuthError, CredentialSource, Principal};

/// The school a request targets, taken from the `:school_id` path parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantTarget {
    None,
    School(Uuid),
    Unparsable(String),
}

impl TenantTarget {
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            None => TenantTarget::None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => TenantTarget::School(id),
                Err(_) => TenantTarget::Unparsable(raw.to_string()),
            },
        }
    }

    pub fn school_id(&self) -> Option<Uuid> {
        match self {
            TenantTarget::School(id) => Some(*id),
            _ => None,
        }
    }
}

/// Role, scope and tenant decisions for one principal against one rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine {
    audit_logging: bool,
}

impl PolicyEngine {
    pub fn new(audit_logging: bool) -> Self {
        Self { audit_logging }
    }

    pub fn authorize(
        &self,
        principal: &Principal,
        rule: &PolicyRule,
        target: &TenantTarget,
    ) -> Result<(), AuthError> {
        match principal.kind() {
            Some(kind) if rule.admits(kind) => {}
            _ => return deny(principal, rule, "credential kind not accepted by route"),
        }

        if !rule.allowed_roles.is_empty() {
            match principal.role {
                Some(role) if rule.allowed_roles.contains(&role) => {}
                Some(role) => return deny(principal, rule, &format!("role {} not allowed", role)),
                None => return deny(principal, rule, "route requires a user role"),
            }
        }

        // Sessions carry the full authority of their role; scopes only
        // narrow tokens and API keys.
        if principal.is_scoped() {
            if let Some(missing) = rule.required_scopes.iter().find(|s| !principal.has_scope(s)) {
                return deny(principal, rule, &format!("missing scope {}", missing));
            }
        }

        if let (CredentialSource::Bearer { .. }, Some(role)) = (&principal.source, principal.role) {
            if let Some(scope) = scopes::first_invalid_for_role(&principal.scopes, role) {
                return deny(principal, rule, &format!("scope {} not valid for role {}", scope, role));
            }
        }

        if rule.tenant_isolation {
            self.check_tenant(principal, rule, target)?;
        }

        tracing::debug!("Allowed {} on {}", principal.describe(), rule.name);
        Ok(())
    }

    fn check_tenant(
        &self,
        principal: &Principal,
        rule: &PolicyRule,
        target: &TenantTarget,
    ) -> Result<(), AuthError> {
        let target_school = match target {
            TenantTarget::School(id) => *id,
            TenantTarget::Unparsable(raw) => {
                return deny(principal, rule, &format!("unparsable school id '{}'", raw))
            }
            TenantTarget::None => return deny(principal, rule, "no tenant target"),
        };

        if principal.school_id == Some(target_school) {
            return Ok(());
        }

        if principal.is_super_admin() {
            self.audit_bypass(principal, rule, target_school);
            return Ok(());
        }

        match principal.school_id {
            Some(own) => deny(
                principal,
                rule,
                &format!("school {} does not match own school {}", target_school, own),
            ),
            None => deny(principal, rule, "principal belongs to no school"),
        }
    }

    fn audit_bypass(&self, principal: &Principal, rule: &PolicyRule, target_school: Uuid) {
        if self.audit_logging {
            tracing::warn!(
                target: "audit",
                principal = %principal.describe(),
                route = %rule.route,
                school_id = %target_school,
                "super_admin bypassed tenant isolation"
            );
        } else {
            tracing::debug!(
                "super_admin {} bypassed tenant isolation on {} for school {}",
                principal.describe(),
                rule.name,
                target_school
            );
        }
    }
}

fn deny(principal: &Principal, rule: &PolicyRule, reason: &str) -> Result<(), AuthError> {
    tracing::warn!("Denied {} on {}: {}", principal.describe(), rule.name, reason);
    Err(AuthError::forbidden(reason))
}

/// Row-level tenant check for data discovered after routing.
pub fn ensure_same_tenant(principal: &Principal, row_school: Uuid) -> Result<(), AuthError> {
    if principal.is_super_admin() || principal.school_id == Some(row_school) {
        Ok(())
    } else {
        tracing::warn!("Denied {} access to row of school {}", principal.describe(), row_school);
        Err(AuthError::forbidden("row belongs to another school"))
    }
}
