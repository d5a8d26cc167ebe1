use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform roles, as stored in `profiles.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Parent,
    Teacher,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::Parent,
        Role::Teacher,
        Role::Admin,
        Role::SuperAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Credential kinds a route can choose to admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Session,
    Bearer,
    ApiKey,
}

/// Where a principal came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    Session,
    Bearer { client_id: String },
    ApiKey { client_id: String },
    Device { class: String },
    Anonymous,
}

/// The authenticated caller of one request.
///
/// Built fresh per request from the identity store (or from the short-TTL
/// credential cache) and never written back anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub school_id: Option<Uuid>,
    pub scopes: BTreeSet<String>,
    pub source: CredentialSource,
    /// Per-application budget that replaces the route budget when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
}

impl Principal {
    /// Browser session user. Sessions carry the full authority of the role
    /// and no OAuth scopes.
    pub fn session(user_id: Uuid, email: Option<String>, role: Role, school_id: Option<Uuid>) -> Self {
        Self {
            user_id: Some(user_id),
            email,
            role: Some(role),
            school_id,
            scopes: BTreeSet::new(),
            source: CredentialSource::Session,
            rate_limit_per_minute: None,
        }
    }

    /// Machine principal for a public signed device route.
    pub fn device(class: impl Into<String>) -> Self {
        Self {
            user_id: None,
            email: None,
            role: None,
            school_id: None,
            scopes: BTreeSet::new(),
            source: CredentialSource::Device { class: class.into() },
            rate_limit_per_minute: None,
        }
    }

    /// Caller of a public route without any credential.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            email: None,
            role: None,
            school_id: None,
            scopes: BTreeSet::new(),
            source: CredentialSource::Anonymous,
            rate_limit_per_minute: None,
        }
    }

    pub fn kind(&self) -> Option<CredentialKind> {
        match self.source {
            CredentialSource::Session => Some(CredentialKind::Session),
            CredentialSource::Bearer { .. } => Some(CredentialKind::Bearer),
            CredentialSource::ApiKey { .. } => Some(CredentialKind::ApiKey),
            CredentialSource::Device { .. } | CredentialSource::Anonymous => None,
        }
    }

    /// No user behind the credential (API keys, client-credential tokens, devices).
    pub fn is_machine(&self) -> bool {
        self.user_id.is_none()
    }

    /// Scope-limited credentials: OAuth tokens and API keys.
    pub fn is_scoped(&self) -> bool {
        matches!(
            self.source,
            CredentialSource::Bearer { .. } | CredentialSource::ApiKey { .. }
        )
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Some(Role::SuperAdmin)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn client_id(&self) -> Option<&str> {
        match &self.source {
            CredentialSource::Bearer { client_id } | CredentialSource::ApiKey { client_id } => {
                Some(client_id)
            }
            _ => None,
        }
    }

    /// Identity part of the rate-limit bucket key. `None` for callers that
    /// are bucketed by address instead.
    pub fn caller_key(&self) -> Option<String> {
        if let Some(user_id) = self.user_id {
            return Some(format!("user:{}", user_id));
        }
        self.client_id().map(|client_id| format!("client:{}", client_id))
    }

    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match (&self.user_id, &self.source) {
            (Some(id), _) => format!("user {}", id),
            (None, CredentialSource::Bearer { client_id }) => format!("token client {}", client_id),
            (None, CredentialSource::ApiKey { client_id }) => format!("api key client {}", client_id),
            (None, CredentialSource::Device { class }) => format!("device {}", class),
            (None, _) => "anonymous".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("principal".parse::<Role>().is_err());
    }

    #[test]
    fn caller_key_prefers_user_over_client() {
        let user = Uuid::new_v4();
        let mut principal = Principal::session(user, None, Role::Teacher, None);
        assert_eq!(principal.caller_key(), Some(format!("user:{}", user)));

        principal.user_id = None;
        principal.source = CredentialSource::ApiKey { client_id: "roster-sync".into() };
        assert_eq!(principal.caller_key().as_deref(), Some("client:roster-sync"));

        assert_eq!(Principal::device("luminex").caller_key(), None);
    }

    #[test]
    fn only_tokens_and_keys_are_scoped() {
        let session = Principal::session(Uuid::new_v4(), None, Role::Admin, None);
        assert!(!session.is_scoped());
        assert_eq!(session.kind(), Some(CredentialKind::Session));

        let mut key = Principal::anonymous();
        key.source = CredentialSource::ApiKey { client_id: "x".into() };
        assert!(key.is_scoped());
        assert!(key.is_machine());
    }
}
