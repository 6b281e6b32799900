//! Route-prefix access table.
//!
//! Which role a route needs is data, kept in one auditable table rather than
//! spread across handlers. The gate consults it once per request, after the
//! token has been validated and before the handler runs.

use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a path demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Requirement {
    /// Anyone, including anonymous callers.
    Public,
    /// Any valid token.
    Authenticated,
    /// A valid token carrying exactly this role.
    Role(Role),
}

impl FromStr for Requirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Requirement::Public),
            "authenticated" => Ok(Requirement::Authenticated),
            _ => s.parse::<Role>().map(Requirement::Role).map_err(|_| {
                format!(
                    "unknown access requirement '{}' (expected public, authenticated or a role)",
                    s
                )
            }),
        }
    }
}

impl TryFrom<String> for Requirement {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Requirement> for String {
    fn from(value: Requirement) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Public => f.write_str("public"),
            Requirement::Authenticated => f.write_str("authenticated"),
            Requirement::Role(role) => write!(f, "{}", role),
        }
    }
}

/// One row of the access table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub prefix: String,
    pub require: Requirement,
}

impl AccessRule {
    pub fn new(prefix: impl Into<String>, require: Requirement) -> Self {
        Self {
            prefix: prefix.into(),
            require,
        }
    }

    /// Segment-aware prefix match: `/api/admin` covers `/api/admin` and
    /// `/api/admin/users` but not `/api/administrator`.
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Authorization failure, kept apart from token failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    /// The path needs a signed-in caller and there is none.
    #[error("Authentication required")]
    Unauthenticated,

    /// The caller (signed in or not) lacks the role the path requires.
    #[error("Requires role {required}")]
    Forbidden { required: Role },
}

/// Static mapping from route prefix to requirement.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
    default: Requirement,
}

impl AccessPolicy {
    /// Builds a policy; the longest matching prefix wins.
    pub fn new(mut rules: Vec<AccessRule>, default: Requirement) -> Self {
        rules.sort_by_key(|rule| std::cmp::Reverse(rule.prefix.trim_end_matches('/').len()));
        Self { rules, default }
    }

    /// The table the server ships with.
    pub fn standard() -> Self {
        Self::new(standard_rules(), Requirement::Authenticated)
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn default_requirement(&self) -> Requirement {
        self.default
    }

    pub fn requirement_for(&self, path: &str) -> Requirement {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.require)
            .unwrap_or(self.default)
    }

    /// Decides whether a caller with `role` (`None` when anonymous) may reach `path`.
    pub fn authorize(&self, path: &str, role: Option<Role>) -> Result<(), AccessDenied> {
        match (self.requirement_for(path), role) {
            (Requirement::Public, _) => Ok(()),
            (Requirement::Authenticated, Some(_)) => Ok(()),
            (Requirement::Authenticated, None) => Err(AccessDenied::Unauthenticated),
            (Requirement::Role(required), Some(actual)) if actual == required => Ok(()),
            (Requirement::Role(required), _) => Err(AccessDenied::Forbidden { required }),
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Public allow-list plus the three role-scoped areas.
pub fn standard_rules() -> Vec<AccessRule> {
    let public = [
        "/health",
        "/api/openapi.json",
        "/api/auth/signup",
        "/api/auth/login",
        "/api/auth/verify-code",
        "/api/auth/resend-code",
        "/api/auth/send-login-code",
        "/api/auth/login-code",
    ];

    public
        .into_iter()
        .map(|prefix| AccessRule::new(prefix, Requirement::Public))
        .chain([
            AccessRule::new("/api/admin", Requirement::Role(Role::Sysadmin)),
            AccessRule::new("/api/manager", Requirement::Role(Role::Manager)),
            AccessRule::new("/api/candidate", Requirement::Role(Role::Candidate)),
        ])
        .collect()
}
