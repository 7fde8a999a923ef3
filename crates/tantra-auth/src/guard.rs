//! Access guard for protected views

use std::fmt;

use tantra_api::DEFAULT_AUTH_REDIRECT;
use tantra_config::AuthConfig;
use tantra_core::UserRole;

use crate::context::{AuthContext, AuthState};

/// The requirement a user failed to meet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Role(UserRole),
    Permission(String),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Role(role) => write!(f, "role ({})", role),
            Requirement::Permission(permission) => write!(f, "permission ({})", permission),
        }
    }
}

/// Outcome of evaluating a guard
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Session still resolving; show a placeholder
    Loading,
    /// Not signed in; `from` is the location to return to after login
    Redirect { to: String, from: String },
    Denied {
        missing: Requirement,
        current_role: UserRole,
        current_permissions: Vec<String>,
    },
    Allow,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    /// User-facing explanation for a denial
    pub fn denial_message(&self) -> Option<String> {
        let GuardDecision::Denied {
            missing,
            current_role,
            current_permissions,
        } = self
        else {
            return None;
        };

        let current = match missing {
            Requirement::Role(_) => format!("Your current role: {}", current_role),
            Requirement::Permission(_) if current_permissions.is_empty() => {
                "Your permissions: None".to_string()
            }
            Requirement::Permission(_) => {
                format!("Your permissions: {}", current_permissions.join(", "))
            }
        };
        Some(format!(
            "You don't have the required {} to access this page. {}",
            missing, current
        ))
    }
}

/// Role / permission gate in front of a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGuard {
    required_role: Option<UserRole>,
    required_permission: Option<String>,
    fallback_path: String,
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self {
            required_role: None,
            required_permission: None,
            fallback_path: DEFAULT_AUTH_REDIRECT.to_string(),
        }
    }
}

impl AccessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::default().fallback_path(&config.fallback_path)
    }

    pub fn require_role(mut self, role: UserRole) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn require_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }

    pub fn fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = path.into();
        self
    }

    /// Role is checked before permission.
    pub fn evaluate(&self, state: &AuthState, location: &str) -> GuardDecision {
        let user = match state {
            AuthState::Loading => return GuardDecision::Loading,
            AuthState::Unauthenticated => {
                return GuardDecision::Redirect {
                    to: self.fallback_path.clone(),
                    from: location.to_string(),
                }
            }
            AuthState::Authenticated(user) => user,
        };

        let missing = match (&self.required_role, &self.required_permission) {
            (Some(role), _) if !user.has_role(*role) => Some(Requirement::Role(*role)),
            (_, Some(permission)) if !user.has_permission(permission) => {
                Some(Requirement::Permission(permission.clone()))
            }
            _ => None,
        };

        match missing {
            Some(missing) => GuardDecision::Denied {
                missing,
                current_role: user.role,
                current_permissions: user.permissions.clone(),
            },
            None => GuardDecision::Allow,
        }
    }

    pub fn check(&self, auth: &AuthContext, location: &str) -> GuardDecision {
        self.evaluate(&auth.state(), location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantra_core::User;

    fn signed_in(role: UserRole, permissions: &[&str]) -> AuthState {
        AuthState::Authenticated(User {
            id: "u-1".into(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            created_at: None,
            last_login: None,
            is_active: true,
        })
    }

    #[test]
    fn test_loading_shows_placeholder() {
        let guard = AccessGuard::new().require_role(UserRole::Admin);
        assert_eq!(guard.evaluate(&AuthState::Loading, "/admin"), GuardDecision::Loading);
    }

    #[test]
    fn test_unauthenticated_redirect_keeps_origin() {
        let guard = AccessGuard::from_config(&AuthConfig {
            fallback_path: "/login".into(),
        });
        assert_eq!(
            guard.evaluate(&AuthState::Unauthenticated, "/chat?session=7"),
            GuardDecision::Redirect {
                to: "/login".into(),
                from: "/chat?session=7".into(),
            }
        );
    }

    #[test]
    fn test_role_checked_before_permission() {
        let guard = AccessGuard::new()
            .require_role(UserRole::Admin)
            .require_permission("system:write");
        let decision = guard.evaluate(&signed_in(UserRole::User, &[]), "/admin");

        assert_eq!(
            decision,
            GuardDecision::Denied {
                missing: Requirement::Role(UserRole::Admin),
                current_role: UserRole::User,
                current_permissions: vec![],
            }
        );
        assert_eq!(
            decision.denial_message().unwrap(),
            "You don't have the required role (admin) to access this page. Your current role: user"
        );
    }

    #[test]
    fn test_missing_permission_lists_current_permissions() {
        let guard = AccessGuard::new().require_permission("system:write");
        let decision = guard.evaluate(&signed_in(UserRole::Admin, &["system:read", "logs:read"]), "/admin");

        assert!(!decision.is_allowed());
        assert_eq!(
            decision.denial_message().unwrap(),
            "You don't have the required permission (system:write) to access this page. Your permissions: system:read, logs:read"
        );

        let bare = guard.evaluate(&signed_in(UserRole::Admin, &[]), "/admin");
        assert!(bare.denial_message().unwrap().ends_with("Your permissions: None"));
    }

    #[test]
    fn test_allow_when_requirements_met() {
        let guard = AccessGuard::new()
            .require_role(UserRole::Developer)
            .require_permission("debug:read");
        let decision = guard.evaluate(&signed_in(UserRole::Developer, &["debug:read"]), "/dev");
        assert!(decision.is_allowed());
        assert!(decision.denial_message().is_none());

        assert!(AccessGuard::new()
            .evaluate(&signed_in(UserRole::User, &[]), "/")
            .is_allowed());
    }
}
