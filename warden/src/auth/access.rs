//! Path-prefix authorization rules.
//!
//! Rules are checked in order and the first rule whose prefix matches the request path decides.
//! A prefix matches the path itself and anything below it on a segment boundary, so `/admin`
//! covers `/admin/users` but not `/administrator`.

use serde::Deserialize;

use crate::{errors::Error, types::Role};

/// What a matched path requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// No identity needed
    Public,
    /// Any authenticated account
    Authenticated,
    /// An authenticated account holding one of these roles
    Roles(Vec<Role>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessRule {
    pub prefix: String,
    pub access: Access,
}

impl AccessRule {
    pub fn new(prefix: &str, access: Access) -> Self {
        Self {
            prefix: prefix.to_string(),
            access,
        }
    }

    fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.trim_end_matches('/');
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Ordered rule table; paths matching no rule require authentication.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// The requirement for `path`
    pub fn requirement(&self, path: &str) -> &Access {
        const DEFAULT: &Access = &Access::Authenticated;
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map_or(DEFAULT, |rule| &rule.access)
    }

    /// Decide whether a caller with `role` (None when unauthenticated) may reach `path`
    pub fn check(&self, path: &str, role: Option<Role>) -> Result<(), Error> {
        let requirement = self.requirement(path);
        if *requirement == Access::Public {
            return Ok(());
        }

        let Some(role) = role else {
            return Err(Error::Unauthenticated {
                message: Some("Authentication required".to_string()),
            });
        };

        match requirement {
            Access::Roles(allowed) if !allowed.contains(&role) => Err(Error::Forbidden {
                message: "Access denied".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_access_rules;
    use axum::http::StatusCode;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(default_access_rules())
    }

    #[test]
    fn test_public_prefixes_need_no_identity() {
        let policy = policy();
        assert!(policy.check("/auth/token", None).is_ok());
        assert!(policy.check("/public/health", None).is_ok());
    }

    #[test]
    fn test_prefix_matches_on_segment_boundary() {
        let rule = AccessRule::new("/admin", Access::Public);
        assert!(rule.matches("/admin"));
        assert!(rule.matches("/admin/users/3"));
        assert!(!rule.matches("/administrator"));
        assert!(!rule.matches("/api/admin"));

        let trailing = AccessRule::new("/admin/", Access::Public);
        assert!(trailing.matches("/admin/users"));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let policy = policy();
        // The MASTER-only rule precedes the general /admin rule
        assert_eq!(
            policy.requirement("/admin/administrators/users/1"),
            &Access::Roles(vec![Role::Master])
        );
        assert_eq!(
            policy.requirement("/admin/users/1"),
            &Access::Roles(vec![Role::Admin, Role::Master])
        );
    }

    #[test]
    fn test_unmatched_paths_require_authentication() {
        let policy = policy();
        assert_eq!(policy.requirement("/somewhere/else"), &Access::Authenticated);

        let err = policy.check("/somewhere/else", None).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Authentication required");
        assert!(policy.check("/somewhere/else", Some(Role::User)).is_ok());
    }

    #[test]
    fn test_role_mismatch_is_forbidden() {
        let policy = policy();
        let err = policy.check("/admin/users", Some(Role::User)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.user_message(), "Access denied");

        assert!(policy.check("/admin/users", Some(Role::Admin)).is_ok());
        assert!(policy.check("/master/users/2", Some(Role::Admin)).is_err());
        assert!(policy.check("/master/users/2", Some(Role::Master)).is_ok());
    }

    #[test]
    fn test_protected_route_without_identity_is_unauthenticated() {
        let err = policy().check("/admin/users", None).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_user_routes_open_to_every_role() {
        let policy = policy();
        for role in Role::ALL {
            assert!(policy.check("/user/me", Some(role)).is_ok());
        }
    }
}
