//! Admin credential check for the HTTP basic-auth layer.

use subtle::ConstantTimeEq;

use crate::util::config::AppConfig;

/// Holds the configured admin credentials.
#[derive(Clone)]
pub struct AuthService {
    username: String,
    password: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AuthService {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.admin_user.clone(), config.admin_password.clone())
    }

    pub fn admin_username(&self) -> &str {
        &self.username
    }

    /// Compare the supplied credentials against the configured ones.
    ///
    /// Both comparisons run in constant time and are always evaluated, so
    /// timing does not reveal which of the two was wrong.
    pub fn verify_credentials(&self, username: &str, password: &str) -> bool {
        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = password.as_bytes().ct_eq(self.password.as_bytes());
        let ok: bool = (user_ok & pass_ok).into();
        if !ok {
            tracing::warn!("Rejected credentials for user {:?}", username);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_exact_match() {
        let auth = AuthService::new("admin", "s3cret");
        assert!(auth.verify_credentials("admin", "s3cret"));
    }

    #[test]
    fn test_rejects_either_mismatch() {
        let auth = AuthService::new("admin", "s3cret");
        assert!(!auth.verify_credentials("admin", "wrong"));
        assert!(!auth.verify_credentials("root", "s3cret"));
        assert!(!auth.verify_credentials("admin", "s3cret "));
        assert!(!auth.verify_credentials("", ""));
    }

    #[test]
    fn test_from_config_and_debug_redacts() {
        let config = AppConfig::from_lookup(|key| match key {
            "SIEM_ADMIN_USER" => Some("ops".into()),
            "SIEM_ADMIN_PASSWORD" => Some("hunter2".into()),
            _ => None,
        })
        .unwrap();
        let auth = AuthService::from_config(&config);
        assert_eq!(auth.admin_username(), "ops");
        assert!(auth.verify_credentials("ops", "hunter2"));
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
