//! crates/onboarding_core/src/access.rs
//!
//! Signup/login validation that happens before any backend call, plus the
//! password hashing shared by the auth adapters.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::domain::Role;
use crate::ports::{PortError, PortResult};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Only @{0} emails are allowed.")]
    DomainNotAllowed(String),
    #[error("{0} is required.")]
    MissingField(&'static str),
}

/// The institutional email allow-list, enforced identically at signup and login.
#[derive(Debug, Clone)]
pub struct EmailPolicy {
    domain: String,
    admin_emails: Vec<String>,
}

impl EmailPolicy {
    pub fn new(domain: impl Into<String>) -> Self {
        let domain: String = domain.into();
        Self {
            domain: domain.trim().trim_start_matches('@').to_lowercase(),
            admin_emails: Vec::new(),
        }
    }

    pub fn with_admins<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin_emails = emails
            .into_iter()
            .map(|e| normalize_email(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the normalised email when it belongs to the allowed domain.
    pub fn check(&self, email: &str) -> Result<String, AccessError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AccessError::MissingField("Email"));
        }
        let suffix = format!("@{}", self.domain);
        if email.len() <= suffix.len() || !email.ends_with(&suffix) {
            return Err(AccessError::DomainNotAllowed(self.domain.clone()));
        }
        Ok(email)
    }

    /// The role a freshly signed-up profile receives. Assigned once.
    pub fn role_for(&self, email: &str) -> Role {
        let email = normalize_email(email);
        if self.admin_emails.iter().any(|a| *a == email) {
            Role::Admin
        } else {
            Role::Student
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates a signup form. Returns the normalised email.
pub fn validate_signup(
    policy: &EmailPolicy,
    name: &str,
    email: &str,
    password: &str,
) -> Result<String, AccessError> {
    let email = policy.check(email)?;
    if name.trim().is_empty() {
        return Err(AccessError::MissingField("Name"));
    }
    if password.is_empty() {
        return Err(AccessError::MissingField("Password"));
    }
    Ok(email)
}

/// Validates a login form. Returns the normalised email.
pub fn validate_login(
    policy: &EmailPolicy,
    email: &str,
    password: &str,
) -> Result<String, AccessError> {
    let email = policy.check(email)?;
    if password.is_empty() {
        return Err(AccessError::MissingField("Password"));
    }
    Ok(email)
}

pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hashed: &str) -> PortResult<bool> {
    let parsed = PasswordHash::new(hashed)
        .map_err(|e| PortError::Unexpected(format!("Failed to parse password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> EmailPolicy {
        EmailPolicy::new("slu.edu").with_admins(["Dean@SLU.edu"])
    }

    #[test]
    fn rejects_foreign_domains() {
        for email in [
            "someone@gmail.com",
            "someone@slu.edu.evil.com",
            "someone@notslu.edu",
            "@slu.edu",
            "slu.edu",
        ] {
            assert_eq!(
                policy().check(email),
                Err(AccessError::DomainNotAllowed("slu.edu".to_string())),
                "{email}"
            );
        }
    }

    #[test]
    fn accepts_institutional_email_case_insensitively() {
        assert_eq!(policy().check("  Ana@SLU.EDU "), Ok("ana@slu.edu".to_string()));
    }

    #[test]
    fn domain_message_names_the_domain() {
        let err = policy().check("x@example.com").unwrap_err();
        assert_eq!(err.to_string(), "Only @slu.edu emails are allowed.");
    }

    #[test]
    fn signup_requires_name_and_password() {
        assert_eq!(
            validate_signup(&policy(), " ", "a@slu.edu", "pw"),
            Err(AccessError::MissingField("Name"))
        );
        assert_eq!(
            validate_signup(&policy(), "Ana", "a@slu.edu", ""),
            Err(AccessError::MissingField("Password"))
        );
        // The domain check comes first, as on the login form.
        assert_eq!(
            validate_login(&policy(), "a@gmail.com", ""),
            Err(AccessError::DomainNotAllowed("slu.edu".to_string()))
        );
    }

    #[test]
    fn admins_come_from_the_configured_list() {
        assert_eq!(policy().role_for("dean@slu.edu"), Role::Admin);
        assert_eq!(policy().role_for("student@slu.edu"), Role::Student);
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }
}
