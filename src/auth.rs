use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act for anyone; everyone else only for themselves.
    pub fn may_act_for(&self, subject: &str) -> bool {
        self.is_admin() || self.subject == subject
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Access denied. No token provided.")]
    Missing,
    #[error("Invalid token.")]
    Invalid,
}

/// Verifies the credential attached to a request. Issuing credentials is
/// handled elsewhere.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError>;
}

/// Static bearer tokens loaded from configuration.
#[derive(Debug, Default, Clone)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, subject: impl Into<String>, role: Role) -> Self {
        self.tokens.insert(
            token.into(),
            Principal {
                subject: subject.into(),
                role,
            },
        );
        self
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        let admins = config
            .admin_tokens
            .iter()
            .map(|(token, subject)| (token, subject, Role::Admin));
        let students = config
            .user_tokens
            .iter()
            .map(|(token, subject)| (token, subject, Role::Student));
        admins
            .chain(students)
            .fold(Self::new(), |auth, (token, subject, role)| {
                auth.with_token(token.clone(), subject.clone(), role)
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::Missing)?;
        self.tokens.get(token).cloned().ok_or(AuthError::Invalid)
    }
}
