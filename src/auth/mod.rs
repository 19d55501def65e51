//! Bearer-token authentication.
//!
//! Every protected route resolves the `Authorization: Bearer <token>` header
//! to a [`Principal`] through a [`CredentialVerifier`]. The verifier is
//! injected into the app state, so deployments can swap the static token
//! table for a real identity provider.

pub mod middleware;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{AuthError, ConfigError};

pub use middleware::{RequestContext, authenticate};

/// Scope names checked by the routes.
pub mod scopes {
    pub const CHAT_READ: &str = "chat.read";
    pub const CHAT_WRITE: &str = "chat.write";
    pub const TODOS_READ: &str = "todos.read";
    pub const TODOS_WRITE: &str = "todos.write";
    pub const PROFILE_READ: &str = "profile.read";
    /// Grants every scope.
    pub const ALL: &str = "*";
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub scopes: HashSet<String>,
}

impl Principal {
    pub fn new<I, S>(user_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scopes::ALL) || self.scopes.contains(scope)
    }

    pub fn require_scope(&self, scope: &str) -> Result<(), AuthError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(AuthError::MissingScope {
                scope: scope.to_string(),
            })
        }
    }
}

/// Resolves a bearer token to a principal.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Verifier backed by a fixed token table.
///
/// The table format is `token=user:scope,scope;token2=user2:*`.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Parse a token table.
    pub fn from_table(table: &SecretString) -> Result<Self, ConfigError> {
        let mut verifier = Self::new();
        for (idx, entry) in table
            .expose_secret()
            .split(';')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .enumerate()
        {
            let invalid = |message: &str| ConfigError::InvalidValue {
                key: "API_TOKENS".to_string(),
                message: format!("entry {}: {message}", idx + 1),
            };
            let (token, rest) = entry
                .split_once('=')
                .ok_or_else(|| invalid("expected token=user:scopes"))?;
            let (user, scope_list) = rest
                .split_once(':')
                .ok_or_else(|| invalid("expected user:scopes after '='"))?;
            let (token, user) = (token.trim(), user.trim());
            if token.is_empty() || user.is_empty() {
                return Err(invalid("token and user must not be empty"));
            }
            let scopes = scope_list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty());
            verifier
                .tokens
                .insert(token.to_string(), Principal::new(user, scopes));
        }
        Ok(verifier)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
