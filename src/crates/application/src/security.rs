//! Security decision pipeline.
//!
//! Works out *who* is asking. It never rejects a request; the policy table decides access
//! afterwards from the `AuthorizationContext` produced here.

use crate::auth::TokenService;
use crate::context::AuthorizationContext;
use domain::user::UserRepository;
use log::{debug, warn};
use std::sync::Arc;

pub const BEARER_PREFIX: &str = "Bearer ";

/// Extracts the token from an `Authorization` header value, if it is a bearer credential.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    authorization
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[derive(Clone)]
pub struct SecurityPipeline {
    token_svc: Arc<dyn TokenService>,
    user_repo: Arc<dyn UserRepository>,
}

impl SecurityPipeline {
    pub fn new(token_svc: Arc<dyn TokenService>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            token_svc,
            user_repo,
        }
    }

    /// Resolves the context for one request from its `Authorization` header.
    ///
    /// Any failure (no credential, undecodable token, unknown subject, lookup error,
    /// bad signature, expiry, subject mismatch) yields the anonymous context.
    pub async fn resolve(&self, authorization: Option<&str>) -> AuthorizationContext {
        let Some(token) = bearer_token(authorization) else {
            return AuthorizationContext::anonymous();
        };

        // 先读出 subject，此时还不信任它
        let username = match self.token_svc.peek_subject(token) {
            Ok(username) => username,
            Err(e) => {
                debug!("bearer token ignored: {}", e);
                return AuthorizationContext::anonymous();
            }
        };

        let user = match self.user_repo.find_by_username(&username).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("bearer token subject {} does not exist", username);
                return AuthorizationContext::anonymous();
            }
            Err(e) => {
                warn!("identity lookup for {} failed: {}", username, e);
                return AuthorizationContext::anonymous();
            }
        };

        if self.token_svc.is_valid_for(token, &user) {
            AuthorizationContext::authenticated(user)
        } else {
            debug!("bearer token for {} rejected", username);
            AuthorizationContext::anonymous()
        }
    }

    /// Resolves only when `existing` is empty; an already populated context is returned as is.
    pub async fn resolve_once(
        &self,
        existing: Option<AuthorizationContext>,
        authorization: Option<&str>,
    ) -> AuthorizationContext {
        match existing {
            Some(ctx) => ctx,
            None => self.resolve(authorization).await,
        }
    }
}
