use async_trait::async_trait;
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{Session, SessionProvider};

use crate::jwt::validate_token;

/// Session provider backed by a configured access token.
///
/// An empty token means "no session yet" (e.g. right after a login
/// redirect) and yields `None` rather than an error; so does an invalid
/// or expired token.
pub struct TokenSessionProvider {
    access_token: String,
    jwt_secret: String,
}

impl TokenSessionProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            access_token: config.supabase_access_token.clone(),
            jwt_secret: config.supabase_jwt_secret.clone(),
        }
    }
}

#[async_trait]
impl SessionProvider for TokenSessionProvider {
    async fn current_session(&self) -> Option<Session> {
        if self.access_token.is_empty() {
            return None;
        }

        match validate_token(&self.access_token, &self.jwt_secret) {
            Ok(user) => Some(Session {
                access_token: self.access_token.clone(),
                user,
            }),
            Err(reason) => {
                debug!("No usable session: {}", reason);
                None
            }
        }
    }
}

/// Provider that always reports a signed-out state.
pub struct NoSessionProvider;

#[async_trait]
impl SessionProvider for NoSessionProvider {
    async fn current_session(&self) -> Option<Session> {
        None
    }
}
