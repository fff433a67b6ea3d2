//! Session and profile lookups against the hosted auth provider.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::security::access_control::{Profile, Session};
use crate::security::session::{AuthError, IdentityProvider};
use crate::supabase::client::{SupabaseClient, PROFILES};

/// Subset of the auth provider's user object.
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn session_from_token(&self, access_token: &str) -> Result<Option<Session>, AuthError> {
        let url = self
            .endpoint("auth/v1/user")
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let response = self
            .request(Method::GET, url, Some(access_token))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let user: AuthUser = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Transport(e.to_string()))?;
                Ok(Some(Session {
                    user_id: user.id,
                    email: user.email.map(|e| e.to_lowercase()),
                    access_token: access_token.to_string(),
                }))
            }
            // expired or forged token
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(AuthError::Provider {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn profile(&self, session: &Session) -> Result<Option<Profile>, AuthError> {
        let url = self
            .endpoint(&format!("rest/v1/{}", PROFILES))
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let request = self
            .request(Method::GET, url, Some(&session.access_token))
            .query(&[
                ("select", "role,email".to_string()),
                ("id", format!("eq.{}", session.user_id)),
                ("limit", "1".to_string()),
            ]);

        let rows: Vec<Profile> = self
            .rows("get_profile", request)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}
