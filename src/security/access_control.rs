//! Role-based access policy for page prefixes.
//!
//! Rules, first match wins:
//! 1. protected prefix without a session → login page
//! 2. admin prefix without the admin role → dashboard
//! 3. instructor prefix unless the email is privileged or the role is admin → dashboard
//! 4. allow

use std::collections::HashSet;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;

/// Profile roles, as stored in the `profiles` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

/// A session resolved by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
}

/// A row from the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
}

/// Who is making a request, as established by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub session: Session,
    pub profile: Profile,
    /// May manage competitions and review registrations.
    pub staff: bool,
}

impl Identity {
    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    /// Session email, falling back to the profile's.
    pub fn email(&self) -> Option<&str> {
        self.session
            .email
            .as_deref()
            .or(self.profile.email.as_deref())
    }
}

/// The gate's verdict on the caller, attached to every request it lets through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.0.as_ref().map(|i| i.session.access_token.as_str())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectTo(String),
}

/// Path-prefix access rules.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    protected_prefixes: Vec<String>,
    admin_prefix: String,
    instructor_prefix: String,
    login_path: String,
    dashboard_path: String,
    privileged_emails: HashSet<String>,
}

impl AccessPolicy {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            protected_prefixes: config.protected_prefixes.clone(),
            admin_prefix: config.admin_prefix.clone(),
            instructor_prefix: config.instructor_prefix.clone(),
            login_path: config.login_path.clone(),
            dashboard_path: config.dashboard_path.clone(),
            privileged_emails: config
                .privileged_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn authorize(&self, path: &str, session: Option<&Session>, profile: Option<&Profile>) -> AccessDecision {
        let protected = self.protected_prefixes.iter().any(|p| path.starts_with(p.as_str()));
        if session.is_none() && protected {
            return AccessDecision::RedirectTo(self.login_path.clone());
        }

        // Without a session there is no profile, so the role rules still apply.
        let role = profile.map(|p| p.role).unwrap_or_default();
        let email = session.and_then(|s| s.email.as_deref());

        if path.starts_with(&self.admin_prefix) && role != Role::Admin {
            return AccessDecision::RedirectTo(self.dashboard_path.clone());
        }

        if path.starts_with(&self.instructor_prefix) && !self.is_privileged(email) && role != Role::Admin {
            return AccessDecision::RedirectTo(self.dashboard_path.clone());
        }

        AccessDecision::Allow
    }

    pub fn is_privileged(&self, email: Option<&str>) -> bool {
        email.is_some_and(|e| self.privileged_emails.contains(&e.trim().to_lowercase()))
    }

    /// Whether a caller may mutate competitions and review registrations.
    pub fn is_staff(&self, session: &Session, profile: Option<&Profile>) -> bool {
        matches!(profile.map(|p| p.role), Some(Role::Admin | Role::Instructor))
            || self.is_privileged(session.email.as_deref())
    }
}
