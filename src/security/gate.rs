//! The request gate: rate limit, resolve identity, apply access policy.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::HeaderMap;

use crate::config::GateConfig;
use crate::security::access_control::{AccessDecision, AccessPolicy, Caller, Identity, Profile, Session};
use crate::security::rate_limit::{client_key, FixedWindowLimiter, LimitSettings, RateDecision};
use crate::security::session::{access_token_from_headers, IdentityProvider};

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Continue to the handler with this caller attached.
    Pass(Caller),
    /// Send the client elsewhere.
    Redirect(String),
    /// Too many requests from this client.
    RateLimited { retry_after_secs: u64 },
}

/// Reloadable part of the gate.
#[derive(Debug)]
struct GateRules {
    policy: AccessPolicy,
    rate_limit_enabled: bool,
    rate_limited_prefixes: Vec<String>,
    lookup_timeout: Duration,
}

impl GateRules {
    fn from_config(config: &GateConfig) -> Self {
        Self {
            policy: AccessPolicy::from_config(config),
            rate_limit_enabled: config.rate_limit.enabled,
            rate_limited_prefixes: config.rate_limit.prefixes.clone(),
            lookup_timeout: Duration::from_millis(config.lookup_timeout_ms),
        }
    }

    fn is_rate_limited(&self, path: &str) -> bool {
        self.rate_limit_enabled
            && self
                .rate_limited_prefixes
                .iter()
                .any(|p| path.starts_with(p.as_str()))
    }
}

pub struct RequestGate {
    limiter: Arc<FixedWindowLimiter>,
    rules: ArcSwap<GateRules>,
    provider: Arc<dyn IdentityProvider>,
}

impl RequestGate {
    pub fn new(config: &GateConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::new(LimitSettings::from(&config.rate_limit)));
        Self::with_limiter(config, provider, limiter)
    }

    pub fn with_limiter(
        config: &GateConfig,
        provider: Arc<dyn IdentityProvider>,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Self {
        Self {
            limiter,
            rules: ArcSwap::from_pointee(GateRules::from_config(config)),
            provider,
        }
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    /// Apply a new gate configuration. Limiter counts survive.
    pub fn reload(&self, config: &GateConfig) {
        self.rules.store(Arc::new(GateRules::from_config(config)));
        self.limiter.update_settings(LimitSettings::from(&config.rate_limit));
        tracing::info!(
            privileged = config.privileged_emails.len(),
            max_requests = config.rate_limit.max_requests,
            window_secs = config.rate_limit.window_secs,
            "Gate configuration reloaded"
        );
    }

    /// Evaluate one inbound request.
    pub async fn evaluate(&self, path: &str, headers: &HeaderMap) -> GateOutcome {
        let rules = self.rules.load_full();

        // Throttle before paying for any auth lookup.
        if rules.is_rate_limited(path) {
            let key = client_key(headers);
            if let RateDecision::Reject { retry_after_secs } = self.limiter.check(&key) {
                tracing::warn!(client = %key, path, retry_after_secs, "Rate limit exceeded");
                return GateOutcome::RateLimited { retry_after_secs };
            }
        }

        let session = self.resolve_session(headers, rules.lookup_timeout).await;
        let profile = match &session {
            Some(session) => self.resolve_profile(session, rules.lookup_timeout).await,
            None => None,
        };

        match rules.policy.authorize(path, session.as_ref(), profile.as_ref()) {
            AccessDecision::RedirectTo(location) => {
                tracing::debug!(path, location = %location, "Access denied, redirecting");
                GateOutcome::Redirect(location)
            }
            AccessDecision::Allow => {
                let identity = session.map(|session| {
                    let staff = rules.policy.is_staff(&session, profile.as_ref());
                    Identity {
                        session,
                        profile: profile.unwrap_or_default(),
                        staff,
                    }
                });
                GateOutcome::Pass(Caller(identity))
            }
        }
    }

    /// Any failure here leaves the request without a session.
    async fn resolve_session(&self, headers: &HeaderMap, limit: Duration) -> Option<Session> {
        let token = match access_token_from_headers(headers) {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unreadable credentials");
                return None;
            }
        };

        match tokio::time::timeout(limit, self.provider.session_from_token(&token)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Session lookup failed");
                None
            }
            Err(_) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "Session lookup timed out");
                None
            }
        }
    }

    /// Failures fall back to no profile, which the policy treats as a student.
    async fn resolve_profile(&self, session: &Session, limit: Duration) -> Option<Profile> {
        match tokio::time::timeout(limit, self.provider.profile(session)).await {
            Ok(Ok(profile)) => profile,
            Ok(Err(e)) => {
                tracing::warn!(user_id = %session.user_id, error = %e, "Profile lookup failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %session.user_id,
                    timeout_ms = limit.as_millis() as u64,
                    "Profile lookup timed out"
                );
                None
            }
        }
    }
}
