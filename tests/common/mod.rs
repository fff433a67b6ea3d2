//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use competition_portal::config::PortalConfig;
use competition_portal::security::access_control::Role;
use competition_portal::security::gate::RequestGate;
use competition_portal::security::rate_limit::{FixedWindowLimiter, LimitSettings, ManualClock};
use competition_portal::store::memory::MemoryStore;
use competition_portal::HttpServer;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const INSTRUCTOR_TOKEN: &str = "instructor-token";
pub const STUDENT_TOKEN: &str = "student-token";

pub const ADMIN_ID: &str = "11111111-1111-4111-8111-111111111111";
pub const INSTRUCTOR_ID: &str = "22222222-2222-4222-8222-222222222222";
pub const STUDENT_ID: &str = "33333333-3333-4333-8333-333333333333";

pub const INSTRUCTOR_EMAIL: &str = "perdhanariyan@gmail.com";
pub const STUDENT_EMAIL: &str = "siswa@example.com";

/// A portal wired to an in-memory store and a hand-driven clock.
pub struct TestPortal {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub gate: Arc<RequestGate>,
}

pub fn test_config() -> PortalConfig {
    let mut config = PortalConfig::default();
    config.gate.privileged_emails = vec![INSTRUCTOR_EMAIL.to_string()];
    config
}

pub fn portal() -> TestPortal {
    portal_with(test_config())
}

pub fn portal_with(config: PortalConfig) -> TestPortal {
    let store = Arc::new(MemoryStore::new());
    store.add_user(ADMIN_TOKEN, ADMIN_ID, "admin@example.com", Role::Admin);
    // Student profile, promoted through the privileged email list.
    store.add_user(INSTRUCTOR_TOKEN, INSTRUCTOR_ID, INSTRUCTOR_EMAIL, Role::Student);
    store.add_user(STUDENT_TOKEN, STUDENT_ID, STUDENT_EMAIL, Role::Student);

    let clock = Arc::new(ManualClock::new());
    let limiter = Arc::new(FixedWindowLimiter::with_clock(
        LimitSettings::from(&config.gate.rate_limit),
        clock.clone(),
    ));
    let gate = Arc::new(RequestGate::with_limiter(&config.gate, store.clone(), limiter));
    let server = HttpServer::with_gate(config, store.clone(), gate.clone());

    TestPortal {
        router: server.router(),
        store,
        clock,
        gate,
    }
}

pub struct Call {
    method: Method,
    uri: String,
    token: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

pub fn call(method: Method, uri: &str) -> Call {
    Call {
        method,
        uri: uri.to_string(),
        token: None,
        headers: Vec::new(),
        body: None,
    }
}

impl Call {
    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub async fn send(self, router: &Router) -> Response<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(token) = self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        let request = match self.body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
