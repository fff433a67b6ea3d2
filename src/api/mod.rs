//! REST handlers.
//!
//! Handlers trust the [`Caller`] the gate attached; they never look at
//! credentials themselves. Validation happens before any store call.

pub mod competitions;
pub mod health;
pub mod registrations;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::http::response::{ApiError, ApiResult};
use crate::security::access_control::{Caller, Identity};
use crate::store::Store;

/// State shared by the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn Store>,
}

impl ApiState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The store acting on behalf of the caller.
    pub fn store_for(&self, caller: &Caller) -> Arc<dyn Store> {
        self.store.clone().scoped(caller.access_token())
    }
}

pub(crate) fn require_session(caller: &Caller) -> ApiResult<&Identity> {
    caller.identity().ok_or(ApiError::Unauthenticated)
}

pub(crate) fn require_staff(caller: &Caller) -> ApiResult<&Identity> {
    let identity = require_session(caller)?;
    if identity.staff {
        Ok(identity)
    } else {
        Err(ApiError::Forbidden)
    }
}

pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::validation(format!("Invalid {} id", what)))
}

/// Turn a JSON extractor failure into the error envelope.
pub(crate) fn json_body<T: DeserializeOwned>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::validation(e.body_text()))
}

/// Same for query strings.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|e| ApiError::validation(e.body_text()))
}

/// Trim, and treat blank strings as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) type Created<T> = (StatusCode, Json<T>);
