//! Student registration and staff review.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{json_body, non_blank, parse_id, query_params, require_session, require_staff, ApiState, Created};
use crate::http::response::{ApiError, ApiResult};
use crate::security::access_control::Caller;
use crate::store::{NewRegistration, RegistrationFilter, RegistrationStatus};

/// Body of `POST /api/competitions/register`.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationDraft {
    pub competition_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub notes: Option<String>,
}

impl RegistrationDraft {
    /// Check required fields. The email defaults to the session's.
    pub fn validate(self, user_id: &str, session_email: Option<&str>) -> ApiResult<NewRegistration> {
        let competition_id = non_blank(self.competition_id)
            .ok_or_else(|| ApiError::validation("competition_id is required"))?;
        let competition_id = parse_id(&competition_id, "competition")?;

        let full_name = non_blank(self.full_name).ok_or_else(|| ApiError::validation("full_name is required"))?;

        let email = non_blank(self.email)
            .or_else(|| session_email.map(str::to_string))
            .ok_or_else(|| ApiError::validation("email is required"))?
            .to_lowercase();
        if !looks_like_email(&email) {
            return Err(ApiError::validation("email is not a valid address"));
        }

        Ok(NewRegistration {
            competition_id,
            user_id: Some(user_id.to_string()),
            full_name,
            email,
            phone: non_blank(self.phone),
            institution: non_blank(self.institution),
            notes: non_blank(self.notes),
            status: RegistrationStatus::Pending,
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace),
        None => false,
    }
}

/// `POST /api/competitions/register`
pub async fn register(
    State(state): State<ApiState>,
    caller: Caller,
    body: Result<Json<RegistrationDraft>, JsonRejection>,
) -> ApiResult<Created<Value>> {
    let identity = require_session(&caller)?;
    let new = json_body(body)?.validate(identity.user_id(), identity.email())?;

    let store = state.store_for(&caller);
    let competition = store.get_competition(new.competition_id).await?;
    if !competition.registration_open(Utc::now()) {
        return Err(ApiError::validation("Registration for this competition has closed"));
    }

    if store.find_registration(new.competition_id, &new.email).await?.is_some() {
        return Err(ApiError::Conflict(
            "This email is already registered for the competition".to_string(),
        ));
    }

    let registration = store.create_registration(new).await?;
    tracing::info!(
        registration_id = %registration.id,
        competition_id = %registration.competition_id,
        user_id = identity.user_id(),
        "Registration created"
    );
    Ok((StatusCode::CREATED, Json(json!({ "registration": registration }))))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewBody {
    pub status: Option<RegistrationStatus>,
}

/// Parse the optional approve body; empty means approve.
fn review_status(body: &Bytes) -> ApiResult<RegistrationStatus> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RegistrationStatus::Approved);
    }
    let review: ReviewBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::validation(format!("Invalid review body: {}", e)))?;
    match review.status.unwrap_or(RegistrationStatus::Approved) {
        RegistrationStatus::Pending => Err(ApiError::validation("status must be 'approved' or 'rejected'")),
        status => Ok(status),
    }
}

/// `PUT /api/registrations/{id}/approve`
pub async fn approve(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let identity = require_staff(&caller)?;
    let id = parse_id(&id, "registration")?;
    let status = review_status(&body)?;

    let registration = state
        .store_for(&caller)
        .review_registration(id, status, identity.user_id())
        .await?;
    tracing::info!(
        registration_id = %registration.id,
        status = status.as_str(),
        reviewed_by = identity.user_id(),
        "Registration reviewed"
    );
    Ok(Json(json!({ "registration": registration })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrationQuery {
    pub competition_id: Option<String>,
    pub status: Option<RegistrationStatus>,
}

/// `GET /api/registrations`
///
/// Staff see every registration; students only their own.
pub async fn list_registrations(
    State(state): State<ApiState>,
    caller: Caller,
    query: Result<Query<RegistrationQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let identity = require_session(&caller)?;
    let query = query_params(query)?;

    let competition_id = match non_blank(query.competition_id) {
        Some(raw) => Some(parse_id(&raw, "competition")?),
        None => None,
    };

    let email = if identity.staff {
        None
    } else {
        match identity.email() {
            Some(email) => Some(email.to_lowercase()),
            None => return Ok(Json(json!({ "registrations": [] }))),
        }
    };

    let filter = RegistrationFilter {
        competition_id,
        email,
        status: query.status,
    };
    let registrations = state.store_for(&caller).list_registrations(&filter).await?;
    Ok(Json(json!({ "registrations": registrations })))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPETITION: &str = "5f0c8a52-3a0e-4a57-9a4e-0a8f1f6f2b11";

    fn draft() -> RegistrationDraft {
        RegistrationDraft {
            competition_id: Some(COMPETITION.into()),
            full_name: Some("Budi Santoso".into()),
            email: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_email_falls_back_to_session() {
        let new = draft().validate("u1", Some("Budi@Example.com")).unwrap();
        assert_eq!(new.email, "budi@example.com");
        assert_eq!(new.status, RegistrationStatus::Pending);
        assert_eq!(new.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_missing_fields_are_validation_errors() {
        assert!(matches!(draft().validate("u1", None), Err(ApiError::Validation(_))));

        let mut no_name = draft();
        no_name.full_name = Some(" ".into());
        assert!(matches!(no_name.validate("u1", Some("a@b.co")), Err(ApiError::Validation(_))));

        let mut bad_id = draft();
        bad_id.competition_id = Some("42".into());
        assert!(matches!(bad_id.validate("u1", Some("a@b.co")), Err(ApiError::Validation(_))));

        let mut bad_email = draft();
        bad_email.email = Some("not-an-email".into());
        assert!(matches!(bad_email.validate("u1", None), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_review_status_parsing() {
        assert_eq!(review_status(&Bytes::new()).unwrap(), RegistrationStatus::Approved);
        assert_eq!(
            review_status(&Bytes::from_static(br#"{"status":"rejected"}"#)).unwrap(),
            RegistrationStatus::Rejected
        );
        assert_eq!(review_status(&Bytes::from_static(b"{}")).unwrap(), RegistrationStatus::Approved);
        assert!(review_status(&Bytes::from_static(br#"{"status":"pending"}"#)).is_err());
        assert!(review_status(&Bytes::from_static(br#"{"status":"maybe"}"#)).is_err());
    }
}
