//! Competition listing and management.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{json_body, non_blank, parse_id, query_params, require_staff, ApiState, Created};
use crate::http::response::{ApiError, ApiResult};
use crate::security::access_control::Caller;
use crate::store::{CompetitionFilter, CompetitionPatch, NewCompetition};

/// Body of `POST /api/competitions`.
#[derive(Debug, Default, Deserialize)]
pub struct CompetitionDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub organizer: Option<String>,
    pub location: Option<String>,
    pub prize: Option<String>,
    pub poster_url: Option<String>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_participants: Option<u32>,
}

impl CompetitionDraft {
    /// Check required fields and normalise text.
    pub fn validate(self, created_by: &str) -> ApiResult<NewCompetition> {
        let title = non_blank(self.title).ok_or_else(|| ApiError::validation("Title is required"))?;
        check_dates(self.start_date, self.end_date)?;

        Ok(NewCompetition {
            title,
            description: non_blank(self.description),
            category: non_blank(self.category),
            organizer: non_blank(self.organizer),
            location: non_blank(self.location),
            prize: non_blank(self.prize),
            poster_url: non_blank(self.poster_url),
            registration_deadline: self.registration_deadline,
            start_date: self.start_date,
            end_date: self.end_date,
            max_participants: self.max_participants,
            created_by: Some(created_by.to_string()),
        })
    }
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ApiResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(ApiError::validation("End date must not be before start date"))
        }
        _ => Ok(()),
    }
}

fn validate_patch(mut patch: CompetitionPatch) -> ApiResult<CompetitionPatch> {
    if let Some(title) = patch.title.take() {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::validation("Title must not be empty"));
        }
        patch.title = Some(title);
    }
    check_dates(patch.start_date, patch.end_date)?;
    Ok(patch)
}

/// `GET /api/competitions`
pub async fn list_competitions(
    State(state): State<ApiState>,
    caller: Caller,
    query: Result<Query<CompetitionFilter>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let filter = query_params(query)?;
    let filter = CompetitionFilter {
        category: non_blank(filter.category),
        search: non_blank(filter.search),
    };
    let competitions = state.store_for(&caller).list_competitions(&filter).await?;
    Ok(Json(json!({ "competitions": competitions })))
}

/// `GET /api/competitions/{id}`
pub async fn get_competition(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "competition")?;
    let competition = state.store_for(&caller).get_competition(id).await?;
    Ok(Json(json!({ "competition": competition })))
}

/// `POST /api/competitions`
pub async fn create_competition(
    State(state): State<ApiState>,
    caller: Caller,
    body: Result<Json<CompetitionDraft>, JsonRejection>,
) -> ApiResult<Created<Value>> {
    let identity = require_staff(&caller)?;
    let new = json_body(body)?.validate(identity.user_id())?;

    let competition = state.store_for(&caller).create_competition(new).await?;
    tracing::info!(competition_id = %competition.id, created_by = identity.user_id(), "Competition created");
    Ok((StatusCode::CREATED, Json(json!({ "competition": competition }))))
}

/// `PUT /api/competitions/{id}`
pub async fn update_competition(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<CompetitionPatch>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    require_staff(&caller)?;
    let id = parse_id(&id, "competition")?;
    let patch = validate_patch(json_body(body)?)?;

    let competition = state.store_for(&caller).update_competition(id, patch).await?;
    Ok(Json(json!({ "competition": competition })))
}

/// `DELETE /api/competitions/{id}`
pub async fn delete_competition(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let identity = require_staff(&caller)?;
    let id = parse_id(&id, "competition")?;

    state.store_for(&caller).delete_competition(id).await?;
    tracing::info!(competition_id = %id, deleted_by = identity.user_id(), "Competition deleted");
    Ok(Json(json!({ "success": true })))
}
