//! Competition and registration storage.
//!
//! # Data Flow
//! ```text
//! api handlers
//!     → Store (trait object, scoped to the caller's access token)
//!         → supabase::SupabaseClient (PostgREST over HTTPS)
//!         → memory::MemoryStore (process-local, dev and tests)
//! ```
//!
//! Emails are stored lowercased so duplicate checks are exact matches.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A published competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competition {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub prize: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub registration_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Competition {
    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        self.registration_deadline.is_none_or(|deadline| now <= deadline)
    }
}

/// A validated competition ready to insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCompetition {
    pub title: String,
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
    pub created_by: Option<String>,
}

/// Fields to change on an existing competition. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
}

impl CompetitionPatch {
    pub fn apply(&self, competition: &mut Competition) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = &self.$field { competition.$field = v.clone().into(); })*
            };
        }
        set!(title);
        set!(description, category, organizer, location, prize, poster_url);
        set!(registration_deadline, start_date, end_date, max_participants);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompetitionFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl CompetitionFilter {
    pub fn matches(&self, competition: &Competition) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|c| competition.category.as_deref() == Some(c));
        let search_ok = self.search.as_deref().is_none_or(|term| {
            competition
                .title
                .to_lowercase()
                .contains(&term.to_lowercase())
        });
        category_ok && search_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

/// A student's registration for a competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub competition_id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRegistration {
    pub competition_id: Uuid,
    pub user_id: Option<String>,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub notes: Option<String>,
    pub status: RegistrationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFilter {
    pub competition_id: Option<Uuid>,
    pub email: Option<String>,
    pub status: Option<RegistrationStatus>,
}

impl RegistrationFilter {
    pub fn matches(&self, registration: &Registration) -> bool {
        self.competition_id.is_none_or(|id| registration.competition_id == id)
            && self.email.as_deref().is_none_or(|e| registration.email == e)
            && self.status.is_none_or(|s| registration.status == s)
    }
}

/// Storage for competitions and registrations.
#[async_trait]
pub trait Store: Send + Sync {
    /// A handle acting on behalf of `access_token`, or anonymously.
    fn scoped(self: Arc<Self>, access_token: Option<&str>) -> Arc<dyn Store>;

    async fn list_competitions(&self, filter: &CompetitionFilter) -> StoreResult<Vec<Competition>>;

    async fn get_competition(&self, id: Uuid) -> StoreResult<Competition>;

    async fn create_competition(&self, new: NewCompetition) -> StoreResult<Competition>;

    async fn update_competition(&self, id: Uuid, patch: CompetitionPatch) -> StoreResult<Competition>;

    async fn delete_competition(&self, id: Uuid) -> StoreResult<()>;

    async fn find_registration(&self, competition_id: Uuid, email: &str) -> StoreResult<Option<Registration>>;

    async fn create_registration(&self, new: NewRegistration) -> StoreResult<Registration>;

    async fn list_registrations(&self, filter: &RegistrationFilter) -> StoreResult<Vec<Registration>>;

    async fn review_registration(
        &self,
        id: Uuid,
        status: RegistrationStatus,
        reviewer: &str,
    ) -> StoreResult<Registration>;
}

/// Deadline ascending, undated competitions last.
pub(crate) fn sort_by_deadline(competitions: &mut [Competition]) {
    competitions.sort_by(|a, b| match (a.registration_deadline, b.registration_deadline) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.created_at.cmp(&b.created_at),
    });
}
