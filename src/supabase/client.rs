//! PostgREST client for the hosted database.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::observability::metrics;
use crate::store::{
    Competition, CompetitionFilter, CompetitionPatch, NewCompetition, NewRegistration, Registration,
    RegistrationFilter, RegistrationStatus, Store, StoreError, StoreResult,
};

const COMPETITIONS: &str = "competitions";
const REGISTRATIONS: &str = "registrations";
pub(crate) const PROFILES: &str = "profiles";

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

const UNIQUE_VIOLATION: &str = "23505";

/// Handle to a Supabase project. Cheap to clone.
#[derive(Clone)]
pub struct SupabaseClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base: Url,
    pub(crate) anon_key: String,
    access_token: Option<String>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base", &self.base.as_str())
            .field("scoped", &self.access_token.is_some())
            .finish()
    }
}

impl SupabaseClient {
    pub fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| StoreError::Upstream(format!("invalid database url: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Upstream(e.to_string()))?;

        Ok(Self {
            http,
            base,
            anon_key: config.anon_key.clone(),
            access_token: None,
        })
    }

    /// A copy that sends `access_token` so row-level security applies to the user.
    pub fn with_access_token(&self, access_token: Option<&str>) -> Self {
        Self {
            access_token: access_token.map(str::to_string),
            ..self.clone()
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base
            .join(path)
            .map_err(|e| StoreError::Upstream(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// Request with the project key and the caller's (or anon) bearer token.
    pub(crate) fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let bearer = bearer
            .or(self.access_token.as_deref())
            .unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn table(&self, method: Method, table: &str) -> Result<RequestBuilder, StoreError> {
        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        Ok(self.request(method, url, None))
    }

    /// Send and decode a row set, mapping PostgREST failures.
    pub(crate) async fn rows<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> StoreResult<Vec<T>> {
        let response = request.send().await.map_err(|e| {
            metrics::record_upstream_error(operation);
            tracing::error!(operation, error = %e, "Database request failed");
            StoreError::Upstream(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Vec<T>>().await.map_err(|e| {
                metrics::record_upstream_error(operation);
                StoreError::Upstream(format!("unexpected response body: {}", e))
            });
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: Option<PostgrestError> = serde_json::from_str(&body).ok();
        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| format!("database returned {}", status));

        if parsed.as_ref().and_then(|e| e.code.as_deref()) == Some(UNIQUE_VIOLATION)
            || status == StatusCode::CONFLICT
        {
            return Err(StoreError::Conflict(message));
        }

        metrics::record_upstream_error(operation);
        tracing::error!(operation, status = status.as_u16(), message = %message, "Database rejected request");
        Err(StoreError::Upstream(message))
    }

    async fn single<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        missing: &str,
    ) -> StoreResult<T> {
        self.rows(operation, request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(missing.to_string()))
    }
}

/// Remove characters PostgREST treats as filter syntax.
fn sanitize_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, '*' | ',' | '(' | ')' | '%'))
        .collect()
}

#[async_trait]
impl Store for SupabaseClient {
    fn scoped(self: Arc<Self>, access_token: Option<&str>) -> Arc<dyn Store> {
        Arc::new(self.with_access_token(access_token))
    }

    async fn list_competitions(&self, filter: &CompetitionFilter) -> StoreResult<Vec<Competition>> {
        let mut query = vec![
            ("select".to_string(), "*".to_string()),
            (
                "order".to_string(),
                "registration_deadline.asc.nullslast,created_at.asc".to_string(),
            ),
        ];
        if let Some(category) = &filter.category {
            query.push(("category".to_string(), format!("eq.{}", category)));
        }
        if let Some(search) = filter.search.as_deref().map(sanitize_term).filter(|s| !s.is_empty()) {
            query.push(("title".to_string(), format!("ilike.*{}*", search)));
        }
        let request = self.table(Method::GET, COMPETITIONS)?.query(&query);
        self.rows("list_competitions", request).await
    }

    async fn get_competition(&self, id: Uuid) -> StoreResult<Competition> {
        let request = self
            .table(Method::GET, COMPETITIONS)?
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        self.single("get_competition", request, "Competition not found").await
    }

    async fn create_competition(&self, new: NewCompetition) -> StoreResult<Competition> {
        let request = self
            .table(Method::POST, COMPETITIONS)?
            .header("Prefer", "return=representation")
            .json(&new);
        self.single("create_competition", request, "Competition was not created").await
    }

    async fn update_competition(&self, id: Uuid, patch: CompetitionPatch) -> StoreResult<Competition> {
        let mut body = serde_json::to_value(&patch).map_err(|e| StoreError::Upstream(e.to_string()))?;
        if let Some(map) = body.as_object_mut() {
            map.insert("updated_at".to_string(), serde_json::json!(Utc::now()));
        }
        let request = self
            .table(Method::PATCH, COMPETITIONS)?
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&body);
        self.single("update_competition", request, "Competition not found").await
    }

    async fn delete_competition(&self, id: Uuid) -> StoreResult<()> {
        let request = self
            .table(Method::DELETE, COMPETITIONS)?
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        self.single::<Competition>("delete_competition", request, "Competition not found")
            .await
            .map(|_| ())
    }

    async fn find_registration(&self, competition_id: Uuid, email: &str) -> StoreResult<Option<Registration>> {
        let request = self.table(Method::GET, REGISTRATIONS)?.query(&[
            ("select", "*".to_string()),
            ("competition_id", format!("eq.{}", competition_id)),
            ("email", format!("eq.{}", email.to_lowercase())),
            ("limit", "1".to_string()),
        ]);
        Ok(self
            .rows::<Registration>("find_registration", request)
            .await?
            .into_iter()
            .next())
    }

    async fn create_registration(&self, mut new: NewRegistration) -> StoreResult<Registration> {
        new.email = new.email.to_lowercase();
        let request = self
            .table(Method::POST, REGISTRATIONS)?
            .header("Prefer", "return=representation")
            .json(&new);
        self.single("create_registration", request, "Registration was not created").await
    }

    async fn list_registrations(&self, filter: &RegistrationFilter) -> StoreResult<Vec<Registration>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(id) = filter.competition_id {
            query.push(("competition_id", format!("eq.{}", id)));
        }
        if let Some(email) = &filter.email {
            query.push(("email", format!("eq.{}", email.to_lowercase())));
        }
        if let Some(status) = filter.status {
            query.push(("status", format!("eq.{}", status.as_str())));
        }
        let request = self.table(Method::GET, REGISTRATIONS)?.query(&query);
        self.rows("list_registrations", request).await
    }

    async fn review_registration(
        &self,
        id: Uuid,
        status: RegistrationStatus,
        reviewer: &str,
    ) -> StoreResult<Registration> {
        let body = serde_json::json!({
            "status": status,
            "reviewed_by": reviewer,
            "reviewed_at": Utc::now(),
        });
        let request = self
            .table(Method::PATCH, REGISTRATIONS)?
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&body);
        self.single("review_registration", request, "Registration not found").await
    }
}
