//! Process-local store and identity directory.
//!
//! Backs `database.backend = "memory"` and the integration tests. Accounts
//! are bearer tokens registered up front; there is no login flow.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::DevUser;
use crate::security::access_control::{Profile, Role, Session};
use crate::security::session::{AuthError, IdentityProvider};
use crate::store::{
    sort_by_deadline, Competition, CompetitionFilter, CompetitionPatch, NewCompetition, NewRegistration,
    Registration, RegistrationFilter, RegistrationStatus, Store, StoreError, StoreResult,
};

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    email: String,
    role: Role,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    competitions: DashMap<Uuid, Competition>,
    registrations: DashMap<Uuid, Registration>,
    /// (competition, lowercased email) → registration id
    registration_index: DashMap<(Uuid, String), Uuid>,
    accounts: DashMap<String, Account>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: &[DevUser]) -> Self {
        let store = Self::new();
        for user in users {
            store.add_user(&user.token, &user.user_id, &user.email, user.role);
        }
        store
    }

    /// Register a bearer token for an account.
    pub fn add_user(&self, token: &str, user_id: &str, email: &str, role: Role) {
        self.accounts.insert(
            token.to_string(),
            Account {
                user_id: user_id.to_string(),
                email: email.to_lowercase(),
                role,
            },
        );
    }

    pub fn competition_count(&self) -> usize {
        self.competitions.len()
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn scoped(self: Arc<Self>, _access_token: Option<&str>) -> Arc<dyn Store> {
        self
    }

    async fn list_competitions(&self, filter: &CompetitionFilter) -> StoreResult<Vec<Competition>> {
        let mut found: Vec<Competition> = self
            .competitions
            .iter()
            .filter(|c| filter.matches(c.value()))
            .map(|c| c.value().clone())
            .collect();
        sort_by_deadline(&mut found);
        Ok(found)
    }

    async fn get_competition(&self, id: Uuid) -> StoreResult<Competition> {
        self.competitions
            .get(&id)
            .map(|c| c.value().clone())
            .ok_or_else(|| StoreError::NotFound("Competition not found".to_string()))
    }

    async fn create_competition(&self, new: NewCompetition) -> StoreResult<Competition> {
        let competition = Competition {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            category: new.category,
            organizer: new.organizer,
            location: new.location,
            prize: new.prize,
            poster_url: new.poster_url,
            registration_deadline: new.registration_deadline,
            start_date: new.start_date,
            end_date: new.end_date,
            max_participants: new.max_participants,
            created_by: new.created_by,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.competitions.insert(competition.id, competition.clone());
        Ok(competition)
    }

    async fn update_competition(&self, id: Uuid, patch: CompetitionPatch) -> StoreResult<Competition> {
        let mut entry = self
            .competitions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("Competition not found".to_string()))?;
        patch.apply(entry.value_mut());
        entry.updated_at = Some(Utc::now());
        Ok(entry.value().clone())
    }

    async fn delete_competition(&self, id: Uuid) -> StoreResult<()> {
        if self.competitions.remove(&id).is_none() {
            return Err(StoreError::NotFound("Competition not found".to_string()));
        }
        self.registrations.retain(|_, r| r.competition_id != id);
        self.registration_index.retain(|(competition_id, _), _| *competition_id != id);
        Ok(())
    }

    async fn find_registration(&self, competition_id: Uuid, email: &str) -> StoreResult<Option<Registration>> {
        let key = (competition_id, email.to_lowercase());
        Ok(self
            .registration_index
            .get(&key)
            .and_then(|id| self.registrations.get(id.value()).map(|r| r.value().clone())))
    }

    async fn create_registration(&self, new: NewRegistration) -> StoreResult<Registration> {
        let email = new.email.to_lowercase();
        let registration = Registration {
            id: Uuid::new_v4(),
            competition_id: new.competition_id,
            user_id: new.user_id,
            full_name: new.full_name,
            email: email.clone(),
            phone: new.phone,
            institution: new.institution,
            notes: new.notes,
            status: new.status,
            created_at: Utc::now(),
            reviewed_by: None,
            reviewed_at: None,
        };

        match self.registration_index.entry((new.competition_id, email)) {
            Entry::Occupied(_) => Err(StoreError::Conflict(
                "Already registered for this competition".to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(registration.id);
                self.registrations.insert(registration.id, registration.clone());
                Ok(registration)
            }
        }
    }

    async fn list_registrations(&self, filter: &RegistrationFilter) -> StoreResult<Vec<Registration>> {
        let mut found: Vec<Registration> = self
            .registrations
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn review_registration(
        &self,
        id: Uuid,
        status: RegistrationStatus,
        reviewer: &str,
    ) -> StoreResult<Registration> {
        let mut entry = self
            .registrations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("Registration not found".to_string()))?;
        entry.status = status;
        entry.reviewed_by = Some(reviewer.to_string());
        entry.reviewed_at = Some(Utc::now());
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl IdentityProvider for MemoryStore {
    async fn session_from_token(&self, access_token: &str) -> Result<Option<Session>, AuthError> {
        Ok(self.accounts.get(access_token).map(|account| Session {
            user_id: account.user_id.clone(),
            email: Some(account.email.clone()),
            access_token: access_token.to_string(),
        }))
    }

    async fn profile(&self, session: &Session) -> Result<Option<Profile>, AuthError> {
        Ok(self
            .accounts
            .iter()
            .find(|a| a.value().user_id == session.user_id)
            .map(|a| Profile {
                role: a.value().role,
                email: Some(a.value().email.clone()),
            }))
    }
}
