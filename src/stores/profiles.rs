//! Own profile plus the people search on the explore screen.

use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::error::{RemoteRequestError, RemoteResult};
use crate::identity::IdentityContext;
use crate::models::Profile;
use crate::remote::{Filter, Order, RemoteCollection};

pub struct ProfileStore {
    profiles: RemoteCollection<Profile>,
    identity: Arc<IdentityContext>,
}

impl ProfileStore {
    pub fn new(profiles: RemoteCollection<Profile>, identity: Arc<IdentityContext>) -> Self {
        Self { profiles, identity }
    }

    /// `None` when signed in but no profile row exists yet, which happens
    /// when the insert after sign-up failed.
    pub async fn load_own(&self) -> RemoteResult<Option<Profile>> {
        let user_id = self.require_user()?;
        let mut rows = self
            .profiles
            .list(Filter::new().eq("id", user_id.to_string()), None)
            .await?;
        Ok(rows.pop())
    }

    pub async fn by_id(&self, id: Uuid) -> RemoteResult<Option<Profile>> {
        let mut rows = self
            .profiles
            .list(Filter::new().eq("id", id.to_string()), None)
            .await?;
        Ok(rows.pop())
    }

    /// Case-insensitive substring search over username and display name.
    ///
    /// The backend only offers equality filters, so every profile is fetched
    /// and matched here.
    pub async fn search(&self, query: &str) -> RemoteResult<Vec<Profile>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let profiles = self
            .profiles
            .list(Filter::new(), Some(Order::asc("username")))
            .await?;
        let total = profiles.len();
        let matches: Vec<Profile> = profiles
            .into_iter()
            .filter(|profile| profile.matches(&needle))
            .collect();
        debug!("Profile search matched {} of {total}", matches.len());
        Ok(matches)
    }

    fn require_user(&self) -> RemoteResult<Uuid> {
        self.identity
            .current_user()
            .ok_or_else(|| RemoteRequestError::unauthorized("not signed in"))
    }
}
