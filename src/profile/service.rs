//! Profile persistence: get, append, update.

use tracing::info;

use super::model::Profile;
use crate::error::DatabaseError;
use crate::store::Stores;

/// Reads and writes career profiles.
#[derive(Clone)]
pub struct ProfileService {
    stores: Stores,
}

impl ProfileService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Current profile, or an empty one if none was saved yet.
    pub async fn get(&self, user_id: &str, force_primary: bool) -> Result<Profile, DatabaseError> {
        Ok(self
            .stores
            .reader(force_primary)
            .get_profile(user_id)
            .await?
            .unwrap_or_default())
    }

    /// Current profile read through the write path, so it reflects every
    /// append and update made through this service.
    pub async fn get_latest(&self, user_id: &str) -> Result<Profile, DatabaseError> {
        Ok(self
            .stores
            .writer()
            .get_profile(user_id)
            .await?
            .unwrap_or_default())
    }

    /// Whether a profile has been saved for the user.
    pub async fn exists(&self, user_id: &str, force_primary: bool) -> Result<bool, DatabaseError> {
        Ok(self
            .stores
            .reader(force_primary)
            .get_profile(user_id)
            .await?
            .is_some())
    }

    /// Merge `partial` into the stored profile. Fields set in `partial` win.
    pub async fn append(&self, user_id: &str, partial: Profile) -> Result<Profile, DatabaseError> {
        // Read-modify-write stays on the write path so it sees its own writes.
        let db = self.stores.writer();
        let mut profile = db.get_profile(user_id).await?.unwrap_or_default();
        profile.merge(partial);
        db.put_profile(user_id, &profile).await?;
        info!(user_id, "Profile appended");
        Ok(profile)
    }

    /// Replace the stored profile.
    pub async fn update(&self, user_id: &str, full: Profile) -> Result<Profile, DatabaseError> {
        self.stores.writer().put_profile(user_id, &full).await?;
        info!(user_id, "Profile replaced");
        Ok(full)
    }
}
