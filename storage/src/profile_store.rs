//! Sampling profiles, stored flat by name under [`PROFILES_KEY`].

use std::collections::BTreeMap;
use std::sync::Arc;

use lens_core::Profile;
use tracing::info;

use crate::error::StorageError;
use crate::kv::{get_json, set_json, KvStore};

/// Key of the profile map in the backing store.
pub const PROFILES_KEY: &str = "profiles";

#[derive(Clone)]
pub struct ProfileStore {
    backend: Arc<dyn KvStore>,
}

impl ProfileStore {
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self { backend }
    }

    async fn load(&self) -> Result<BTreeMap<String, Profile>, StorageError> {
        get_json(self.backend.as_ref(), PROFILES_KEY).await
    }

    /// Saves `profile`, replacing any profile with the same name.
    pub async fn save(&self, profile: Profile) -> Result<(), StorageError> {
        let name = profile.name.trim().to_string();
        if name.is_empty() {
            return Err(StorageError::Invalid("profile name is empty".to_string()));
        }
        let mut profiles = self.load().await?;
        let replaced = profiles.insert(name.clone(), Profile { name: name.clone(), ..profile });
        set_json(self.backend.as_ref(), PROFILES_KEY, &profiles).await?;
        info!(name = %name, replaced = replaced.is_some(), "Profile saved");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Profile>, StorageError> {
        Ok(self.load().await?.remove(name.trim()))
    }

    /// All profiles, sorted by name.
    pub async fn list(&self) -> Result<Vec<Profile>, StorageError> {
        Ok(self.load().await?.into_values().collect())
    }

    /// Deletes a profile. Returns false if no profile had that name.
    pub async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let mut profiles = self.load().await?;
        let removed = profiles.remove(name.trim()).is_some();
        if removed {
            set_json(self.backend.as_ref(), PROFILES_KEY, &profiles).await?;
            info!(name, "Profile deleted");
        }
        Ok(removed)
    }
}
