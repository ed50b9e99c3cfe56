// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::{require_user, AuthProvider, Feature};
use crate::entity::UserPreferences;
use crate::error::SyncError;
use crate::local::{load_setting, store_setting, SettingsStore};
use crate::sync::SyncClient;

fn settings_key(user_id: &str) -> String {
    format!("preferences:{}", user_id)
}

/// User preferences, served from the device and synced to the store.
pub struct PreferencesManager {
    client: Arc<SyncClient>,
    auth: Arc<dyn AuthProvider>,
    settings: Arc<dyn SettingsStore>,
    current: RwLock<Option<UserPreferences>>,
}

impl PreferencesManager {
    pub fn new(
        client: Arc<SyncClient>,
        auth: Arc<dyn AuthProvider>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            client,
            auth,
            settings,
            current: RwLock::new(None),
        }
    }

    /// The locally known preferences, without touching the network.
    pub async fn cached(&self) -> Result<Option<UserPreferences>, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::SyncPreferences)?;

        if let Some(prefs) = self.current.read().await.as_ref() {
            if prefs.user_id == user_id {
                return Ok(Some(prefs.clone()));
            }
        }

        let stored: Option<UserPreferences> =
            load_setting(self.settings.as_ref(), &settings_key(&user_id)).await?;
        if let Some(prefs) = &stored {
            *self.current.write().await = Some(prefs.clone());
        }
        Ok(stored)
    }

    /// Pull from the store and persist locally; defaults when nothing is stored remotely.
    pub async fn refresh(&self) -> Result<UserPreferences, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::SyncPreferences)?;
        let prefs = self
            .client
            .fetch_optional::<UserPreferences>(&UserPreferences::id_for(&user_id))
            .await?
            .unwrap_or_else(|| UserPreferences::new(user_id.as_str()));

        self.persist(&prefs).await?;
        Ok(prefs)
    }

    /// Apply locally, then save remotely. A failed save restores the previous
    /// in-memory and on-device copies exactly.
    pub async fn save(&self, prefs: UserPreferences) -> Result<UserPreferences, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::SyncPreferences)?;
        if prefs.user_id != user_id {
            return Err(SyncError::PermissionDenied(format!(
                "cannot edit preferences of {}",
                prefs.user_id
            )));
        }

        let key = settings_key(&user_id);
        let memory_snapshot = self.current.read().await.clone();
        let local_snapshot = self.settings.get_raw(&key).await?;

        self.persist(&prefs).await?;

        match self.client.save(&prefs).await {
            Ok(saved) => {
                self.persist(&saved).await?;
                debug!(user = %user_id, "Preferences saved");
                Ok(saved)
            }
            Err(e) => {
                *self.current.write().await = memory_snapshot;
                let restored = match local_snapshot {
                    Some(value) => self.settings.put_raw(&key, value).await,
                    None => self.settings.remove(&key).await,
                };
                if let Err(restore_err) = restored {
                    warn!(user = %user_id, error = %restore_err, "Failed to restore local preferences");
                }
                warn!(user = %user_id, error = %e, "Preferences save failed, rolled back");
                Err(e)
            }
        }
    }

    async fn persist(&self, prefs: &UserPreferences) -> Result<(), SyncError> {
        store_setting(self.settings.as_ref(), &settings_key(&prefs.user_id), prefs).await?;
        *self.current.write().await = Some(prefs.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionAuth;
    use crate::entity::MeasurementUnits;
    use crate::store::MemoryStore;
    use crate::test_helpers::{quick_policies, MemorySettings, ScriptedStore};

    fn setup() -> (PreferencesManager, Arc<ScriptedStore>, Arc<MemorySettings>) {
        let store = Arc::new(ScriptedStore::new(Arc::new(MemoryStore::new())));
        let client = Arc::new(SyncClient::new(store.clone(), quick_policies()));
        let settings = Arc::new(MemorySettings::new());
        let auth = Arc::new(SessionAuth::signed_in("u1"));
        (
            PreferencesManager::new(client, auth, settings.clone()),
            store,
            settings,
        )
    }

    #[tokio::test]
    async fn test_refresh_defaults_and_persists() {
        let (prefs, _, settings) = setup();
        assert_eq!(prefs.cached().await.unwrap(), None);

        let loaded = prefs.refresh().await.unwrap();
        assert_eq!(loaded, UserPreferences::new("u1"));
        assert!(settings.get_raw("preferences:u1").await.unwrap().is_some());
        assert_eq!(prefs.cached().await.unwrap(), Some(loaded));
    }

    #[tokio::test]
    async fn test_save_confirms_with_change_tag() {
        let (prefs, _, settings) = setup();
        let mut edited = UserPreferences::new("u1");
        edited.units = MeasurementUnits::Imperial;

        let saved = prefs.save(edited).await.unwrap();
        assert!(saved.meta.change_tag.is_some());

        let stored: Option<UserPreferences> =
            load_setting(&*settings, "preferences:u1").await.unwrap();
        assert_eq!(stored, Some(saved));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_both_copies() {
        let (prefs, store, settings) = setup();
        let original = prefs.refresh().await.unwrap();
        let local_before = settings.get_raw("preferences:u1").await.unwrap();

        store.fail_all_saves(Some(SyncError::QuotaExceeded("storage full".to_string())));
        let mut edited = original.clone();
        edited.dietary = vec!["vegan".to_string()];
        edited.notifications_enabled = false;

        let err = prefs.save(edited).await.unwrap_err();
        assert!(matches!(err, SyncError::QuotaExceeded(_)));
        assert_eq!(prefs.cached().await.unwrap(), Some(original));
        assert_eq!(settings.get_raw("preferences:u1").await.unwrap(), local_before);
    }

    #[tokio::test]
    async fn test_failed_first_save_leaves_nothing_behind() {
        let (prefs, store, settings) = setup();
        store.fail_all_saves(Some(SyncError::Unknown("boom".to_string())));

        assert!(prefs.save(UserPreferences::new("u1")).await.is_err());
        assert!(settings.get_raw("preferences:u1").await.unwrap().is_none());
        assert_eq!(prefs.cached().await.unwrap(), None);
    }
}
