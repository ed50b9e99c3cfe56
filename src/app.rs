// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::ApiHandlers;
use crate::auth::{AuthProvider, SessionAuth};
use crate::config::Config;
use crate::entitlement::{EntitlementProvider, StaticEntitlement, SubscriptionTier};
use crate::local::{BlobStore, FileBlobStore, SettingsStore, SqliteSettingsStore};
use crate::managers::{
    AnalyticsTracker, FollowManager, LikeManager, PhotoManager, PreferencesManager,
    ProfileManager, RecipeManager, StreakManager, UsageManager,
};
use crate::store::{HttpRemoteStore, MemoryStore, RemoteStore};
use crate::sync::{BackgroundQueue, SyncClient};

/// Every service of the running application, wired once at start-up.
pub struct App {
    pub session: Arc<SessionAuth>,
    pub entitlement: Arc<StaticEntitlement>,
    pub client: Arc<SyncClient>,
    pub likes: Arc<LikeManager>,
    pub follows: Arc<FollowManager>,
    pub profiles: Arc<ProfileManager>,
    pub preferences: Arc<PreferencesManager>,
    pub streaks: Arc<StreakManager>,
    pub usage: Arc<UsageManager>,
    pub recipes: Arc<RecipeManager>,
    pub photos: Arc<PhotoManager>,
    pub analytics: Arc<AnalyticsTracker>,
    pub background_worker: JoinHandle<()>,
}

impl App {
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn RemoteStore> = if config.uses_memory_store() {
            info!("No backend configured, using in-process record store");
            Arc::new(MemoryStore::with_page_size(config.query_page_size))
        } else {
            info!(url = %config.backend_api_url, "Using remote record store");
            Arc::new(
                HttpRemoteStore::new(
                    &config.backend_api_url,
                    config.backend_api_key.clone(),
                    Duration::from_secs(config.subscription_poll_secs),
                )
                .context("Failed to create remote store client")?,
            )
        };

        let client = Arc::new(
            SyncClient::new(store, config.retry.clone()).with_page_size(config.query_page_size),
        );

        let settings: Arc<dyn SettingsStore> =
            Arc::new(SqliteSettingsStore::new(&config.settings_db_path).await?);
        info!(path = %config.settings_db_path.display(), "Settings store initialized");

        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(config.blob_dir.clone()).await?);

        let session = Arc::new(SessionAuth::new());
        let auth: Arc<dyn AuthProvider> = session.clone();
        let entitlement = Arc::new(StaticEntitlement::new(SubscriptionTier::Free));
        let entitlement_provider: Arc<dyn EntitlementProvider> = entitlement.clone();

        let (queue, background_worker) = BackgroundQueue::start(config.background_queue_capacity);

        let profiles = Arc::new(ProfileManager::new(client.clone(), auth.clone()));

        Ok(Self {
            likes: Arc::new(LikeManager::new(client.clone(), auth.clone())),
            follows: Arc::new(FollowManager::new(client.clone(), auth.clone(), profiles.clone())),
            preferences: Arc::new(PreferencesManager::new(client.clone(), auth.clone(), settings)),
            streaks: Arc::new(StreakManager::new(client.clone(), auth.clone(), profiles.clone())),
            usage: Arc::new(UsageManager::new(
                client.clone(),
                auth.clone(),
                entitlement_provider,
                profiles.clone(),
            )),
            recipes: Arc::new(RecipeManager::new(client.clone(), auth.clone(), profiles.clone())),
            photos: Arc::new(PhotoManager::new(
                client.clone(),
                auth.clone(),
                blobs,
                profiles.clone(),
            )),
            analytics: Arc::new(AnalyticsTracker::new(client.clone(), auth, queue)),
            profiles,
            session,
            entitlement,
            client,
            background_worker,
        })
    }

    pub fn api_handlers(&self) -> ApiHandlers {
        ApiHandlers::new(
            self.session.clone(),
            self.likes.clone(),
            self.follows.clone(),
            self.recipes.clone(),
            self.preferences.clone(),
            self.profiles.clone(),
            self.streaks.clone(),
            self.analytics.clone(),
        )
    }

    /// Drop every service and hand back the background worker, which stops
    /// once its queue drains.
    pub fn shutdown(self) -> JoinHandle<()> {
        let App {
            background_worker, ..
        } = self;
        background_worker
    }
}
