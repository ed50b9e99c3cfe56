// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::{authorize, require_user, AuthProvider, Feature};
use crate::entity::ProfilePhoto;
use crate::error::SyncError;
use crate::local::BlobStore;
use crate::managers::profile::{ProfileManager, POINTS_UPLOAD_PHOTO};
use crate::sync::SyncClient;

/// Largest accepted photo upload (5 MiB)
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

fn blob_key(user_id: &str) -> String {
    format!("photo_{}", user_id)
}

/// Profile photos, read from the device first.
pub struct PhotoManager {
    client: Arc<SyncClient>,
    auth: Arc<dyn AuthProvider>,
    blobs: Arc<dyn BlobStore>,
    profiles: Arc<ProfileManager>,
}

impl PhotoManager {
    pub fn new(
        client: Arc<SyncClient>,
        auth: Arc<dyn AuthProvider>,
        blobs: Arc<dyn BlobStore>,
        profiles: Arc<ProfileManager>,
    ) -> Self {
        Self {
            client,
            auth,
            blobs,
            profiles,
        }
    }

    /// Image bytes for `user_id`, or `None` when no photo exists.
    pub async fn load_photo(&self, user_id: &str) -> Result<Option<Vec<u8>>, SyncError> {
        authorize(self.auth.as_ref(), Feature::BrowseRecipes)?;
        let key = blob_key(user_id);

        match self.blobs.read(&key).await {
            Ok(Some(bytes)) => {
                debug!(user = %user_id, "Photo served from device");
                return Ok(Some(bytes));
            }
            Ok(None) => {}
            Err(e) => warn!(user = %user_id, error = %e, "Failed to read local photo"),
        }

        let Some(photo) = self
            .client
            .fetch_optional::<ProfilePhoto>(&ProfilePhoto::id_for(user_id))
            .await?
        else {
            return Ok(None);
        };

        if let Err(e) = self.blobs.write(&key, &photo.image).await {
            warn!(user = %user_id, error = %e, "Failed to persist fetched photo");
        }
        Ok(Some(photo.image))
    }

    /// Replace the signed-in user's photo.
    pub async fn upload_photo(
        &self,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<ProfilePhoto, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::UploadPhoto)?;
        if image.len() > MAX_PHOTO_BYTES {
            return Err(SyncError::QuotaExceeded(format!(
                "photo is {} bytes, limit is {}",
                image.len(),
                MAX_PHOTO_BYTES
            )));
        }

        let mut photo = ProfilePhoto::new(user_id.as_str(), image);
        photo.content_type = content_type.to_string();

        let saved = self.client.save(&photo).await?;

        if let Err(e) = self.blobs.write(&blob_key(&user_id), &saved.image).await {
            warn!(user = %user_id, error = %e, "Photo saved remotely but not on device");
        }
        info!(user = %user_id, bytes = saved.image.len(), "Profile photo uploaded");
        self.profiles.reward("upload_photo", POINTS_UPLOAD_PHOTO).await;
        Ok(saved)
    }
}
