// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::SyncError;

/// App features that may need a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BrowseRecipes,
    LikeRecipe,
    FollowUser,
    EditProfile,
    ShareRecipe,
    SyncPreferences,
    TrackStreak,
    GenerateMeal,
    UploadPhoto,
    Analytics,
}

pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    /// Stable key of the signed-in user
    fn current_user_key(&self) -> Option<String>;

    /// Whether `feature` needs a signed-in user
    fn require_auth(&self, feature: Feature) -> bool;
}

/// Checks `feature` against the session and returns the signed-in user, if any.
///
/// Fails with [`SyncError::Unauthenticated`] before any remote call is made.
pub fn authorize(auth: &dyn AuthProvider, feature: Feature) -> Result<Option<String>, SyncError> {
    let user = auth.current_user_key().filter(|_| auth.is_authenticated());
    if user.is_none() && auth.require_auth(feature) {
        debug!(?feature, "Rejected anonymous call");
        return Err(SyncError::Unauthenticated);
    }
    Ok(user)
}

/// Like [`authorize`] but the operation is user-scoped and needs a key.
pub fn require_user(auth: &dyn AuthProvider, feature: Feature) -> Result<String, SyncError> {
    authorize(auth, feature)?.ok_or(SyncError::Unauthenticated)
}
