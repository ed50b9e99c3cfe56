// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::info;

use crate::auth::traits::{AuthProvider, Feature};

/// In-process session holding the signed-in user key.
pub struct SessionAuth {
    user: RwLock<Option<String>>,
    anonymous_features: HashSet<Feature>,
}

impl SessionAuth {
    pub fn new() -> Self {
        Self {
            user: RwLock::new(None),
            anonymous_features: [Feature::BrowseRecipes, Feature::Analytics]
                .into_iter()
                .collect(),
        }
    }

    pub fn signed_in(user_key: impl Into<String>) -> Self {
        let auth = Self::new();
        auth.sign_in(user_key);
        auth
    }

    pub fn sign_in(&self, user_key: impl Into<String>) {
        let user_key = user_key.into();
        info!(user = %user_key, "User signed in");
        match self.user.write() {
            Ok(mut guard) => *guard = Some(user_key),
            Err(poisoned) => *poisoned.into_inner() = Some(user_key),
        }
    }

    pub fn sign_out(&self) {
        info!("User signed out");
        match self.user.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl Default for SessionAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for SessionAuth {
    fn is_authenticated(&self) -> bool {
        self.current_user_key().is_some()
    }

    fn current_user_key(&self) -> Option<String> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn require_auth(&self, feature: Feature) -> bool {
        !self.anonymous_features.contains(&feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{authorize, require_user};
    use crate::error::SyncError;

    #[test]
    fn test_new_session_is_anonymous() {
        let auth = SessionAuth::new();
        assert!(!auth.is_authenticated());
        assert_eq!(auth.current_user_key(), None);
    }

    #[test]
    fn test_sign_in_and_out() {
        let auth = SessionAuth::new();
        auth.sign_in("u1");
        assert!(auth.is_authenticated());
        assert_eq!(auth.current_user_key(), Some("u1".to_string()));
        auth.sign_out();
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_require_auth_by_feature() {
        let auth = SessionAuth::new();
        assert!(!auth.require_auth(Feature::BrowseRecipes));
        assert!(auth.require_auth(Feature::LikeRecipe));
        assert!(auth.require_auth(Feature::EditProfile));
    }

    #[test]
    fn test_require_user() {
        let auth = SessionAuth::new();
        assert_eq!(
            require_user(&auth, Feature::LikeRecipe),
            Err(SyncError::Unauthenticated)
        );
        auth.sign_in("u7");
        assert_eq!(require_user(&auth, Feature::LikeRecipe), Ok("u7".to_string()));
    }

    #[test]
    fn test_authorize_allows_anonymous_browsing() {
        let auth = SessionAuth::new();
        assert_eq!(authorize(&auth, Feature::BrowseRecipes), Ok(None));
        assert_eq!(
            require_user(&auth, Feature::BrowseRecipes),
            Err(SyncError::Unauthenticated)
        );
    }
}
