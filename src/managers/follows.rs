// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::{require_user, AuthProvider, Feature};
use crate::entity::Follow;
use crate::error::SyncError;
use crate::managers::profile::ProfileManager;
use crate::store::Predicate;
use crate::sync::{SyncClient, ToggleOutcome, ToggleRemote, ToggleSet, ToggleState};

struct FollowRemote<'a> {
    client: &'a SyncClient,
    follower_id: &'a str,
}

#[async_trait]
impl ToggleRemote for FollowRemote<'_> {
    async fn apply(&self, followee_id: &str) -> Result<(), SyncError> {
        self.client
            .save(&Follow::new(self.follower_id, followee_id))
            .await
            .map(|_| ())
    }

    async fn revert(&self, followee_id: &str) -> Result<(), SyncError> {
        self.client
            .delete(&Follow::id_for(self.follower_id, followee_id))
            .await
    }

    async fn authoritative_count(&self, followee_id: &str) -> Result<Option<u64>, SyncError> {
        let count = self
            .client
            .count::<Follow>(Predicate::eq("followeeId", followee_id))
            .await?;
        Ok(Some(count))
    }
}

/// Following-state and follower counts keyed by the followed user.
pub struct FollowManager {
    client: Arc<SyncClient>,
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<ProfileManager>,
    follows: ToggleSet,
}

impl FollowManager {
    pub fn new(
        client: Arc<SyncClient>,
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<ProfileManager>,
    ) -> Self {
        Self {
            client,
            auth,
            profiles,
            follows: ToggleSet::new(),
        }
    }

    pub async fn toggle_follow(&self, followee_id: &str) -> Result<ToggleOutcome, SyncError> {
        let follower_id = require_user(self.auth.as_ref(), Feature::FollowUser)?;
        if follower_id == followee_id {
            return Err(SyncError::PermissionDenied("cannot follow yourself".to_string()));
        }

        let remote = FollowRemote {
            client: &self.client,
            follower_id: &follower_id,
        };
        let outcome = self.follows.toggle(followee_id, &remote).await?;
        if let ToggleOutcome::Confirmed(_) = outcome {
            self.profiles.sync_follow_counts(&follower_id, followee_id).await;
        }
        Ok(outcome)
    }

    /// Drop all cached follow state.
    pub async fn clear(&self) {
        self.follows.clear().await;
    }

    pub async fn is_following(&self, followee_id: &str) -> bool {
        self.follows.state(followee_id).await.active
    }

    pub async fn follower_count(&self, followee_id: &str) -> u64 {
        self.follows.state(followee_id).await.count
    }

    pub async fn seed(&self, followee_id: &str, following: bool, followers: u64) {
        self.follows
            .seed(followee_id, ToggleState::new(following, followers))
            .await;
    }

    /// Users the signed-in user follows, straight from the store.
    pub async fn following(&self) -> Result<Vec<String>, SyncError> {
        let follower_id = require_user(self.auth.as_ref(), Feature::FollowUser)?;
        let follows: Vec<Follow> = self
            .client
            .query_all(Predicate::eq("followerId", follower_id.as_str()), None)
            .await?;

        let mut followees = Vec::with_capacity(follows.len());
        for follow in follows {
            self.follows.set_active(&follow.followee_id, true).await;
            followees.push(follow.followee_id);
        }
        Ok(followees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionAuth;
    use crate::entity::{SyncableEntity, UserProfile};
    use crate::store::{MemoryStore, RemoteStore};
    use crate::test_helpers::quick_policies;

    fn setup() -> (FollowManager, Arc<MemoryStore>) {
        let (follows, memory, _, _) = setup_with_profiles();
        (follows, memory)
    }

    fn setup_with_profiles() -> (FollowManager, Arc<MemoryStore>, Arc<SessionAuth>, Arc<ProfileManager>) {
        let memory = Arc::new(MemoryStore::new());
        let client = Arc::new(SyncClient::new(memory.clone(), quick_policies()));
        let auth = Arc::new(SessionAuth::signed_in("u1"));
        let profiles = Arc::new(ProfileManager::new(client.clone(), auth.clone()));
        let follows = FollowManager::new(client, auth.clone(), profiles.clone());
        (follows, memory, auth, profiles)
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (follows, memory) = setup();
        memory.save(Follow::new("u3", "u2").encode()).await.unwrap();
        follows.seed("u2", false, 1).await;

        let outcome = follows.toggle_follow("u2").await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Confirmed(ToggleState::new(true, 2)));
        assert_eq!(follows.following().await.unwrap(), vec!["u2".to_string()]);

        follows.toggle_follow("u2").await.unwrap();
        assert!(!follows.is_following("u2").await);
        assert_eq!(follows.follower_count("u2").await, 1);
        assert!(follows.following().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let (follows, memory) = setup();
        let err = follows.toggle_follow("u1").await.unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied(_)));
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_follow_updates_profile_counts() {
        let (follows, memory, auth, profiles) = setup_with_profiles();
        auth.sign_in("u2");
        profiles.set_username("bob").await.unwrap();
        auth.sign_in("u1");
        profiles.set_username("anna").await.unwrap();

        follows.toggle_follow("u2").await.unwrap();
        let anna = UserProfile::decode(&memory.fetch(&"u1".into()).await.unwrap()).unwrap();
        let bob = UserProfile::decode(&memory.fetch(&"u2".into()).await.unwrap()).unwrap();
        assert_eq!(anna.following_count, 1);
        assert_eq!(bob.follower_count, 1);

        follows.toggle_follow("u2").await.unwrap();
        let bob = UserProfile::decode(&memory.fetch(&"u2".into()).await.unwrap()).unwrap();
        assert_eq!(bob.follower_count, 0);
    }

    #[tokio::test]
    async fn test_follow_without_profiles_still_confirms() {
        let (follows, memory) = setup();
        let outcome = follows.toggle_follow("u9").await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Confirmed(ToggleState::new(true, 1)));
        assert_eq!(memory.len().await, 1);

        follows.clear().await;
        assert!(!follows.is_following("u9").await);
    }
}
