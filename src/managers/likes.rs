// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::auth::{authorize, require_user, AuthProvider, Feature};
use crate::entity::RecipeLike;
use crate::error::SyncError;
use crate::record::FieldValue;
use crate::store::{Operator, Predicate};
use crate::sync::{SyncClient, ToggleOutcome, ToggleRemote, ToggleSet, ToggleState};

/// Remote side of a like toggle for one signed-in user.
struct LikeRemote<'a> {
    client: &'a SyncClient,
    user_id: &'a str,
}

#[async_trait]
impl ToggleRemote for LikeRemote<'_> {
    async fn apply(&self, recipe_id: &str) -> Result<(), SyncError> {
        self.client
            .save(&RecipeLike::new(self.user_id, recipe_id))
            .await
            .map(|_| ())
    }

    async fn revert(&self, recipe_id: &str) -> Result<(), SyncError> {
        self.client
            .delete(&RecipeLike::id_for(self.user_id, recipe_id))
            .await
    }

    async fn authoritative_count(&self, recipe_id: &str) -> Result<Option<u64>, SyncError> {
        let count = self
            .client
            .count::<RecipeLike>(Predicate::eq("recipeId", recipe_id))
            .await?;
        Ok(Some(count))
    }
}

/// Liked-state and like counts per recipe for the signed-in user.
pub struct LikeManager {
    client: Arc<SyncClient>,
    auth: Arc<dyn AuthProvider>,
    likes: ToggleSet,
}

impl LikeManager {
    pub fn new(client: Arc<SyncClient>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            client,
            auth,
            likes: ToggleSet::new(),
        }
    }

    pub async fn toggle_like(&self, recipe_id: &str) -> Result<ToggleOutcome, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::LikeRecipe)?;
        let remote = LikeRemote {
            client: &self.client,
            user_id: &user_id,
        };
        self.likes.toggle(recipe_id, &remote).await
    }

    pub async fn is_liked(&self, recipe_id: &str) -> bool {
        self.likes.state(recipe_id).await.active
    }

    pub async fn like_count(&self, recipe_id: &str) -> u64 {
        self.likes.state(recipe_id).await.count
    }

    pub async fn state(&self, recipe_id: &str) -> ToggleState {
        self.likes.state(recipe_id).await
    }

    /// Record what a feed reported for a recipe.
    pub async fn seed(&self, recipe_id: &str, liked: bool, count: u64) {
        self.likes.seed(recipe_id, ToggleState::new(liked, count)).await;
    }

    /// Fall back to a count reported elsewhere, unless `recipe_id` is already known.
    pub async fn seed_count_if_unknown(&self, recipe_id: &str, count: u64) {
        self.likes
            .seed_if_absent(recipe_id, ToggleState::new(false, count))
            .await;
    }

    /// Drop all cached like state; the next feed load starts fresh.
    pub async fn clear(&self) {
        self.likes.clear().await;
    }

    /// Load like counts for `recipe_ids` and, when signed in, which of them
    /// the user has liked. Recipes with a toggle in flight keep their
    /// optimistic state.
    pub async fn load_states(&self, recipe_ids: &[String]) -> Result<(), SyncError> {
        if recipe_ids.is_empty() {
            return Ok(());
        }
        authorize(self.auth.as_ref(), Feature::BrowseRecipes)?;
        let user_id = self.auth.current_user_key();

        let candidates = FieldValue::List(
            recipe_ids
                .iter()
                .map(|id| FieldValue::String(id.clone()))
                .collect(),
        );
        let predicate = Predicate::field("recipeId", Operator::In, candidates);
        let likes: Vec<RecipeLike> = self.client.query_all(predicate, None).await?;

        let mut tallies: HashMap<&str, (bool, u64)> = HashMap::new();
        for like in &likes {
            let entry = tallies.entry(like.recipe_id.as_str()).or_default();
            entry.1 += 1;
            if user_id.as_deref() == Some(like.user_id.as_str()) {
                entry.0 = true;
            }
        }

        for recipe_id in recipe_ids {
            if self.likes.is_in_flight(recipe_id) {
                continue;
            }
            let (liked, count) = tallies.get(recipe_id.as_str()).copied().unwrap_or_default();
            self.likes.seed(recipe_id, ToggleState::new(liked, count)).await;
        }

        info!(
            user = user_id.as_deref().unwrap_or("anonymous"),
            recipes = recipe_ids.len(),
            likes = likes.len(),
            "Loaded like states"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionAuth;
    use crate::entity::SyncableEntity;
    use crate::store::{MemoryStore, RemoteStore};
    use crate::test_helpers::{quick_policies, ScriptedStore};

    fn setup(signed_in: bool) -> (LikeManager, Arc<ScriptedStore>, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        let store = Arc::new(ScriptedStore::new(memory.clone()));
        let client = Arc::new(SyncClient::new(store.clone(), quick_policies()));
        let auth: Arc<dyn AuthProvider> = if signed_in {
            Arc::new(SessionAuth::signed_in("u1"))
        } else {
            Arc::new(SessionAuth::new())
        };
        (LikeManager::new(client, auth), store, memory)
    }

    #[tokio::test]
    async fn test_like_failure_rolls_back_after_retries() {
        let (likes, store, _) = setup(true);
        likes.seed("r1", false, 5).await;
        store.fail_all_saves(Some(SyncError::TransientUnavailable("busy".to_string())));

        let err = likes.toggle_like("r1").await.unwrap_err();
        assert_eq!(err, SyncError::TransientUnavailable("busy".to_string()));
        assert!(!likes.is_liked("r1").await);
        assert_eq!(likes.like_count("r1").await, 5);
        assert_eq!(store.save_calls(), 3);
    }

    #[tokio::test]
    async fn test_like_then_unlike_uses_store_count() {
        let (likes, _, memory) = setup(true);
        memory
            .save(RecipeLike::new("someone", "r1").encode())
            .await
            .unwrap();
        likes.seed("r1", false, 0).await;

        let outcome = likes.toggle_like("r1").await.unwrap();
        // Authoritative count replaces the optimistic 1
        assert_eq!(outcome, ToggleOutcome::Confirmed(ToggleState::new(true, 2)));
        assert!(memory.fetch(&RecipeLike::id_for("u1", "r1")).await.is_ok());

        let outcome = likes.toggle_like("r1").await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Confirmed(ToggleState::new(false, 1)));
        assert!(memory.fetch(&RecipeLike::id_for("u1", "r1")).await.is_err());
    }

    #[tokio::test]
    async fn test_like_requires_sign_in() {
        let (likes, store, _) = setup(false);
        assert_eq!(likes.toggle_like("r1").await, Err(SyncError::Unauthenticated));
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_unlike_failure_restores_like() {
        let (likes, store, _) = setup(true);
        likes.seed("r1", true, 1).await;
        store.fail_all_deletes(Some(SyncError::PermissionDenied("locked".to_string())));

        assert!(likes.toggle_like("r1").await.is_err());
        assert_eq!(likes.state("r1").await, ToggleState::new(true, 1));
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_load_states_counts_and_membership() {
        let (likes, _, memory) = setup(true);
        for (user, recipe) in [("u1", "r1"), ("u2", "r1"), ("u1", "r3"), ("u2", "r2")] {
            memory.save(RecipeLike::new(user, recipe).encode()).await.unwrap();
        }
        likes.seed("r4", true, 9).await;

        let ids: Vec<String> = ["r1", "r2", "r3", "r4"].iter().map(|s| s.to_string()).collect();
        likes.load_states(&ids).await.unwrap();

        assert_eq!(likes.state("r1").await, ToggleState::new(true, 2));
        assert_eq!(likes.state("r2").await, ToggleState::new(false, 1));
        assert_eq!(likes.state("r3").await, ToggleState::new(true, 1));
        // Stale cached state is replaced by what the store holds
        assert_eq!(likes.state("r4").await, ToggleState::new(false, 0));
    }

    #[tokio::test]
    async fn test_load_states_anonymously() {
        let (likes, _, memory) = setup(false);
        memory.save(RecipeLike::new("u1", "r1").encode()).await.unwrap();

        likes.load_states(&["r1".to_string()]).await.unwrap();
        assert_eq!(likes.state("r1").await, ToggleState::new(false, 1));
    }

    #[tokio::test]
    async fn test_confirmed_like_survives_stale_seed() {
        let (likes, _, _) = setup(true);
        likes.toggle_like("r1").await.unwrap();

        likes.seed_count_if_unknown("r1", 0).await;
        likes.seed_count_if_unknown("r2", 4).await;
        assert_eq!(likes.state("r1").await, ToggleState::new(true, 1));
        assert_eq!(likes.state("r2").await, ToggleState::new(false, 4));

        likes.clear().await;
        assert_eq!(likes.state("r1").await, ToggleState::default());
    }
}
