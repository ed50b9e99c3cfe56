// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tracing::info;

use crate::auth::{authorize, require_user, AuthProvider, Feature};
use crate::entity::{Recipe, SyncableEntity};
use crate::error::SyncError;
use crate::managers::profile::ProfileManager;
use crate::store::{Operator, Predicate, SortDescriptor};
use crate::sync::{Repository, SyncClient};

/// Page size for per-owner listings
pub const OWNER_PAGE_SIZE: usize = 50;

pub struct RecipeManager {
    auth: Arc<dyn AuthProvider>,
    recipes: Repository<Recipe>,
    profiles: Arc<ProfileManager>,
}

impl RecipeManager {
    pub fn new(
        client: Arc<SyncClient>,
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<ProfileManager>,
    ) -> Self {
        Self {
            auth,
            recipes: Repository::new(client),
            profiles,
        }
    }

    /// Save a recipe owned by the signed-in user.
    ///
    /// Making a recipe public for the first time earns share points, with a
    /// bonus when it is the owner's first public recipe.
    pub async fn save_recipe(&self, recipe: &Recipe) -> Result<Recipe, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::ShareRecipe)?;
        if recipe.owner_id != user_id {
            return Err(SyncError::PermissionDenied(format!(
                "recipe {} belongs to {}",
                recipe.id, recipe.owner_id
            )));
        }

        let newly_shared = recipe.is_public && !self.was_public(recipe).await?;
        let first_share = newly_shared && self.shared_count(&user_id).await? == 0;

        let saved = self.recipes.save(recipe).await?;
        info!(recipe_id = %saved.id, public = saved.is_public, "Recipe saved");

        if newly_shared {
            self.profiles.reward_share(first_share).await;
        }
        Ok(saved)
    }

    async fn was_public(&self, recipe: &Recipe) -> Result<bool, SyncError> {
        let stored = self
            .recipes
            .client()
            .fetch_optional::<Recipe>(&recipe.record_id())
            .await?;
        Ok(stored.is_some_and(|stored| stored.is_public))
    }

    async fn shared_count(&self, owner_id: &str) -> Result<u64, SyncError> {
        self.recipes
            .client()
            .count::<Recipe>(Predicate::eq("ownerId", owner_id).and(
                "isPublic",
                Operator::Eq,
                true,
            ))
            .await
    }

    /// Every public recipe, newest first.
    pub async fn public_feed(&self) -> Result<Vec<Recipe>, SyncError> {
        authorize(self.auth.as_ref(), Feature::BrowseRecipes)?;
        self.recipes
            .query_all(
                Predicate::eq("isPublic", true),
                Some(SortDescriptor::descending("createdAt")),
            )
            .await
    }

    /// The newest recipes of `owner_id`, one page.
    pub async fn recipes_by(&self, owner_id: &str) -> Result<Vec<Recipe>, SyncError> {
        authorize(self.auth.as_ref(), Feature::BrowseRecipes)?;
        self.recipes
            .query(
                Predicate::eq("ownerId", owner_id),
                Some(SortDescriptor::descending("createdAt")),
                OWNER_PAGE_SIZE,
            )
            .await
    }
}
