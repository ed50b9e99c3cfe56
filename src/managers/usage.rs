// SPDX-License-Identifier: GPL-3.0-only
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{require_user, AuthProvider, Feature};
use crate::entitlement::EntitlementProvider;
use crate::entity::DailyUsage;
use crate::error::SyncError;
use crate::managers::profile::{ProfileManager, POINTS_GENERATE_MEAL};
use crate::sync::SyncClient;

/// Daily meal-generation allowance per subscription tier.
pub struct UsageManager {
    client: Arc<SyncClient>,
    auth: Arc<dyn AuthProvider>,
    entitlement: Arc<dyn EntitlementProvider>,
    profiles: Arc<ProfileManager>,
}

impl UsageManager {
    pub fn new(
        client: Arc<SyncClient>,
        auth: Arc<dyn AuthProvider>,
        entitlement: Arc<dyn EntitlementProvider>,
        profiles: Arc<ProfileManager>,
    ) -> Self {
        Self {
            client,
            auth,
            entitlement,
            profiles,
        }
    }

    async fn usage(&self, user_id: &str, day: NaiveDate) -> Result<DailyUsage, SyncError> {
        Ok(self
            .client
            .fetch_optional::<DailyUsage>(&DailyUsage::id_for(user_id, day))
            .await?
            .unwrap_or_else(|| DailyUsage::new(user_id, day)))
    }

    /// Generations left on `day`; `None` when the tier is unlimited.
    pub async fn remaining(&self, day: NaiveDate) -> Result<Option<u32>, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::GenerateMeal)?;
        let Some(limit) = self.entitlement.tier().daily_meal_limit() else {
            return Ok(None);
        };
        let usage = self.usage(&user_id, day).await?;
        Ok(Some(limit.saturating_sub(usage.meals_generated)))
    }

    /// Count one meal generation on `day`.
    ///
    /// At the tier's limit this fails with `QuotaExceeded` and nothing is written.
    /// A counted generation earns points; a failed award does not undo the count.
    pub async fn consume_meal_generation(&self, day: NaiveDate) -> Result<DailyUsage, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::GenerateMeal)?;
        let tier = self.entitlement.tier();
        let mut usage = self.usage(&user_id, day).await?;

        if let Some(limit) = tier.daily_meal_limit() {
            if usage.meals_generated >= limit {
                debug!(user = %user_id, tier = tier.as_str(), limit, "Daily meal limit reached");
                return Err(SyncError::QuotaExceeded(format!(
                    "{} plan allows {} meal generation(s) per day",
                    tier.as_str(),
                    limit
                )));
            }
        }

        usage.meals_generated += 1;
        let saved = self.client.save(&usage).await?;
        info!(user = %user_id, %day, used = saved.meals_generated, "Meal generation counted");
        self.profiles.reward("generate_meal", POINTS_GENERATE_MEAL).await;
        Ok(saved)
    }
}
