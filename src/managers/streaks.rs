// SPDX-License-Identifier: GPL-3.0-only
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{require_user, AuthProvider, Feature};
use crate::entity::{CookingStreak, StreakChange};
use crate::error::SyncError;
use crate::managers::profile::ProfileManager;
use crate::sync::{Repository, SyncClient};

/// Points for every cooked meal, before any streak bonus
pub const POINTS_PER_MEAL: u64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookResult {
    pub current_days: u32,
    pub longest_days: u32,
    pub total_meals: u64,
    pub points_awarded: u64,
    /// Profile total after the award; `None` when awarding failed
    pub total_points: Option<u64>,
}

pub struct StreakManager {
    auth: Arc<dyn AuthProvider>,
    streaks: Repository<CookingStreak>,
    profiles: Arc<ProfileManager>,
}

impl StreakManager {
    pub fn new(
        client: Arc<SyncClient>,
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<ProfileManager>,
    ) -> Self {
        Self {
            auth,
            streaks: Repository::new(client),
            profiles,
        }
    }

    pub async fn streak(&self) -> Result<CookingStreak, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::TrackStreak)?;
        Ok(self
            .streaks
            .get_optional(&CookingStreak::id_for(&user_id))
            .await?
            .unwrap_or_else(|| CookingStreak::new(user_id)))
    }

    /// Register a cooked meal on `day` and award its points.
    ///
    /// The streak save and the point award are separate writes; a failed award
    /// is logged and reported as `total_points: None`, the streak stays saved.
    pub async fn record_cook(&self, day: NaiveDate) -> Result<CookResult, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::TrackStreak)?;
        let id = CookingStreak::id_for(&user_id);

        let mut streak = match self.streaks.client().fetch_optional::<CookingStreak>(&id).await? {
            Some(streak) => streak,
            None => CookingStreak::new(user_id.as_str()),
        };
        let change = streak.register_cook(day);
        let saved = self.streaks.save(&streak).await?;

        let bonus = match change {
            StreakChange::Unchanged => 0,
            _ => saved.bonus_points(),
        };
        let points_awarded = POINTS_PER_MEAL + bonus;

        let total_points = self.profiles.reward("cook_meal", points_awarded).await;

        info!(
            user = %user_id,
            ?change,
            current_days = saved.current_days,
            points = points_awarded,
            "Recorded cooked meal"
        );

        Ok(CookResult {
            current_days: saved.current_days,
            longest_days: saved.longest_days,
            total_meals: saved.total_meals,
            points_awarded,
            total_points,
        })
    }
}
