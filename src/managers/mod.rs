// SPDX-License-Identifier: GPL-3.0-only
pub mod analytics;
pub mod follows;
pub mod likes;
pub mod photos;
pub mod preferences;
pub mod profile;
pub mod recipes;
pub mod streaks;
pub mod usage;

pub use analytics::AnalyticsTracker;
pub use follows::FollowManager;
pub use likes::LikeManager;
pub use photos::PhotoManager;
pub use preferences::PreferencesManager;
pub use profile::{normalize_username, ProfileError, ProfileManager, UsernameError};
pub use recipes::RecipeManager;
pub use streaks::{CookResult, StreakManager};
pub use usage::UsageManager;
