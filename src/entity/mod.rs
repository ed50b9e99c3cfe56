// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod analytics;
pub mod media;
pub mod preferences;
pub mod profile;
pub mod progress;
pub mod recipe;
pub mod social;

pub use traits::SyncableEntity;
pub use analytics::AnalyticsEvent;
pub use media::ProfilePhoto;
pub use preferences::{MeasurementUnits, UserPreferences};
pub use profile::{ChefLevel, UserProfile};
pub use progress::{CookingStreak, DailyUsage, StreakChange};
pub use recipe::Recipe;
pub use social::{Follow, RecipeLike};
