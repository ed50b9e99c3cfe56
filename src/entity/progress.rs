// SPDX-License-Identifier: GPL-3.0-only
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::entity::traits::{new_record, required_string, SyncableEntity};
use crate::record::{DecodeError, FieldKind, FieldSpec, RecordId, RecordMeta, RemoteRecord, Schema};

static STREAK_SCHEMA: Schema = Schema {
    record_type: "CookingStreak",
    fields: &[
        FieldSpec::required("userId", FieldKind::String),
        FieldSpec::optional("currentDays", FieldKind::Int),
        FieldSpec::optional("longestDays", FieldKind::Int),
        FieldSpec::optional("lastCookDate", FieldKind::Date),
        FieldSpec::optional("totalMeals", FieldKind::Int),
    ],
};

static USAGE_SCHEMA: Schema = Schema {
    record_type: "DailyUsage",
    fields: &[
        FieldSpec::required("userId", FieldKind::String),
        FieldSpec::required("day", FieldKind::String),
        FieldSpec::optional("mealsGenerated", FieldKind::Int),
    ],
};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// What a cooked meal did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Started,
    Extended,
    Reset,
    /// Already cooked today
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookingStreak {
    pub user_id: String,
    pub current_days: u32,
    pub longest_days: u32,
    pub last_cook_date: Option<NaiveDate>,
    pub total_meals: u64,
    #[serde(skip)]
    pub meta: RecordMeta,
}

impl CookingStreak {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_days: 0,
            longest_days: 0,
            last_cook_date: None,
            total_meals: 0,
            meta: RecordMeta::default(),
        }
    }

    pub fn id_for(user_id: &str) -> RecordId {
        RecordId::new(format!("streak_{}", user_id))
    }

    /// Applies a cooked meal on `day`.
    pub fn register_cook(&mut self, day: NaiveDate) -> StreakChange {
        self.total_meals += 1;

        let change = match self.last_cook_date {
            None => {
                self.current_days = 1;
                StreakChange::Started
            }
            Some(last) => match (day - last).num_days() {
                1 => {
                    self.current_days += 1;
                    StreakChange::Extended
                }
                days if days > 1 => {
                    self.current_days = 1;
                    StreakChange::Reset
                }
                // Same day, or a clock that went backwards
                _ => return StreakChange::Unchanged,
            },
        };

        self.last_cook_date = Some(day);
        self.longest_days = self.longest_days.max(self.current_days);
        change
    }

    /// Bonus points for the current streak length.
    pub fn bonus_points(&self) -> u64 {
        match self.current_days {
            days if days >= 30 => 50,
            days if days >= 14 => 25,
            days if days >= 7 => 15,
            days if days >= 3 => 10,
            _ => 0,
        }
    }
}

impl SyncableEntity for CookingStreak {
    fn schema() -> &'static Schema {
        &STREAK_SCHEMA
    }

    fn record_id(&self) -> RecordId {
        Self::id_for(&self.user_id)
    }

    fn encode(&self) -> RemoteRecord {
        let mut record = new_record(self).with_meta(&self.meta);
        record.set("userId", self.user_id.as_str());
        record.set("currentDays", self.current_days);
        record.set("longestDays", self.longest_days);
        record.set_opt(
            "lastCookDate",
            self.last_cook_date
                .map(|day| day.and_time(NaiveTime::MIN).and_utc()),
        );
        record.set("totalMeals", self.total_meals);
        record
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: required_string(record, "userId")?,
            current_days: u32::try_from(record.count_or("currentDays", 0)).unwrap_or(u32::MAX),
            longest_days: u32::try_from(record.count_or("longestDays", 0)).unwrap_or(u32::MAX),
            last_cook_date: record.date("lastCookDate").map(|at| at.date_naive()),
            total_meals: record.count_or("totalMeals", 0),
            meta: RecordMeta::from_record(record),
        })
    }
}

/// Meal generations used by one user on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub user_id: String,
    pub day: NaiveDate,
    pub meals_generated: u32,
    #[serde(skip)]
    pub meta: RecordMeta,
}

impl DailyUsage {
    pub fn new(user_id: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            day,
            meals_generated: 0,
            meta: RecordMeta::default(),
        }
    }

    pub fn id_for(user_id: &str, day: NaiveDate) -> RecordId {
        RecordId::new(format!("usage_{}_{}", user_id, day.format(DAY_FORMAT)))
    }
}

impl SyncableEntity for DailyUsage {
    fn schema() -> &'static Schema {
        &USAGE_SCHEMA
    }

    fn record_id(&self) -> RecordId {
        Self::id_for(&self.user_id, self.day)
    }

    fn encode(&self) -> RemoteRecord {
        new_record(self)
            .with_meta(&self.meta)
            .with("userId", self.user_id.as_str())
            .with("day", self.day.format(DAY_FORMAT).to_string())
            .with("mealsGenerated", self.meals_generated)
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        let raw_day = required_string(record, "day")?;
        let day = NaiveDate::parse_from_str(&raw_day, DAY_FORMAT).map_err(|e| {
            DecodeError::InvalidValue {
                record_id: record.id.to_string(),
                field: "day",
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            user_id: required_string(record, "userId")?,
            day,
            meals_generated: u32::try_from(record.count_or("mealsGenerated", 0))
                .unwrap_or(u32::MAX),
            meta: RecordMeta::from_record(record),
        })
    }
}
