// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entitlement::SubscriptionTier;
use crate::entity::traits::{new_record, required_string, SyncableEntity};
use crate::record::{DecodeError, FieldKind, FieldSpec, RecordId, RecordMeta, RemoteRecord, Schema};

static SCHEMA: Schema = Schema {
    record_type: "UserProfile",
    fields: &[
        FieldSpec::required("username", FieldKind::String),
        FieldSpec::optional("usernameLower", FieldKind::String),
        FieldSpec::optional("displayName", FieldKind::String),
        FieldSpec::optional("bio", FieldKind::String),
        FieldSpec::optional("points", FieldKind::Int),
        FieldSpec::optional("subscriptionTier", FieldKind::String),
        FieldSpec::optional("referralCode", FieldKind::String),
        FieldSpec::optional("referredBy", FieldKind::String),
        FieldSpec::optional("followerCount", FieldKind::Int),
        FieldSpec::optional("followingCount", FieldKind::Int),
        FieldSpec::optional("recipesShared", FieldKind::Int),
    ],
};

/// Chef levels by point threshold, lowest first.
const LEVELS: &[(u32, &str, u64)] = &[
    (1, "Novice Chef", 0),
    (2, "Home Cook", 100),
    (3, "Kitchen Expert", 300),
    (4, "Recipe Master", 600),
    (5, "Culinary Artist", 1000),
    (6, "Food Wizard", 1500),
    (7, "Master Chef", 2500),
    (8, "Celebrity Chef", 4000),
    (9, "Iron Chef", 6000),
    (10, "Legendary Chef", 10000),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChefLevel {
    pub level: u32,
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Record id of the profile
    pub user_id: String,

    pub username: String,

    pub display_name: Option<String>,

    pub bio: Option<String>,

    pub points: u64,

    pub subscription_tier: SubscriptionTier,

    pub referral_code: Option<String>,

    /// Referral code this user signed up with
    pub referred_by: Option<String>,

    /// Maintained by follow toggles; a cached tally, not recounted on read
    pub follower_count: u64,

    pub following_count: u64,

    pub recipes_shared: u64,

    #[serde(skip)]
    pub meta: RecordMeta,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            display_name: None,
            bio: None,
            points: 0,
            subscription_tier: SubscriptionTier::Free,
            referral_code: None,
            referred_by: None,
            follower_count: 0,
            following_count: 0,
            recipes_shared: 0,
            meta: RecordMeta::default(),
        }
    }

    pub fn level(&self) -> ChefLevel {
        LEVELS
            .iter()
            .rev()
            .find(|(_, _, threshold)| self.points >= *threshold)
            .map(|(level, name, _)| ChefLevel { level: *level, name })
            .unwrap_or(ChefLevel {
                level: 1,
                name: "Novice Chef",
            })
    }
}

impl SyncableEntity for UserProfile {
    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn record_id(&self) -> RecordId {
        RecordId::new(self.user_id.clone())
    }

    fn encode(&self) -> RemoteRecord {
        let mut record = new_record(self).with_meta(&self.meta);
        record.set("username", self.username.as_str());
        record.set("usernameLower", self.username.to_lowercase());
        record.set_opt("displayName", self.display_name.clone());
        record.set_opt("bio", self.bio.clone());
        record.set("points", self.points);
        record.set("subscriptionTier", self.subscription_tier.as_str());
        record.set_opt("referralCode", self.referral_code.clone());
        record.set_opt("referredBy", self.referred_by.clone());
        record.set("followerCount", self.follower_count);
        record.set("followingCount", self.following_count);
        record.set("recipesShared", self.recipes_shared);
        record
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        let tier = record.string_or("subscriptionTier", "free");
        let subscription_tier = tier.parse().unwrap_or_else(|_| {
            warn!(tier = %tier, record_id = %record.id, "Unknown subscription tier, defaulting to free");
            SubscriptionTier::Free
        });

        Ok(Self {
            user_id: record.id.to_string(),
            username: required_string(record, "username")?,
            display_name: record.string("displayName").map(str::to_string),
            bio: record.string("bio").map(str::to_string),
            points: record.count_or("points", 0),
            subscription_tier,
            referral_code: record.string("referralCode").map(str::to_string),
            referred_by: record.string("referredBy").map(str::to_string),
            follower_count: record.count_or("followerCount", 0),
            following_count: record.count_or("followingCount", 0),
            recipes_shared: record.count_or("recipesShared", 0),
            meta: RecordMeta::from_record(record),
        })
    }
}
