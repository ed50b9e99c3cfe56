// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::traits::{new_record, required_date, required_string, SyncableEntity};
use crate::record::{DecodeError, FieldKind, FieldSpec, RecordId, RemoteRecord, Schema};

static LIKE_SCHEMA: Schema = Schema {
    record_type: "RecipeLike",
    fields: &[
        FieldSpec::required("userId", FieldKind::String),
        FieldSpec::required("recipeId", FieldKind::String),
        FieldSpec::required("createdAt", FieldKind::Date),
    ],
};

static FOLLOW_SCHEMA: Schema = Schema {
    record_type: "Follow",
    fields: &[
        FieldSpec::required("followerId", FieldKind::String),
        FieldSpec::required("followeeId", FieldKind::String),
        FieldSpec::required("createdAt", FieldKind::Date),
    ],
};

/// One user's like of one recipe. The record id is derived from both keys so
/// liking twice overwrites rather than duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLike {
    pub user_id: String,
    pub recipe_id: String,
    pub created_at: DateTime<Utc>,
}

impl RecipeLike {
    pub fn new(user_id: impl Into<String>, recipe_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            recipe_id: recipe_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn id_for(user_id: &str, recipe_id: &str) -> RecordId {
        RecordId::new(format!("like_{}_{}", user_id, recipe_id))
    }
}

impl SyncableEntity for RecipeLike {
    fn schema() -> &'static Schema {
        &LIKE_SCHEMA
    }

    fn record_id(&self) -> RecordId {
        Self::id_for(&self.user_id, &self.recipe_id)
    }

    fn encode(&self) -> RemoteRecord {
        new_record(self)
            .with("userId", self.user_id.as_str())
            .with("recipeId", self.recipe_id.as_str())
            .with("createdAt", self.created_at)
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: required_string(record, "userId")?,
            recipe_id: required_string(record, "recipeId")?,
            created_at: required_date(record, "createdAt")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: String,
    pub followee_id: String,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn new(follower_id: impl Into<String>, followee_id: impl Into<String>) -> Self {
        Self {
            follower_id: follower_id.into(),
            followee_id: followee_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn id_for(follower_id: &str, followee_id: &str) -> RecordId {
        RecordId::new(format!("follow_{}_{}", follower_id, followee_id))
    }
}

impl SyncableEntity for Follow {
    fn schema() -> &'static Schema {
        &FOLLOW_SCHEMA
    }

    fn record_id(&self) -> RecordId {
        Self::id_for(&self.follower_id, &self.followee_id)
    }

    fn encode(&self) -> RemoteRecord {
        new_record(self)
            .with("followerId", self.follower_id.as_str())
            .with("followeeId", self.followee_id.as_str())
            .with("createdAt", self.created_at)
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        Ok(Self {
            follower_id: required_string(record, "followerId")?,
            followee_id: required_string(record, "followeeId")?,
            created_at: required_date(record, "createdAt")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_round_trip() {
        let like = RecipeLike::new("u1", "r1");
        let record = like.encode();
        assert_eq!(record.id.as_str(), "like_u1_r1");
        assert_eq!(RecipeLike::decode(&record).unwrap(), like);
    }

    #[test]
    fn test_follow_round_trip() {
        let follow = Follow::new("u1", "u2");
        let record = follow.encode();
        assert_eq!(record.id.as_str(), "follow_u1_u2");
        assert_eq!(Follow::decode(&record).unwrap(), follow);
    }

    #[test]
    fn test_like_rejects_follow_record() {
        let record = Follow::new("u1", "u2").encode();
        assert!(matches!(
            RecipeLike::decode(&record),
            Err(DecodeError::WrongRecordType { .. })
        ));
    }
}
