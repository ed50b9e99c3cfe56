// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::traits::{new_record, required_string, SyncableEntity};
use crate::record::{DecodeError, FieldKind, FieldSpec, RecordId, RecordMeta, RemoteRecord, Schema};

static SCHEMA: Schema = Schema {
    record_type: "UserPreferences",
    fields: &[
        FieldSpec::required("userId", FieldKind::String),
        FieldSpec::optional("dietary", FieldKind::List),
        FieldSpec::optional("notificationsEnabled", FieldKind::Bool),
        FieldSpec::optional("units", FieldKind::String),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnits {
    Metric,
    Imperial,
}

impl MeasurementUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementUnits::Metric => "metric",
            MeasurementUnits::Imperial => "imperial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,

    /// Dietary restrictions, e.g. "vegetarian", "gluten-free"
    pub dietary: Vec<String>,

    pub notifications_enabled: bool,

    pub units: MeasurementUnits,

    /// Kept in the local settings copy so a later save carries the right tag
    #[serde(default)]
    pub meta: RecordMeta,
}

impl UserPreferences {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            dietary: Vec::new(),
            notifications_enabled: true,
            units: MeasurementUnits::Metric,
            meta: RecordMeta::default(),
        }
    }

    pub fn id_for(user_id: &str) -> RecordId {
        RecordId::new(format!("prefs_{}", user_id))
    }
}

impl SyncableEntity for UserPreferences {
    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn record_id(&self) -> RecordId {
        Self::id_for(&self.user_id)
    }

    fn encode(&self) -> RemoteRecord {
        new_record(self)
            .with_meta(&self.meta)
            .with("userId", self.user_id.as_str())
            .with("dietary", self.dietary.clone())
            .with("notificationsEnabled", self.notifications_enabled)
            .with("units", self.units.as_str())
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        let units = match record.string("units") {
            None | Some("metric") => MeasurementUnits::Metric,
            Some("imperial") => MeasurementUnits::Imperial,
            Some(other) => {
                warn!(units = %other, record_id = %record.id, "Unknown units, defaulting to metric");
                MeasurementUnits::Metric
            }
        };

        Ok(Self {
            user_id: required_string(record, "userId")?,
            dietary: record.string_list("dietary"),
            notifications_enabled: record.bool_or("notificationsEnabled", true),
            units,
            meta: RecordMeta::from_record(record),
        })
    }
}
