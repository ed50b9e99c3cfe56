// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier of a remote record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Dynamically-typed field value. Booleans travel as `Int` 0/1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    String(String),
    Int(i64),
    Double(f64),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::Double(_) => FieldKind::Double,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Bytes(_) => FieldKind::Bytes,
            FieldValue::List(_) => FieldKind::List,
        }
    }
}

/// Field kind as declared by an entity schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Int,
    Double,
    Date,
    Bytes,
    List,
    /// Stored as `Int`, read as non-zero.
    Bool,
}

impl FieldKind {
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (FieldKind::Bool, FieldValue::Int(_)) => true,
            // Integers are acceptable wherever doubles are expected.
            (FieldKind::Double, FieldValue::Int(_)) => true,
            (kind, value) => *kind == value.kind(),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value.into_iter().map(FieldValue::String).collect())
    }
}

/// Server-assigned metadata carried by entities that are read, modified and saved back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub modified_at: Option<DateTime<Utc>>,
    pub change_tag: Option<String>,
}

impl RecordMeta {
    pub fn from_record(record: &RemoteRecord) -> Self {
        Self {
            modified_at: record.modified_at,
            change_tag: record.change_tag.clone(),
        }
    }
}

/// A loosely-typed document as stored by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RecordId,

    pub record_type: String,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,

    /// Server-assigned modification time
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,

    /// Server-assigned version tag; a stale tag on save is a conflict
    #[serde(default)]
    pub change_tag: Option<String>,
}

impl RemoteRecord {
    pub fn new(record_type: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            fields: BTreeMap::new(),
            modified_at: None,
            change_tag: None,
        }
    }

    pub fn with_meta(mut self, meta: &RecordMeta) -> Self {
        self.modified_at = meta.modified_at;
        self.change_tag = meta.change_tag.clone();
        self
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Sets the field when `value` is present, removes it otherwise.
    pub fn set_opt<V: Into<FieldValue>>(&mut self, name: &str, value: Option<V>) {
        match value {
            Some(value) => self.set(name, value),
            None => {
                self.fields.remove(name);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn string_or(&self, name: &str, default: &str) -> String {
        self.string(name).unwrap_or(default).to_string()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        self.int(name).unwrap_or(default)
    }

    /// Reads a counter; negative stored values clamp to zero.
    pub fn count_or(&self, name: &str, default: u64) -> u64 {
        self.int(name)
            .map(|value| u64::try_from(value).unwrap_or(0))
            .unwrap_or(default)
    }

    pub fn double_or(&self, name: &str, default: f64) -> f64 {
        match self.fields.get(name) {
            Some(FieldValue::Double(value)) => *value,
            Some(FieldValue::Int(value)) => *value as f64,
            _ => default,
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.int(name).map(|value| value != 0).unwrap_or(default)
    }

    pub fn date(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.fields.get(name) {
            Some(FieldValue::Date(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.fields.get(name) {
            Some(FieldValue::Bytes(value)) => Some(value.as_slice()),
            _ => None,
        }
    }

    /// String elements of a list field; non-string elements are skipped.
    pub fn string_list(&self, name: &str) -> Vec<String> {
        match self.fields.get(name) {
            Some(FieldValue::List(items)) => items
                .iter()
                .filter_map(|item| match item {
                    FieldValue::String(value) => Some(value.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
