// SPDX-License-Identifier: GPL-3.0-only
use crate::record::models::{FieldKind, RemoteRecord};

/// One declared field of an entity schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Explicit field list of one record type.
#[derive(Debug)]
pub struct Schema {
    pub record_type: &'static str,
    pub fields: &'static [FieldSpec],
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("record {record_id}: expected record type {expected}, got {actual}")]
    WrongRecordType {
        record_id: String,
        expected: &'static str,
        actual: String,
    },

    #[error("record {record_id}: missing required field '{field}'")]
    MissingField {
        record_id: String,
        field: &'static str,
    },

    #[error("record {record_id}: field '{field}' should be {expected:?}")]
    WrongKind {
        record_id: String,
        field: &'static str,
        expected: FieldKind,
    },

    #[error("record {record_id}: field '{field}' is invalid: {reason}")]
    InvalidValue {
        record_id: String,
        field: &'static str,
        reason: String,
    },
}

impl Schema {
    /// Checks record type, required presence and declared kinds.
    ///
    /// Fields the schema does not declare are ignored.
    pub fn validate(&self, record: &RemoteRecord) -> Result<(), DecodeError> {
        let record_id = record.id.as_str();

        if record.record_type != self.record_type {
            return Err(DecodeError::WrongRecordType {
                record_id: record_id.to_string(),
                expected: self.record_type,
                actual: record.record_type.clone(),
            });
        }

        for spec in self.fields {
            match record.get(spec.name) {
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(DecodeError::WrongKind {
                        record_id: record_id.to_string(),
                        field: spec.name,
                        expected: spec.kind,
                    });
                }
                Some(_) => {}
                None if spec.required => {
                    return Err(DecodeError::MissingField {
                        record_id: record_id.to_string(),
                        field: spec.name,
                    });
                }
                None => {}
            }
        }

        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }
}
