// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod schema;

pub use models::{FieldKind, FieldValue, RecordId, RecordMeta, RemoteRecord};
pub use schema::{DecodeError, FieldSpec, Schema};
