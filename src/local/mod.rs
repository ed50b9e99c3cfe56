// SPDX-License-Identifier: GPL-3.0-only
pub mod blobs;
pub mod sqlite;
pub mod traits;

pub use blobs::FileBlobStore;
pub use sqlite::SqliteSettingsStore;
pub use traits::{load_setting, store_setting, BlobStore, SettingsStore};
