// SPDX-License-Identifier: GPL-3.0-only
pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod entitlement;
pub mod entity;
pub mod error;
pub mod local;
pub mod logging;
pub mod managers;
pub mod record;
pub mod store;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod test_helpers;

pub use app::App;
pub use config::Config;
pub use error::{ConflictReason, SyncError};
