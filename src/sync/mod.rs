// SPDX-License-Identifier: GPL-3.0-only
pub mod background;
pub mod client;
pub mod retry;
pub mod toggle;

pub use background::BackgroundQueue;
pub use client::{Repository, SyncClient};
pub use retry::{with_retry, RetryPolicies, RetryPolicy};
pub use toggle::{
    InFlightGuard, OperationState, ToggleOutcome, ToggleRemote, ToggleSet, ToggleState, TogglePhase,
};
