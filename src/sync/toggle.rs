// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::SyncError;

/// Keys with a mutation in flight.
///
/// Cooperative only: a caller that finds its key busy drops its operation
/// instead of waiting.
#[derive(Debug, Default)]
pub struct OperationState {
    in_flight: Mutex<HashSet<String>>,
}

impl OperationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` busy; `None` when it already is.
    pub fn try_begin(&self, key: &str) -> Option<InFlightGuard<'_>> {
        let inserted = match self.in_flight.lock() {
            Ok(mut keys) => keys.insert(key.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(key.to_string()),
        };
        inserted.then(|| InFlightGuard {
            state: self,
            key: key.to_string(),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        match self.in_flight.lock() {
            Ok(keys) => keys.contains(key),
            Err(poisoned) => poisoned.into_inner().contains(key),
        }
    }

    fn finish(&self, key: &str) {
        match self.in_flight.lock() {
            Ok(mut keys) => keys.remove(key),
            Err(poisoned) => poisoned.into_inner().remove(key),
        };
    }
}

/// Clears the in-flight mark when dropped, whatever way the operation ended.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    state: &'a OperationState,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.finish(&self.key);
    }
}

/// Membership flag plus the counter shown next to it (e.g. liked + like count).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleState {
    pub active: bool,
    pub count: u64,
}

impl ToggleState {
    pub fn new(active: bool, count: u64) -> Self {
        Self { active, count }
    }

    /// The inverse state: membership flipped, counter moved by one and floored at zero.
    pub fn flipped(&self) -> Self {
        let count = if self.active {
            self.count.saturating_sub(1)
        } else {
            self.count.saturating_add(1)
        };
        Self {
            active: !self.active,
            count,
        }
    }
}

/// Lifecycle of one toggle: `Idle -> Optimistic -> {Confirmed, RolledBack}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TogglePhase {
    Idle,
    Optimistic {
        snapshot: ToggleState,
        applied: ToggleState,
    },
    Confirmed(ToggleState),
    RolledBack(ToggleState),
}

impl TogglePhase {
    pub fn begin(snapshot: ToggleState) -> Self {
        TogglePhase::Optimistic {
            snapshot,
            applied: snapshot.flipped(),
        }
    }

    /// Accept the optimistic state, replacing the counter when the store reported one.
    pub fn confirm(self, authoritative_count: Option<u64>) -> Self {
        match self {
            TogglePhase::Optimistic { applied, .. } => TogglePhase::Confirmed(ToggleState {
                count: authoritative_count.unwrap_or(applied.count),
                ..applied
            }),
            other => other,
        }
    }

    /// Back to the pre-toggle snapshot, exactly.
    pub fn roll_back(self) -> Self {
        match self {
            TogglePhase::Optimistic { snapshot, .. } => TogglePhase::RolledBack(snapshot),
            other => other,
        }
    }

    /// The state the cache should show in this phase.
    pub fn visible_state(&self) -> Option<ToggleState> {
        match self {
            TogglePhase::Idle => None,
            TogglePhase::Optimistic { applied, .. } => Some(*applied),
            TogglePhase::Confirmed(state) | TogglePhase::RolledBack(state) => Some(*state),
        }
    }
}

/// Remote side of a toggle.
#[async_trait]
pub trait ToggleRemote: Send + Sync {
    /// Turn the membership on remotely
    async fn apply(&self, key: &str) -> Result<(), SyncError>;

    /// Turn the membership off remotely
    async fn revert(&self, key: &str) -> Result<(), SyncError>;

    /// Authoritative counter after a successful mutation, if the store can tell
    async fn authoritative_count(&self, _key: &str) -> Result<Option<u64>, SyncError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Another toggle on the same key was in flight; nothing happened
    Skipped,
    Confirmed(ToggleState),
}

/// Cached toggle states with optimistic flips and exact rollback.
#[derive(Debug, Default)]
pub struct ToggleSet {
    states: RwLock<HashMap<String, ToggleState>>,
    operations: OperationState,
    /// Bumped by [`ToggleSet::clear`]; toggles started before a clear do not write back
    generation: AtomicU64,
}

impl ToggleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, key: &str) -> ToggleState {
        self.states.read().await.get(key).copied().unwrap_or_default()
    }

    pub async fn seed(&self, key: &str, state: ToggleState) {
        self.states.write().await.insert(key.to_string(), state);
    }

    /// Seed `key` only when nothing is cached for it yet.
    pub async fn seed_if_absent(&self, key: &str, state: ToggleState) {
        self.states
            .write()
            .await
            .entry(key.to_string())
            .or_insert(state);
    }

    /// Forget every cached state, e.g. when the signed-in user changes.
    pub async fn clear(&self) {
        let mut states = self.states.write().await;
        states.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn set_count(&self, key: &str, count: u64) {
        self.states
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .count = count;
    }

    pub async fn set_active(&self, key: &str, active: bool) {
        self.states
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .active = active;
    }

    pub async fn active_keys(&self) -> Vec<String> {
        self.states
            .read()
            .await
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.operations.is_in_flight(key)
    }

    /// Flip `key` optimistically and push the change to `remote`.
    ///
    /// Returns [`ToggleOutcome::Skipped`] without touching anything when a
    /// toggle on `key` is already running. On remote failure the cached state
    /// is restored to the pre-toggle snapshot and the error is returned.
    pub async fn toggle<R>(&self, key: &str, remote: &R) -> Result<ToggleOutcome, SyncError>
    where
        R: ToggleRemote + ?Sized,
    {
        let Some(_guard) = self.operations.try_begin(key) else {
            debug!(key, "Toggle already in flight, ignoring");
            return Ok(ToggleOutcome::Skipped);
        };

        let (phase, generation) = {
            let mut states = self.states.write().await;
            let snapshot = states.get(key).copied().unwrap_or_default();
            let phase = TogglePhase::begin(snapshot);
            if let Some(applied) = phase.visible_state() {
                states.insert(key.to_string(), applied);
            }
            (phase, self.generation.load(Ordering::SeqCst))
        };

        let turning_on = phase.visible_state().is_some_and(|state| state.active);
        let result = if turning_on {
            remote.apply(key).await
        } else {
            remote.revert(key).await
        };

        let phase = match result {
            Ok(()) => {
                let count = match remote.authoritative_count(key).await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(key, error = %e, "Failed to refresh count, keeping optimistic value");
                        None
                    }
                };
                phase.confirm(count)
            }
            Err(e) => {
                let rolled_back = phase.roll_back();
                if let Some(state) = rolled_back.visible_state() {
                    self.write_back(key, state, generation).await;
                }
                warn!(key, error = %e, "Toggle failed, rolled back");
                return Err(e);
            }
        };

        let confirmed = phase.visible_state().unwrap_or_default();
        self.write_back(key, confirmed, generation).await;
        debug!(key, active = confirmed.active, count = confirmed.count, "Toggle confirmed");
        Ok(ToggleOutcome::Confirmed(confirmed))
    }

    async fn write_back(&self, key: &str, state: ToggleState, generation: u64) {
        let mut states = self.states.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            states.insert(key.to_string(), state);
        } else {
            debug!(key, "States cleared during toggle, dropping result");
        }
    }
}
