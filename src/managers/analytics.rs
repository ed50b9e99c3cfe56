// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tracing::debug;

use crate::auth::{authorize, AuthProvider, Feature};
use crate::entity::AnalyticsEvent;
use crate::sync::{BackgroundQueue, SyncClient};

/// Fire-and-forget telemetry. Events from signed-out users are recorded without a user id.
pub struct AnalyticsTracker {
    client: Arc<SyncClient>,
    auth: Arc<dyn AuthProvider>,
    queue: BackgroundQueue,
}

impl AnalyticsTracker {
    pub fn new(client: Arc<SyncClient>, auth: Arc<dyn AuthProvider>, queue: BackgroundQueue) -> Self {
        Self {
            client,
            auth,
            queue,
        }
    }

    /// Queue an event; returns whether it was accepted. Delivery failures are only logged.
    pub fn track(&self, name: &str, properties: &[(&str, &str)]) -> bool {
        let user_id = match authorize(self.auth.as_ref(), Feature::Analytics) {
            Ok(user_id) => user_id,
            Err(e) => {
                debug!(event = %name, error = %e, "Analytics event not allowed");
                return false;
            }
        };

        let event = properties
            .iter()
            .fold(AnalyticsEvent::new(name, user_id), |event, (key, value)| {
                event.with_property(*key, *value)
            });

        let client = self.client.clone();
        self.queue.enqueue(&format!("analytics:{}", name), async move {
            client.save(&event).await.map(|_| ())
        })
    }
}
