// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Basic,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Premium => "premium",
        }
    }

    /// Meal generations allowed per calendar day; `None` is unlimited.
    pub fn daily_meal_limit(&self) -> Option<u32> {
        match self {
            SubscriptionTier::Free => Some(1),
            SubscriptionTier::Basic => Some(2),
            SubscriptionTier::Premium => None,
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionTier::Free),
            "basic" => Ok(SubscriptionTier::Basic),
            "premium" => Ok(SubscriptionTier::Premium),
            other => Err(anyhow::anyhow!("Unknown subscription tier: {}", other)),
        }
    }
}

/// Purchase status as reported by the platform store. Purchase verification
/// happens elsewhere; this side only reads the result.
pub trait EntitlementProvider: Send + Sync {
    fn tier(&self) -> SubscriptionTier;

    fn is_premium(&self) -> bool {
        self.tier() == SubscriptionTier::Premium
    }
}

/// Entitlement set by the host application when the store reports a change.
pub struct StaticEntitlement {
    tier: RwLock<SubscriptionTier>,
}

impl StaticEntitlement {
    pub fn new(tier: SubscriptionTier) -> Self {
        Self {
            tier: RwLock::new(tier),
        }
    }

    pub fn set_tier(&self, tier: SubscriptionTier) {
        match self.tier.write() {
            Ok(mut guard) => *guard = tier,
            Err(poisoned) => *poisoned.into_inner() = tier,
        }
    }
}

impl EntitlementProvider for StaticEntitlement {
    fn tier(&self) -> SubscriptionTier {
        match self.tier.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
