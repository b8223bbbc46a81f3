//! Manual-override ledger.
//!
//! At most one live override per appliance; a new `set` replaces the old
//! one.  Expiry is lazy: an override whose deadline has passed is dropped
//! the first time it is read at or after `expires_at`, so the result is
//! exact as of the querying tick without any background timer.
//!
//! Overrides are never persisted; a restart starts with an empty ledger.

use core::time::Duration;

use log::info;

use crate::appliance::{ApplianceId, MAX_APPLIANCES, RelayState};
use crate::clock::Instant;

/// An explicit human command pinned to one appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    pub appliance: ApplianceId,
    pub desired_state: RelayState,
    /// `None` = until cleared or superseded.
    pub expires_at: Option<Instant>,
}

impl Override {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| now >= t)
    }
}

/// Per-appliance override slots, indexed by [`ApplianceId`].
#[derive(Debug, Clone, Default)]
pub struct OverrideLedger {
    slots: [Option<Override>; MAX_APPLIANCES],
}

impl OverrideLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an override, replacing any existing one for `appliance`.
    pub fn set(
        &mut self,
        appliance: ApplianceId,
        desired_state: RelayState,
        timeout_minutes: Option<u32>,
        now: Instant,
    ) -> Override {
        let expires_at = timeout_minutes
            .map(|m| now.saturating_add(Duration::from_secs(u64::from(m) * 60)));
        let entry = Override {
            appliance,
            desired_state,
            expires_at,
        };
        if let Some(slot) = self.slots.get_mut(appliance.index()) {
            *slot = Some(entry);
        }
        entry
    }

    /// Drop the override for `appliance`.  Returns the removed entry.
    pub fn clear(&mut self, appliance: ApplianceId) -> Option<Override> {
        self.slots.get_mut(appliance.index()).and_then(Option::take)
    }

    pub fn clear_all(&mut self) {
        self.slots = [None; MAX_APPLIANCES];
    }

    /// Live override for `appliance` as of `now`; an expired entry is
    /// removed and `None` returned.
    pub fn get(&mut self, appliance: ApplianceId, now: Instant) -> Option<Override> {
        let slot = self.slots.get_mut(appliance.index())?;
        if slot.is_some_and(|o| o.is_expired(now)) {
            *slot = None;
        }
        *slot
    }

    /// Stored entry without expiry evaluation.
    pub fn peek(&self, appliance: ApplianceId) -> Option<Override> {
        self.slots.get(appliance.index()).copied().flatten()
    }

    /// Remove every override that is due at `now` and report them.
    pub fn expire_due(&mut self, now: Instant) -> heapless::Vec<Override, MAX_APPLIANCES> {
        let mut expired = heapless::Vec::new();
        for slot in &mut self.slots {
            if let Some(o) = slot.filter(|o| o.is_expired(now)) {
                info!("Override on {} expired at {}", o.appliance, now);
                *slot = None;
                let pushed = expired.push(o);
                debug_assert!(pushed.is_ok(), "one entry per slot");
            }
        }
        expired
    }

    /// Number of stored (not necessarily live) overrides.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
