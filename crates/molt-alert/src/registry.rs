//! In-memory alert registry.
//!
//! The registry holds at most one alert per id and applies the admission
//! rules: expired alerts are never stored, cancellation beats everything,
//! and resubmitting identical bytes is a no-op. Alerts are never persisted;
//! a restarted node re-learns them from peers.
//!
//! An id is cancelled if a cancel sweep removed it, or if a stored alert
//! still cancels it. Thresholds therefore stop applying once the cancelling
//! alert expires, and an alert never cancels its own id.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info};

use crate::types::{SignedAlert, Timestamp};

/// Outcome of [`AlertRegistry::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmitResult {
    /// The alert was inserted or replaced an older version with the same id.
    Stored,
    /// The identical alert was already stored.
    Duplicate,
    /// The alert had already expired.
    Expired,
    /// The alert id has been cancelled.
    AlreadyCancelled,
}

impl AdmitResult {
    /// Returns true if the registry changed to hold this alert.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }

    /// Returns a short label for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Duplicate => "duplicate",
            Self::Expired => "expired",
            Self::AlreadyCancelled => "already_cancelled",
        }
    }
}

impl fmt::Display for AdmitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full outcome of an admit, including ids that left the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// The admission decision for the incoming alert.
    pub result: AdmitResult,
    /// Ids removed by the expiry sweep.
    pub expired: Vec<i64>,
    /// Ids removed by the incoming alert's cancellation.
    pub cancelled: Vec<i64>,
}

impl Admission {
    /// Iterates every id that left the registry during this admit.
    pub fn removed(&self) -> impl Iterator<Item = i64> + '_ {
        self.expired.iter().chain(&self.cancelled).copied()
    }
}

/// Alerts currently held by this node, keyed by id.
#[derive(Debug, Default)]
pub struct AlertRegistry {
    alerts: BTreeMap<i64, SignedAlert>,
    /// Ids removed from the registry by a cancel sweep.
    cancelled: BTreeSet<i64>,
}

impl AlertRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a verified alert.
    ///
    /// Expired alerts are swept first. The cancellation sweep runs whether or
    /// not the incoming alert ends up stored.
    pub fn admit(&mut self, signed: SignedAlert, now: Timestamp) -> AdmitResult {
        self.admit_tracked(signed, now).result
    }

    /// Admits a verified alert and reports which ids left the registry.
    pub fn admit_tracked(&mut self, signed: SignedAlert, now: Timestamp) -> Admission {
        let expired = self.sweep_expired(now);

        if signed.alert().is_expired(now) {
            debug!(
                alert_id = signed.id(),
                expiration = %signed.alert().expiration,
                "rejected expired alert"
            );
            return Admission {
                result: AdmitResult::Expired,
                expired,
                cancelled: Vec::new(),
            };
        }

        let cancelled = self.apply_cancellation(&signed);
        let result = self.store(signed);
        Admission {
            result,
            expired,
            cancelled,
        }
    }

    fn store(&mut self, signed: SignedAlert) -> AdmitResult {
        let id = signed.id();
        if self.is_cancelled(id) {
            debug!(alert_id = id, "rejected cancelled alert");
            return AdmitResult::AlreadyCancelled;
        }

        if let Some(existing) = self.alerts.get(&id) {
            if existing.raw_payload() == signed.raw_payload() {
                debug!(alert_id = id, "duplicate alert");
                return AdmitResult::Duplicate;
            }
            info!(alert_id = id, "replacing alert with new version");
        } else {
            info!(
                alert_id = id,
                priority = signed.alert().priority,
                status = %signed.alert().status_text,
                "stored alert"
            );
        }

        self.alerts.insert(id, signed);
        AdmitResult::Stored
    }

    fn apply_cancellation(&mut self, signed: &SignedAlert) -> Vec<i64> {
        let alert = signed.alert();
        if alert.cancel <= 0 && alert.cancel_set.is_empty() {
            return Vec::new();
        }

        let removed: Vec<i64> = self
            .alerts
            .keys()
            .copied()
            .filter(|&stored| stored != alert.id && alert.cancels_id(stored))
            .collect();
        for stored in &removed {
            self.alerts.remove(stored);
            info!(alert_id = stored, cancelled_by = alert.id, "cancelled alert");
        }

        self.cancelled.extend(removed.iter().copied());
        removed
    }

    /// Removes every alert whose expiration is at or before `now`.
    ///
    /// Returns the removed ids.
    pub fn sweep_expired(&mut self, now: Timestamp) -> Vec<i64> {
        let expired: Vec<i64> = self
            .alerts
            .iter()
            .filter(|(_, signed)| signed.alert().is_expired(now))
            .map(|(&id, _)| id)
            .collect();

        for id in &expired {
            self.alerts.remove(id);
            debug!(alert_id = id, "expired alert removed");
        }

        expired
    }

    /// Returns true if `id` was removed by a cancel sweep or is cancelled by
    /// another stored alert.
    #[must_use]
    pub fn is_cancelled(&self, id: i64) -> bool {
        self.cancelled.contains(&id)
            || self
                .alerts
                .values()
                .any(|stored| stored.id() != id && stored.alert().cancels_id(id))
    }

    /// Returns the alert stored under `id`.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&SignedAlert> {
        self.alerts.get(&id)
    }

    /// Returns true if an alert is stored under `id`.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.alerts.contains_key(&id)
    }

    /// Returns the number of stored alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Returns true if no alerts are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Iterates stored alerts in id order.
    pub fn alerts(&self) -> impl Iterator<Item = &SignedAlert> {
        self.alerts.values()
    }

    /// Returns unexpired alerts, most urgent first (ties by ascending id).
    #[must_use]
    pub fn by_priority(&self, now: Timestamp) -> Vec<&SignedAlert> {
        let mut alerts: Vec<_> = self
            .alerts
            .values()
            .filter(|signed| !signed.alert().is_expired(now))
            .collect();
        alerts.sort_by(|a, b| {
            b.alert()
                .priority
                .cmp(&a.alert().priority)
                .then(a.id().cmp(&b.id()))
        });
        alerts
    }

    /// Returns the banner text of the most urgent alert targeting this client.
    #[must_use]
    pub fn status_bar(&self, now: Timestamp, version: i32, sub_version: &str) -> Option<&str> {
        self.by_priority(now)
            .into_iter()
            .find(|signed| signed.alert().applies_to(version, sub_version))
            .map(|signed| signed.alert().status_text.as_str())
    }
}
