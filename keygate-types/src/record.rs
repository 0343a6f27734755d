//! The key record: one license key's entitlement and usage state.
//!
//! The record enforces its own invariants through its mutators:
//! - `devices.len() <= max_devices` at all times
//! - `devices` holds no duplicates (insertion order = bind order)
//!
//! Callers never get a way to push into `devices` directly; they go through
//! [`KeyRecord::bind_device`] / [`KeyRecord::unbind_device`] and act on the
//! returned outcome.

use crate::ids::{DeviceId, KeyId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Effect of a bind attempt on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Device appended; carries the new bound-device count.
    Bound(u32),
    /// Device was already bound; nothing changed. Carries the current count.
    AlreadyBound(u32),
    /// Capacity reached; nothing changed.
    AtCapacity,
}

/// Effect of an unbind attempt on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbindOutcome {
    /// Device removed; carries the remaining bound-device count.
    Removed(u32),
    /// Device was not bound; nothing changed. Carries the current count.
    NotBound(u32),
}

/// Remaining validity of a key, as reported in admin listings.
///
/// `Never` (no expiry configured) is distinct from `Expired` (deadline
/// passed) and from `Days(0)` (expires within the day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remaining {
    /// The key never expires.
    Never,
    /// The key's deadline has passed.
    Expired,
    /// Days left until expiry, rounded up.
    Days(u32),
}

/// Template for provisioning a key that does not exist yet.
///
/// Used both by the engine's preset table (bootstrap keys materialized on
/// first contact) and by the administrative create operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTemplate {
    /// Binding capacity of the new key.
    pub max_devices: u32,
    /// Days until expiry; `None` or `Some(0)` means the key never expires.
    pub expire_days: Option<u32>,
}

impl KeyTemplate {
    /// Creates a template with the given capacity and no expiry.
    #[must_use]
    pub fn perpetual(max_devices: u32) -> Self {
        Self {
            max_devices,
            expire_days: None,
        }
    }

    /// Creates a template expiring the given number of days after creation.
    #[must_use]
    pub fn expiring(max_devices: u32, expire_days: u32) -> Self {
        Self {
            max_devices,
            expire_days: Some(expire_days),
        }
    }

    /// Computes the expiry timestamp for a key created at `now`.
    #[must_use]
    pub fn expire_at_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.expire_days {
            None | Some(0) => None,
            Some(days) => Some(now + Duration::days(i64::from(days))),
        }
    }
}

/// Persisted state for one license key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// The key identifier. Immutable once created.
    key_id: KeyId,
    /// Binding capacity.
    max_devices: u32,
    /// Bound devices, in bind order, no duplicates.
    devices: Vec<DeviceId>,
    /// Creation timestamp. Immutable.
    created_at: DateTime<Utc>,
    /// Expiry timestamp; `None` means the key never expires.
    expire_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Creates a fresh record with no bound devices.
    #[must_use]
    pub fn new(
        key_id: KeyId,
        max_devices: u32,
        created_at: DateTime<Utc>,
        expire_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key_id,
            max_devices,
            devices: Vec::new(),
            created_at,
            expire_at,
        }
    }

    /// Materializes a fresh record from a template at `now`.
    #[must_use]
    pub fn from_template(key_id: KeyId, template: &KeyTemplate, now: DateTime<Utc>) -> Self {
        Self::new(
            key_id,
            template.max_devices,
            now,
            template.expire_at_from(now),
        )
    }

    /// Returns the key identifier.
    #[must_use]
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Returns the binding capacity.
    #[must_use]
    pub fn max_devices(&self) -> u32 {
        self.max_devices
    }

    /// Returns the bound devices in bind order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    /// Returns the number of bound devices.
    #[must_use]
    pub fn device_count(&self) -> u32 {
        self.devices.len() as u32
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the expiry timestamp, or `None` for a perpetual key.
    #[must_use]
    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    /// Returns true if the device is currently bound.
    #[must_use]
    pub fn is_bound(&self, device: &DeviceId) -> bool {
        self.devices.contains(device)
    }

    /// Returns true if at least one more device can bind.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.devices.len() < self.max_devices as usize
    }

    /// Returns true if the key's deadline has passed at `now`.
    ///
    /// A key with no `expire_at` never expires. The deadline itself still
    /// counts as valid; only strictly-after is expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expire_at {
            None => false,
            Some(deadline) => now > deadline,
        }
    }

    /// Returns the remaining validity at `now`, days rounded up.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Remaining {
        match self.expire_at {
            None => Remaining::Never,
            Some(deadline) => {
                if now > deadline {
                    Remaining::Expired
                } else {
                    let secs = (deadline - now).num_seconds().max(0) as u64;
                    Remaining::Days(secs.div_ceil(SECS_PER_DAY) as u32)
                }
            }
        }
    }

    /// Binds a device, preserving the capacity and no-duplicates invariants.
    pub fn bind_device(&mut self, device: DeviceId) -> BindOutcome {
        if self.devices.contains(&device) {
            return BindOutcome::AlreadyBound(self.device_count());
        }
        if !self.has_capacity() {
            return BindOutcome::AtCapacity;
        }
        self.devices.push(device);
        BindOutcome::Bound(self.device_count())
    }

    /// Unbinds a device if present.
    pub fn unbind_device(&mut self, device: &DeviceId) -> UnbindOutcome {
        match self.devices.iter().position(|d| d == device) {
            Some(idx) => {
                self.devices.remove(idx);
                UnbindOutcome::Removed(self.device_count())
            }
            None => UnbindOutcome::NotBound(self.device_count()),
        }
    }

    /// Replaces the expiry timestamp.
    pub fn set_expire_at(&mut self, expire_at: Option<DateTime<Utc>>) {
        self.expire_at = expire_at;
    }

    /// Replaces the binding capacity.
    ///
    /// Refused (returns false, no mutation) if the new capacity is zero or
    /// below the current bound-device count, which would break the capacity
    /// invariant for already-bound devices.
    pub fn set_max_devices(&mut self, max_devices: u32) -> bool {
        if max_devices == 0 || max_devices < self.device_count() {
            return false;
        }
        self.max_devices = max_devices;
        true
    }
}
