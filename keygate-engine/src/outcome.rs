//! Operation outcomes and the refusal taxonomy.
//!
//! Everything here is ordinary response data. A refused verify or a
//! capacity-reached bind is a frequent, expected outcome of normal
//! operation, so it travels as a [`Denial`] code inside a response rather
//! than as an error.

use chrono::{DateTime, Utc};
use keygate_types::{KeyId, KeyRecord, Remaining};
use serde::{Deserialize, Serialize};

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// No record and no provisioning template for the key.
    KeyNotFound,
    /// The key's deadline has passed.
    Expired,
    /// All binding capacity is consumed.
    CapacityReached,
    /// A record already exists for the key (admin create).
    AlreadyExists,
    /// The supplied admin secret does not match.
    Unauthorized,
    /// A required field is missing or malformed.
    InvalidInput,
}

impl Denial {
    /// Human-oriented message matching the reason code.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "key does not exist",
            Self::Expired => "key has expired",
            Self::CapacityReached => "device limit reached",
            Self::AlreadyExists => "key already exists",
            Self::Unauthorized => "admin secret mismatch",
            Self::InvalidInput => "missing or invalid field",
        }
    }
}

/// Result of a verify operation. Never reflects a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the device is currently authorized under the key.
    pub valid: bool,
    /// Whether a bind for this device would currently succeed.
    pub can_bind: bool,
    /// Refusal code when `valid` is false and the key itself refused.
    /// Absent for the plain "not bound yet" case (`can_bind` = true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// Current bound-device count.
    pub device_count: u32,
    /// Binding capacity of the key.
    pub max_devices: u32,
    /// Human-oriented message.
    pub msg: String,
}

impl VerifyResponse {
    pub(crate) fn authorized(record: &KeyRecord) -> Self {
        Self {
            valid: true,
            can_bind: false,
            reason: None,
            device_count: record.device_count(),
            max_devices: record.max_devices(),
            msg: "device authorized".to_string(),
        }
    }

    pub(crate) fn not_bound(record: &KeyRecord) -> Self {
        Self {
            valid: false,
            can_bind: true,
            reason: None,
            device_count: record.device_count(),
            max_devices: record.max_devices(),
            msg: "device not bound".to_string(),
        }
    }

    pub(crate) fn refused(reason: Denial, device_count: u32, max_devices: u32) -> Self {
        Self {
            valid: false,
            can_bind: false,
            reason: Some(reason),
            device_count,
            max_devices,
            msg: reason.message().to_string(),
        }
    }
}

/// Result of a bind operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindResponse {
    /// Whether the device is bound after the call (idempotent re-binds
    /// report true without mutating anything).
    pub success: bool,
    /// Refusal code when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// Bound-device count after the call.
    pub device_count: u32,
    /// Binding capacity of the key.
    pub max_devices: u32,
    /// Human-oriented message.
    pub msg: String,
}

impl BindResponse {
    pub(crate) fn bound(device_count: u32, max_devices: u32) -> Self {
        Self {
            success: true,
            reason: None,
            device_count,
            max_devices,
            msg: "device bound".to_string(),
        }
    }

    pub(crate) fn refused(reason: Denial, device_count: u32, max_devices: u32) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            device_count,
            max_devices,
            msg: reason.message().to_string(),
        }
    }
}

/// Result of an unbind operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbindResponse {
    /// Whether the device is absent after the call (unbinding a device
    /// that was never bound still reports true).
    pub success: bool,
    /// Refusal code when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// Bound-device count remaining after the call.
    pub device_count: u32,
    /// Human-oriented message.
    pub msg: String,
}

impl UnbindResponse {
    pub(crate) fn released(device_count: u32) -> Self {
        Self {
            success: true,
            reason: None,
            device_count,
            msg: "device released".to_string(),
        }
    }

    pub(crate) fn refused(reason: Denial) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            device_count: 0,
            msg: reason.message().to_string(),
        }
    }
}

/// One key an admin create refused, with the per-key reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRejection {
    /// The refused key.
    pub key_id: KeyId,
    /// Why it was refused.
    pub reason: Denial,
}

/// Result of an admin create. Partial success is normal: each requested key
/// lands in `created` or `rejected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAddResponse {
    /// True when every requested key was created.
    pub success: bool,
    /// Whole-operation refusal (bad secret, missing fields); per-key
    /// collisions go to `rejected` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// Keys created by this call.
    pub created: Vec<KeyId>,
    /// Keys refused, each with its reason.
    pub rejected: Vec<AddRejection>,
}

impl AdminAddResponse {
    pub(crate) fn refused(reason: Denial) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            created: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub(crate) fn done(created: Vec<KeyId>, rejected: Vec<AddRejection>) -> Self {
        Self {
            success: rejected.is_empty(),
            reason: None,
            created,
            rejected,
        }
    }
}

/// One key's state as reported by the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySummary {
    /// The key identifier.
    pub key_id: KeyId,
    /// Current bound-device count.
    pub device_count: u32,
    /// Binding capacity.
    pub max_devices: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp, absent for perpetual keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    /// Whether the key is expired at listing time.
    pub is_expired: bool,
    /// Remaining validity, days rounded up.
    pub remaining: Remaining,
}

impl KeySummary {
    pub(crate) fn of(record: &KeyRecord, now: DateTime<Utc>) -> Self {
        Self {
            key_id: record.key_id().clone(),
            device_count: record.device_count(),
            max_devices: record.max_devices(),
            created_at: record.created_at(),
            expire_at: record.expire_at(),
            is_expired: record.is_expired(now),
            remaining: record.remaining(now),
        }
    }
}

/// Result of an admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminListResponse {
    /// Whether the listing was produced.
    pub success: bool,
    /// Refusal code when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// One summary per stored key.
    pub keys: Vec<KeySummary>,
}

impl AdminListResponse {
    pub(crate) fn refused(reason: Denial) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            keys: Vec::new(),
        }
    }

    pub(crate) fn done(keys: Vec<KeySummary>) -> Self {
        Self {
            success: true,
            reason: None,
            keys,
        }
    }
}

/// Result of an admin delete. Deleting an absent key is not an error; it
/// just does not count toward `deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDelResponse {
    /// Whether the operation ran (true even when `deleted` < `requested`).
    pub success: bool,
    /// Refusal code when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// Number of keys requested for deletion.
    pub requested: u32,
    /// Number of records actually deleted.
    pub deleted: u32,
}

impl AdminDelResponse {
    pub(crate) fn refused(reason: Denial) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            requested: 0,
            deleted: 0,
        }
    }

    pub(crate) fn done(requested: u32, deleted: u32) -> Self {
        Self {
            success: true,
            reason: None,
            requested,
            deleted,
        }
    }
}

/// Result of an admin expiry reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSetExpireResponse {
    /// Whether the expiry was replaced.
    pub success: bool,
    /// Refusal code when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// The expiry now in effect, absent for perpetual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
}

impl AdminSetExpireResponse {
    pub(crate) fn refused(reason: Denial) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            expire_at: None,
        }
    }

    pub(crate) fn done(expire_at: Option<DateTime<Utc>>) -> Self {
        Self {
            success: true,
            reason: None,
            expire_at,
        }
    }
}

/// Result of an admin capacity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSetCapacityResponse {
    /// Whether the capacity was replaced.
    pub success: bool,
    /// Refusal code when `success` is false. `InvalidInput` covers a new
    /// capacity of zero or lower than the current bound-device count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Denial>,
    /// The capacity now in effect.
    pub max_devices: u32,
    /// Current bound-device count.
    pub device_count: u32,
}

impl AdminSetCapacityResponse {
    pub(crate) fn refused(reason: Denial) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            max_devices: 0,
            device_count: 0,
        }
    }

    pub(crate) fn done(record: &KeyRecord) -> Self {
        Self {
            success: true,
            reason: None,
            max_devices: record.max_devices(),
            device_count: record.device_count(),
        }
    }
}
