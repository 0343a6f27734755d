//! The structured request/response surface.
//!
//! Transports (HTTP handlers, CLIs, test harnesses) build a [`Request`] and
//! hand it to [`LicenseEngine::dispatch`]. Field validation happens here,
//! before any store access: a missing required field comes back as an
//! `InvalidInput` refusal in the operation's own response shape.

use crate::engine::LicenseEngine;
use crate::error::EngineResult;
use crate::outcome::{
    AdminAddResponse, AdminDelResponse, AdminListResponse, AdminSetCapacityResponse,
    AdminSetExpireResponse, BindResponse, Denial, UnbindResponse, VerifyResponse,
};
use keygate_types::{DeviceId, KeyId, KeyTemplate};
use serde::{Deserialize, Serialize};

/// The operations the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Verify,
    Bind,
    Unbind,
    AdminAdd,
    AdminList,
    AdminDel,
    AdminSetExpire,
    AdminSetCapacity,
}

/// One incoming request. Optional fields are per-operation; dispatch
/// rejects requests missing a field their operation requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The requested operation.
    pub operation: Operation,
    /// The license key (verify, bind, unbind, single-key admin ops).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<KeyId>,
    /// Key batch for admin create/delete; falls back to `key_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ids: Option<Vec<KeyId>>,
    /// The device fingerprint (verify, bind, unbind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Shared secret for admin operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
    /// Binding capacity (admin create, capacity change).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_devices: Option<u32>,
    /// Days until expiry, 0 meaning never (admin create, reschedule).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_days: Option<u32>,
}

impl Request {
    fn bare(operation: Operation) -> Self {
        Self {
            operation,
            key_id: None,
            key_ids: None,
            device_id: None,
            admin_secret: None,
            max_devices: None,
            expire_days: None,
        }
    }

    /// Builds a verify request.
    #[must_use]
    pub fn verify(key_id: impl Into<KeyId>, device_id: impl Into<DeviceId>) -> Self {
        Self {
            key_id: Some(key_id.into()),
            device_id: Some(device_id.into()),
            ..Self::bare(Operation::Verify)
        }
    }

    /// Builds a bind request.
    #[must_use]
    pub fn bind(key_id: impl Into<KeyId>, device_id: impl Into<DeviceId>) -> Self {
        Self {
            key_id: Some(key_id.into()),
            device_id: Some(device_id.into()),
            ..Self::bare(Operation::Bind)
        }
    }

    /// Builds an unbind request.
    #[must_use]
    pub fn unbind(key_id: impl Into<KeyId>, device_id: impl Into<DeviceId>) -> Self {
        Self {
            key_id: Some(key_id.into()),
            device_id: Some(device_id.into()),
            ..Self::bare(Operation::Unbind)
        }
    }

    /// Builds an admin create request.
    #[must_use]
    pub fn admin_add(
        secret: impl Into<String>,
        key_ids: Vec<KeyId>,
        max_devices: u32,
        expire_days: u32,
    ) -> Self {
        Self {
            key_ids: Some(key_ids),
            admin_secret: Some(secret.into()),
            max_devices: Some(max_devices),
            expire_days: Some(expire_days),
            ..Self::bare(Operation::AdminAdd)
        }
    }

    /// Builds an admin list request.
    #[must_use]
    pub fn admin_list(secret: impl Into<String>) -> Self {
        Self {
            admin_secret: Some(secret.into()),
            ..Self::bare(Operation::AdminList)
        }
    }

    /// Builds an admin delete request.
    #[must_use]
    pub fn admin_del(secret: impl Into<String>, key_ids: Vec<KeyId>) -> Self {
        Self {
            key_ids: Some(key_ids),
            admin_secret: Some(secret.into()),
            ..Self::bare(Operation::AdminDel)
        }
    }

    /// Builds an expiry reschedule request.
    #[must_use]
    pub fn admin_set_expire(
        secret: impl Into<String>,
        key_id: impl Into<KeyId>,
        expire_days: u32,
    ) -> Self {
        Self {
            key_id: Some(key_id.into()),
            admin_secret: Some(secret.into()),
            expire_days: Some(expire_days),
            ..Self::bare(Operation::AdminSetExpire)
        }
    }

    /// Builds a capacity change request.
    #[must_use]
    pub fn admin_set_capacity(
        secret: impl Into<String>,
        key_id: impl Into<KeyId>,
        max_devices: u32,
    ) -> Self {
        Self {
            key_id: Some(key_id.into()),
            admin_secret: Some(secret.into()),
            max_devices: Some(max_devices),
            ..Self::bare(Operation::AdminSetCapacity)
        }
    }

    fn client_fields(&self) -> Option<(&KeyId, &DeviceId)> {
        let key_id = self.key_id.as_ref().filter(|k| !k.is_empty())?;
        let device_id = self.device_id.as_ref().filter(|d| !d.is_empty())?;
        Some((key_id, device_id))
    }

    /// The key batch for admin create/delete: `key_ids` when present,
    /// otherwise the singular `key_id`.
    fn batch_keys(&self) -> Vec<KeyId> {
        match (&self.key_ids, &self.key_id) {
            (Some(keys), _) => keys.clone(),
            (None, Some(key)) => vec![key.clone()],
            (None, None) => Vec::new(),
        }
    }
}

/// One outgoing response, tagged with its operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Response {
    Verify(VerifyResponse),
    Bind(BindResponse),
    Unbind(UnbindResponse),
    AdminAdd(AdminAddResponse),
    AdminList(AdminListResponse),
    AdminDel(AdminDelResponse),
    AdminSetExpire(AdminSetExpireResponse),
    AdminSetCapacity(AdminSetCapacityResponse),
}

impl Response {
    /// The operation's boolean outcome flag (`valid` for verify,
    /// `success` for everything else).
    #[must_use]
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Verify(r) => r.valid,
            Self::Bind(r) => r.success,
            Self::Unbind(r) => r.success,
            Self::AdminAdd(r) => r.success,
            Self::AdminList(r) => r.success,
            Self::AdminDel(r) => r.success,
            Self::AdminSetExpire(r) => r.success,
            Self::AdminSetCapacity(r) => r.success,
        }
    }

    /// The refusal code, if the operation was refused.
    #[must_use]
    pub fn reason(&self) -> Option<Denial> {
        match self {
            Self::Verify(r) => r.reason,
            Self::Bind(r) => r.reason,
            Self::Unbind(r) => r.reason,
            Self::AdminAdd(r) => r.reason,
            Self::AdminList(r) => r.reason,
            Self::AdminDel(r) => r.reason,
            Self::AdminSetExpire(r) => r.reason,
            Self::AdminSetCapacity(r) => r.reason,
        }
    }
}

impl LicenseEngine {
    /// Dispatches a structured request to the matching operation.
    ///
    /// # Errors
    ///
    /// Only a failed or timed-out store call errors; every business
    /// refusal is a normal [`Response`].
    pub async fn dispatch(&self, request: Request) -> EngineResult<Response> {
        match request.operation {
            Operation::Verify => {
                let Some((key_id, device_id)) = request.client_fields() else {
                    return Ok(Response::Verify(VerifyResponse::refused(
                        Denial::InvalidInput,
                        0,
                        0,
                    )));
                };
                Ok(Response::Verify(self.verify(key_id, device_id).await?))
            }
            Operation::Bind => {
                let Some((key_id, device_id)) = request.client_fields() else {
                    return Ok(Response::Bind(BindResponse::refused(
                        Denial::InvalidInput,
                        0,
                        0,
                    )));
                };
                Ok(Response::Bind(self.bind(key_id, device_id).await?))
            }
            Operation::Unbind => {
                let Some((key_id, device_id)) = request.client_fields() else {
                    return Ok(Response::Unbind(UnbindResponse::refused(
                        Denial::InvalidInput,
                    )));
                };
                Ok(Response::Unbind(self.unbind(key_id, device_id).await?))
            }
            Operation::AdminAdd => {
                let (Some(secret), Some(max_devices)) =
                    (request.admin_secret.as_deref(), request.max_devices)
                else {
                    return Ok(Response::AdminAdd(AdminAddResponse::refused(
                        Denial::InvalidInput,
                    )));
                };
                let keys = request.batch_keys();
                let template = KeyTemplate {
                    max_devices,
                    expire_days: request.expire_days,
                };
                Ok(Response::AdminAdd(
                    self.admin_add(secret, &keys, template).await?,
                ))
            }
            Operation::AdminList => {
                let Some(secret) = request.admin_secret.as_deref() else {
                    return Ok(Response::AdminList(AdminListResponse::refused(
                        Denial::InvalidInput,
                    )));
                };
                Ok(Response::AdminList(self.admin_list(secret).await?))
            }
            Operation::AdminDel => {
                let Some(secret) = request.admin_secret.as_deref() else {
                    return Ok(Response::AdminDel(AdminDelResponse::refused(
                        Denial::InvalidInput,
                    )));
                };
                let keys = request.batch_keys();
                Ok(Response::AdminDel(self.admin_del(secret, &keys).await?))
            }
            Operation::AdminSetExpire => {
                let (Some(secret), Some(key_id), Some(expire_days)) = (
                    request.admin_secret.as_deref(),
                    request.key_id.as_ref().filter(|k| !k.is_empty()),
                    request.expire_days,
                ) else {
                    return Ok(Response::AdminSetExpire(AdminSetExpireResponse::refused(
                        Denial::InvalidInput,
                    )));
                };
                Ok(Response::AdminSetExpire(
                    self.admin_set_expire(secret, key_id, expire_days).await?,
                ))
            }
            Operation::AdminSetCapacity => {
                let (Some(secret), Some(key_id), Some(max_devices)) = (
                    request.admin_secret.as_deref(),
                    request.key_id.as_ref().filter(|k| !k.is_empty()),
                    request.max_devices,
                ) else {
                    return Ok(Response::AdminSetCapacity(
                        AdminSetCapacityResponse::refused(Denial::InvalidInput),
                    ));
                };
                Ok(Response::AdminSetCapacity(
                    self.admin_set_capacity(secret, key_id, max_devices).await?,
                ))
            }
        }
    }
}
