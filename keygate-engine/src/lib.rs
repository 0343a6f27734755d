//! License activation and device binding for Keygate.
//!
//! This crate owns the decision logic:
//! - Verify: is a device currently authorized under a key (read-only)
//! - Bind/unbind: consume or release one unit of binding capacity
//! - Administrative create/list/delete/reschedule/resize, gated by a
//!   shared secret
//!
//! # Design Principles
//!
//! - **Refusals are data, not errors**: unknown key, expired, capacity
//!   reached, wrong secret are ordinary results ([`Denial`]); only a failed
//!   or timed-out store call is an `Err`
//! - **Per-key serialization**: every read-modify-write holds a per-key
//!   lock, so two concurrent binds can never both pass the capacity check
//! - **Weak store assumptions**: the store only guarantees atomic
//!   single-key writes; nothing here relies on store transactions

mod config;
mod engine;
mod error;
mod outcome;
mod request;

pub use config::EngineConfig;
pub use engine::LicenseEngine;
pub use error::{EngineError, EngineResult};
pub use outcome::{
    AddRejection, AdminAddResponse, AdminDelResponse, AdminListResponse, AdminSetCapacityResponse,
    AdminSetExpireResponse, BindResponse, Denial, KeySummary, UnbindResponse, VerifyResponse,
};
pub use request::{Operation, Request, Response};
