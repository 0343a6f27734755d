//! Shared types for the Keygate core.
//!
//! Identifiers are opaque strings supplied by callers; the engine never
//! interprets them. `KeyRecord` is the single persisted entity: one license
//! key's binding capacity, bound devices, and optional expiry.

mod ids;
mod record;

pub use ids::{DeviceId, KeyId};
pub use record::{BindOutcome, KeyRecord, KeyTemplate, Remaining, UnbindOutcome};
