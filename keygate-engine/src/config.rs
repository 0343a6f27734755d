//! Engine configuration.

use keygate_types::{KeyId, KeyTemplate};
use std::collections::HashMap;
use std::time::Duration;
use subtle::ConstantTimeEq;

/// Configuration for the license engine.
///
/// The preset table drives auto-provisioning: a verify or bind against an
/// unknown key materializes a record from its template on first contact.
/// That behavior exists for bootstrap and demo setups; production configs
/// leave `auto_provision` off and create keys through the admin surface.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared secret gating the admin operations. An empty secret disables
    /// the admin surface entirely.
    pub admin_secret: String,
    /// Templates for keys the engine may materialize on first contact.
    pub presets: HashMap<KeyId, KeyTemplate>,
    /// Whether unknown keys with a preset template are auto-provisioned.
    pub auto_provision: bool,
    /// Deadline for a single store call; elapse is fatal for the request.
    pub store_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_secret: String::new(),
            presets: HashMap::new(),
            auto_provision: false,
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Compares a supplied admin secret against the configured one in
    /// constant time. An empty configured secret never matches.
    #[must_use]
    pub(crate) fn admin_secret_matches(&self, supplied: &str) -> bool {
        if self.admin_secret.is_empty() {
            return false;
        }
        self.admin_secret
            .as_bytes()
            .ct_eq(supplied.as_bytes())
            .into()
    }
}
