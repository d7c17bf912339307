use std::time::Duration;

use crate::util::http::Uri;
use crate::util::types::{DeviceId, SymmetricKey};

/// Global provisioning endpoint
pub const DEFAULT_PROVISIONING_ENDPOINT: &str = "https://global.azure-devices-provisioning.net";

/// The identity the device registers with
#[derive(Clone, Debug)]
pub struct DeviceIdentity {
    pub scope_id: String,
    pub registration_id: String,
    pub symmetric_key: SymmetricKey,
}

#[derive(Clone, Debug)]
pub struct RequestConfig {
    /// Timeout for every individual request
    pub timeout: Duration,

    /// Wait between registration status polls
    pub poll_interval: Duration,

    /// Give up if the registration is still pending after this many
    /// status polls
    pub max_polls: u32,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            poll_interval: Duration::from_millis(3_000),
            max_polls: 20,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProvisioningConfig {
    pub endpoint: Uri,
    pub request: RequestConfig,

    /// Lifetime of the registration token
    pub token_ttl: Duration,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            endpoint: Uri::from_static(DEFAULT_PROVISIONING_ENDPOINT),
            request: RequestConfig::default(),
            token_ttl: Duration::from_secs(3600),
        }
    }
}

/// The hub assignment returned by a successful registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningResult {
    pub assigned_hub: String,
    pub device_id: DeviceId,
}
