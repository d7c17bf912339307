/*
This crate is home to everything related to the device provisioning
service.

Provisioning is a one-time exchange that binds the device identity to a
hub. It is performed once on startup, the result is only used to connect
to the assigned hub and is never stored.
*/

mod config;
mod provisioning;

pub use config::{
    DEFAULT_PROVISIONING_ENDPOINT, DeviceIdentity, ProvisioningConfig, ProvisioningResult,
    RequestConfig,
};
pub use provisioning::{ProvisioningError, RegistrationStatus, register};

use devsim_util as util;
