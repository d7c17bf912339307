use std::time::Duration;

use crate::commands::{BlinkLed, Commands};
use crate::writeable::{SettlingProperty, WriteableProperties};

/// Behaviour of the simulated device
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Lower bound of the simulated hal reading
    pub base_hal: i64,

    /// Period between telemetry messages
    pub telemetry_interval: Duration,

    /// Time the `name` property takes to settle
    pub name_settle_delay: Duration,

    /// Time the `brightness` property takes to settle
    pub brightness_settle_delay: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_hal: 0,
            telemetry_interval: Duration::from_millis(1_000),
            name_settle_delay: Duration::from_millis(1_000),
            brightness_settle_delay: Duration::from_millis(5_000),
        }
    }
}

impl DeviceConfig {
    /// The writeable properties the device understands
    pub fn writeable_properties(&self) -> WriteableProperties {
        WriteableProperties::new()
            .with("name", SettlingProperty::new(self.name_settle_delay))
            .with("brightness", SettlingProperty::new(self.brightness_settle_delay))
    }

    /// The commands the device answers
    pub fn commands(&self) -> Commands {
        Commands::new().with(BlinkLed::NAME, BlinkLed)
    }
}
