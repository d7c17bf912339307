/*
The simulated device.

Once a hub session is open the device periodically emits telemetry,
reports its static properties, applies writeable property changes sent
by the cloud and answers command invocations. All of it goes through the
`Hub` trait so the behaviour can run against any session implementation.
*/

mod commands;
mod config;
mod properties;
mod telemetry;
mod writeable;

#[cfg(test)]
mod testing;

pub use commands::{BlinkLed, CommandDispatcher, CommandHandler, CommandReply, Commands};
pub use config::DeviceConfig;
pub use properties::{AckStatus, DeviceProperties, PropertyPatch, send_device_properties};
pub use telemetry::{TelemetrySample, start_telemetry};
pub use writeable::{
    Resolution, SettlingProperty, WriteableDispatcher, WriteableProperties, WriteableProperty,
};

use std::sync::Arc;

use tracing::{debug, error, instrument};

use devsim_hub as hub;
use hub::{Hub, HubEvents};

/// Run the device on an open hub session.
///
/// Telemetry starts right away and runs for as long as the device does.
/// Property and command handling need the twin, if it cannot be fetched
/// they stay disabled and only telemetry is emitted.
pub async fn start_device<H: Hub>(hub: Arc<H>, events: HubEvents, config: DeviceConfig) {
    tokio::join!(
        start_telemetry(
            Arc::clone(&hub),
            config.base_hal,
            config.telemetry_interval
        ),
        start_twin_handlers(hub, events, &config),
    );
}

#[instrument(skip_all)]
async fn start_twin_handlers<H: Hub>(hub: Arc<H>, events: HubEvents, config: &DeviceConfig) {
    match hub.get_twin().await {
        Ok(twin) => debug!(desired = %twin.desired, "device twin received"),
        Err(e) => {
            error!("Error getting device twin: {e}");
            return;
        }
    }

    send_device_properties(hub.as_ref(), &DeviceProperties::default()).await;

    let HubEvents { desired, methods } = events;
    let writeable = WriteableDispatcher::new(Arc::clone(&hub), config.writeable_properties());
    let commands = CommandDispatcher::new(hub, config.commands());
    tokio::join!(writeable.start(desired), commands.start(methods));
}
