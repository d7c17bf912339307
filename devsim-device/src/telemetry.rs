use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::hub::Hub;

/// Width of the range simulated readings fall in
const HAL_SPREAD: f64 = 15.0;

/// A single simulated reading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TelemetrySample {
    #[serde(rename = "Hal")]
    pub hal: i64,
}

impl TelemetrySample {
    /// Sample a reading in `[base_hal, base_hal + 15]`
    pub fn generate<R: Rng + ?Sized>(base_hal: i64, rng: &mut R) -> Self {
        // only the offset goes through floating point, large bases stay exact
        let offset = rng.random_range(0.0..HAL_SPREAD).round() as i64;
        Self {
            hal: base_hal.saturating_add(offset),
        }
    }
}

/// Emit a sample every `period`, forever.
///
/// The first sample goes out one period after start. Every publish runs
/// on its own task so a slow publish never delays the next tick, and a
/// failed publish is only logged.
pub async fn start_telemetry<H: Hub>(hub: Arc<H>, base_hal: i64, period: Duration) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let sample = TelemetrySample::generate(base_hal, &mut rand::rng());
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { send_telemetry(hub.as_ref(), sample).await });
    }
}

async fn send_telemetry<H: Hub + ?Sized>(hub: &H, sample: TelemetrySample) {
    let payload = match serde_json::to_string(&sample) {
        Ok(payload) => payload,
        Err(e) => {
            error!("failed to serialize telemetry: {e}");
            return;
        }
    };

    match hub.send_event(payload.clone().into_bytes()).await {
        Ok(()) => info!("Sent message: {payload}"),
        Err(e) => warn!("Sent message: {payload}; error: {e}"),
    }
}
