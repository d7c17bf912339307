use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::hub::Hub;

/// Static description of the simulated hardware, reported once on startup
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceProperties {
    pub model: String,
    pub features: String,
    pub cores: String,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            model: "ESP32-fake".to_string(),
            features: "XXX".to_string(),
            cores: "1".to_string(),
        }
    }
}

/// Acknowledgement state of a desired property
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Pending,
    Completed,
    Failed,
}

/// Reported acknowledgement of a single writeable property
///
/// Serializes as `{ key: { value, ad, ac, av } }`, the shape the hub
/// expects for writeable property acknowledgements.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyPatch {
    pub key: String,
    pub value: Value,
    pub ack_status: AckStatus,
    pub ack_code: i32,
    pub ack_version: Option<i64>,
}

#[derive(Serialize)]
struct Ack<'a> {
    value: &'a Value,
    ad: AckStatus,
    ac: i32,
    av: Option<i64>,
}

impl Serialize for PropertyPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &self.key,
            &Ack {
                value: &self.value,
                ad: self.ack_status,
                ac: self.ack_code,
                av: self.ack_version,
            },
        )?;
        map.end()
    }
}

/// Merge `properties` into the twin's reported section.
///
/// The outcome is only logged, callers never observe a failure.
pub async fn send_device_properties<H, P>(hub: &H, properties: &P)
where
    H: Hub + ?Sized,
    P: Serialize + ?Sized,
{
    let patch = match serde_json::to_value(properties) {
        Ok(patch) => patch,
        Err(e) => {
            error!("failed to serialize device properties: {e}");
            return;
        }
    };

    match hub.update_reported(&patch).await {
        Ok(()) => info!("Sent device properties: {patch}; status: success"),
        Err(e) => warn!("Sent device properties: {patch}; error: {e}"),
    }
}
