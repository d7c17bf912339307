use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The device twin as returned by the hub
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Twin {
    #[serde(default)]
    pub desired: Value,

    #[serde(default)]
    pub reported: Value,
}

/// A desired properties notification.
///
/// `$version` is lifted out of the document so `settings` only holds
/// the changed setting names and their new values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesiredChange {
    pub version: Option<i64>,
    pub settings: Map<String, Value>,
}

impl DesiredChange {
    /// Decode a desired properties patch, falling back to the version
    /// from the topic if the document has none.
    pub fn from_payload(
        payload: &[u8],
        topic_version: Option<i64>,
    ) -> Result<Self, serde_json::Error> {
        let mut settings: Map<String, Value> = serde_json::from_slice(payload)?;
        let version = settings
            .remove("$version")
            .and_then(|v| v.as_i64())
            .or(topic_version);

        Ok(Self { version, settings })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn it_lifts_the_version_out_of_the_settings() {
        let change =
            DesiredChange::from_payload(br#"{"name": "X", "$version": 3}"#, Some(9)).unwrap();

        assert_eq!(change.version, Some(3));
        assert_eq!(change.settings.len(), 1);
        assert_eq!(change.settings.get("name"), Some(&json!("X")));
    }

    #[test]
    fn it_uses_the_topic_version_as_fallback() {
        let change = DesiredChange::from_payload(br#"{"brightness": 40}"#, Some(9)).unwrap();
        assert_eq!(change.version, Some(9));
    }

    #[test]
    fn it_rejects_documents_that_are_not_objects() {
        assert!(DesiredChange::from_payload(b"[1, 2]", None).is_err());
    }

    #[test]
    fn it_decodes_a_twin_document() {
        let twin: Twin = serde_json::from_value(json!({
            "desired": {"name": "kitchen", "$version": 4},
            "reported": {"Model": "ESP32-fake", "$version": 12}
        }))
        .unwrap();

        assert_eq!(twin.desired["name"], json!("kitchen"));
        assert_eq!(twin.reported["$version"], json!(12));
    }
}
