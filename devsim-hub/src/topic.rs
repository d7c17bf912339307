//! Hub MQTT topic names.
//!
//! Twin and method exchanges are correlated through a `$rid` request id
//! carried in the topic query string, e.g.
//! `$iothub/twin/res/200/?$rid=1`.

pub const TWIN_RESPONSES: &str = "$iothub/twin/res/#";
pub const DESIRED_PATCHES: &str = "$iothub/twin/PATCH/properties/desired/#";
pub const METHOD_REQUESTS: &str = "$iothub/methods/POST/#";

const TWIN_RESPONSE_PREFIX: &str = "$iothub/twin/res/";
const DESIRED_PATCH_PREFIX: &str = "$iothub/twin/PATCH/properties/desired/";
const METHOD_REQUEST_PREFIX: &str = "$iothub/methods/POST/";

pub fn telemetry(device_id: &str) -> String {
    format!("devices/{device_id}/messages/events/")
}

pub fn twin_get(request_id: &str) -> String {
    format!("$iothub/twin/GET/?$rid={request_id}")
}

pub fn reported_patch(request_id: &str) -> String {
    format!("$iothub/twin/PATCH/properties/reported/?$rid={request_id}")
}

pub fn method_response(status: u16, request_id: &str) -> String {
    format!("$iothub/methods/res/{status}/?$rid={request_id}")
}

/// An inbound topic the session knows how to route
#[derive(Debug, PartialEq, Eq)]
pub enum HubTopic<'a> {
    TwinResponse { status: u16, request_id: &'a str },
    DesiredPatch { version: Option<i64> },
    MethodRequest { name: &'a str, request_id: &'a str },
}

impl<'a> HubTopic<'a> {
    pub fn parse(topic: &'a str) -> Option<Self> {
        if let Some(rest) = topic.strip_prefix(TWIN_RESPONSE_PREFIX) {
            let (status, query) = rest.split_once("/?")?;
            return Some(HubTopic::TwinResponse {
                status: status.parse().ok()?,
                request_id: query_param(query, "$rid")?,
            });
        }

        if let Some(rest) = topic.strip_prefix(DESIRED_PATCH_PREFIX) {
            let query = rest.strip_prefix('?').unwrap_or(rest);
            return Some(HubTopic::DesiredPatch {
                version: query_param(query, "$version").and_then(|v| v.parse().ok()),
            });
        }

        if let Some(rest) = topic.strip_prefix(METHOD_REQUEST_PREFIX) {
            let (name, query) = rest.split_once("/?")?;
            return Some(HubTopic::MethodRequest {
                name,
                request_id: query_param(query, "$rid")?,
            });
        }

        None
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find_map(|(k, v)| (k == key).then_some(v))
}
