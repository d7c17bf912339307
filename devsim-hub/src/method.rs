use serde_json::Value;

/// A command invocation from the cloud
#[derive(Clone, Debug, PartialEq)]
pub struct MethodRequest {
    pub name: String,
    pub request_id: String,
    pub payload: Value,
}

impl MethodRequest {
    /// Build the response to this invocation
    pub fn respond(&self, status: u16, payload: Value) -> MethodResponse {
        MethodResponse {
            request_id: self.request_id.clone(),
            status,
            payload,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodResponse {
    pub request_id: String,
    pub status: u16,
    pub payload: Value,
}
