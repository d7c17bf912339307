use std::time::Duration;

use thiserror::Error;

use crate::util::crypto::SignatureError;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to sign hub token: {0}")]
    Signature(#[from] SignatureError),

    #[error("Connection failed: {0}")]
    Transport(#[from] rumqttc::ConnectionError),

    #[error("Connection not acknowledged after {0:?}")]
    Timeout(Duration),

    #[error("Failed to subscribe: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
}

#[derive(Debug, Error)]
#[error("Failed to publish: {0}")]
pub struct PublishError(#[from] rumqttc::ClientError);

/// Failure of a request/response exchange with the hub
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request could not be sent: {0}")]
    Send(#[from] rumqttc::ClientError),

    #[error("no response after {0:?}")]
    Timeout(Duration),

    #[error("session closed before a response arrived")]
    Closed,
}

#[derive(Debug, Error)]
pub enum TwinError {
    #[error("Twin request failed: {0}")]
    Request(#[from] RequestError),

    #[error("Twin request rejected with status {0}")]
    Status(u16),

    #[error("Twin document could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PropertyReportError {
    #[error("Reported properties update failed: {0}")]
    Request(#[from] RequestError),

    #[error("Reported properties update rejected with status {0}")]
    Status(u16),

    #[error("Reported properties could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CommandResponseError {
    #[error("Failed to send command response: {0}")]
    Send(#[from] rumqttc::ClientError),

    #[error("Command response could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}
