use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Span, debug, field, info, instrument};

use crate::util::crypto::{SasToken, SignatureError, expiry_from_now};
use crate::util::http::InvalidUriError;

use super::config::{DeviceIdentity, ProvisioningConfig, ProvisioningResult};

const API_VERSION: &str = "api-version=2021-06-01";

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Missing {0}")]
    MissingCredential(&'static str),

    #[error("Invalid provisioning endpoint URI: {0}")]
    InvalidEndpoint(#[from] InvalidUriError),

    #[error("Failed to sign registration token: {0}")]
    Signature(#[from] SignatureError),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provisioning service returned error: ({0}) {1}")]
    Status(StatusCode, String),

    #[error("Registration {0}: {1}")]
    Rejected(RegistrationStatus, String),

    #[error("Registration assigned without a hub or device id")]
    IncompleteAssignment,

    #[error("Registration still pending after {0} status polls")]
    Pending(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Unassigned,
    Assigning,
    Assigned,
    Failed,
    Disabled,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            RegistrationStatus::Unassigned => "unassigned",
            RegistrationStatus::Assigning => "assigning",
            RegistrationStatus::Assigned => "assigned",
            RegistrationStatus::Failed => "failed",
            RegistrationStatus::Disabled => "disabled",
        };
        f.write_str(status)
    }
}

/*
    request {
        registrationId
        payload?
    }
*/
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    registration_id: &'a str,
}

/*
    response {
        operationId
        status
        registrationState? {
            registrationId
            assignedHub?
            deviceId?
            status
            errorCode?
            errorMessage?
        }
    }
*/
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    operation_id: String,
    status: RegistrationStatus,
    registration_state: Option<RegistrationState>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationState {
    assigned_hub: Option<String>,
    device_id: Option<String>,
    error_message: Option<String>,
}

impl DeviceIdentity {
    fn validate(&self) -> Result<(), ProvisioningError> {
        if self.scope_id.is_empty() {
            return Err(ProvisioningError::MissingCredential("scope id"));
        }
        if self.registration_id.is_empty() {
            return Err(ProvisioningError::MissingCredential("registration id"));
        }
        if self.symmetric_key.is_empty() {
            return Err(ProvisioningError::MissingCredential("symmetric key"));
        }
        Ok(())
    }
}

/// Register the device with the provisioning service.
///
/// Sends the registration request and polls the operation status until
/// the service assigns a hub or rejects the device. Any failure is
/// returned as is, there are no retries.
#[instrument(skip_all, fields(registration_id = %identity.registration_id, result = field::Empty), err)]
pub async fn register(
    identity: &DeviceIdentity,
    config: &ProvisioningConfig,
) -> Result<ProvisioningResult, ProvisioningError> {
    identity.validate()?;

    let resource = format!(
        "{}/registrations/{}",
        identity.scope_id, identity.registration_id
    );
    let token = SasToken::sign(
        &resource,
        &identity.symmetric_key,
        expiry_from_now(config.token_ttl),
    )?
    .with_key_name("registration")
    .to_string();

    let client = Client::new();
    let timeout = config.request.timeout;

    let endpoint = config
        .endpoint
        .join(&format!("/{resource}/register"), Some(API_VERSION))?;

    debug!("calling provisioning service");
    let response = client
        .put(endpoint.to_string())
        .header(AUTHORIZATION, &token)
        .timeout(timeout)
        .json(&RegisterRequest {
            registration_id: &identity.registration_id,
        })
        .send()
        .await?;
    let mut operation: OperationStatus = check_status(response).await?.json().await?;

    let mut polls = 0;
    while matches!(
        operation.status,
        RegistrationStatus::Unassigned | RegistrationStatus::Assigning
    ) {
        if polls >= config.request.max_polls {
            return Err(ProvisioningError::Pending(polls));
        }
        polls += 1;

        tokio::time::sleep(config.request.poll_interval).await;

        let endpoint = config.endpoint.join(
            &format!("/{resource}/operations/{}", operation.operation_id),
            Some(API_VERSION),
        )?;

        debug!(
            operation = %operation.operation_id,
            status = field::display(operation.status),
            "polling registration status"
        );
        let response = client
            .get(endpoint.to_string())
            .header(AUTHORIZATION, &token)
            .timeout(timeout)
            .send()
            .await?;
        operation = check_status(response).await?.json().await?;
    }

    Span::current().record("result", field::display(operation.status));

    let state = operation.registration_state;
    match operation.status {
        RegistrationStatus::Assigned => {
            let (assigned_hub, device_id) = state
                .and_then(|s| s.assigned_hub.zip(s.device_id))
                .ok_or(ProvisioningError::IncompleteAssignment)?;

            info!(hub = %assigned_hub, device_id = %device_id, "registration succeeded");
            Ok(ProvisioningResult {
                assigned_hub,
                device_id: device_id.into(),
            })
        }
        status => Err(ProvisioningError::Rejected(
            status,
            state
                .and_then(|s| s.error_message)
                .unwrap_or_else(|| "no reason given".to_string()),
        )),
    }
}

async fn check_status(response: Response) -> Result<Response, ProvisioningError> {
    if !response.status().is_success() {
        let err_code = response.status();
        let err_msg = response.text().await.unwrap_or_default();
        return Err(ProvisioningError::Status(err_code, err_msg));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;
    use crate::config::RequestConfig;
    use crate::util::http::Uri;

    const SCOPE: &str = "0ne000ABCDE";
    const DEVICE: &str = "sim-device-01";
    const KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    fn test_identity() -> DeviceIdentity {
        DeviceIdentity {
            scope_id: SCOPE.to_string(),
            registration_id: DEVICE.to_string(),
            symmetric_key: KEY.into(),
        }
    }

    fn test_config(endpoint: Uri) -> ProvisioningConfig {
        ProvisioningConfig {
            endpoint,
            request: RequestConfig {
                timeout: Duration::from_secs(10),
                poll_interval: Duration::from_millis(10),
                max_polls: 3,
            },
            token_ttl: Duration::from_secs(60),
        }
    }

    fn api_version() -> Matcher {
        Matcher::UrlEncoded("api-version".into(), "2021-06-01".into())
    }

    #[tokio::test]
    async fn it_registers_and_returns_the_assigned_hub() {
        let mut server = Server::new_async().await;
        let endpoint: Uri = server.url().try_into().unwrap();

        let register_mock = server
            .mock("PUT", "/0ne000ABCDE/registrations/sim-device-01/register")
            .match_query(api_version())
            .match_header(
                "authorization",
                Matcher::Regex(
                    r"^SharedAccessSignature sr=0ne000ABCDE%2Fregistrations%2Fsim-device-01&sig=.+&se=\d+&skn=registration$"
                        .into(),
                ),
            )
            .match_body(Matcher::Json(json!({ "registrationId": DEVICE })))
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"operationId": "4.abc", "status": "assigning"}"#)
            .create_async()
            .await;

        let status_mock = server
            .mock("GET", "/0ne000ABCDE/registrations/sim-device-01/operations/4.abc")
            .match_query(api_version())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "operationId": "4.abc",
                    "status": "assigned",
                    "registrationState": {
                        "registrationId": DEVICE,
                        "assignedHub": "iotc-123.azure-devices.net",
                        "deviceId": DEVICE,
                        "status": "assigned"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = register(&test_identity(), &test_config(endpoint))
            .await
            .unwrap();

        assert_eq!(
            result,
            ProvisioningResult {
                assigned_hub: "iotc-123.azure-devices.net".to_string(),
                device_id: DEVICE.into(),
            }
        );

        register_mock.assert_async().await;
        status_mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_accepts_an_assignment_in_the_register_response() {
        let mut server = Server::new_async().await;
        let endpoint: Uri = server.url().try_into().unwrap();

        let register_mock = server
            .mock("PUT", "/0ne000ABCDE/registrations/sim-device-01/register")
            .match_query(api_version())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "operationId": "4.def",
                    "status": "assigned",
                    "registrationState": {
                        "assignedHub": "iotc-456.azure-devices.net",
                        "deviceId": "renamed-device",
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = register(&test_identity(), &test_config(endpoint))
            .await
            .unwrap();

        assert_eq!(result.assigned_hub, "iotc-456.azure-devices.net");
        assert_eq!(result.device_id, "renamed-device".into());

        register_mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_fails_on_an_error_response() {
        let mut server = Server::new_async().await;
        let endpoint: Uri = server.url().try_into().unwrap();

        let register_mock = server
            .mock("PUT", "/0ne000ABCDE/registrations/sim-device-01/register")
            .match_query(api_version())
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let result = register(&test_identity(), &test_config(endpoint)).await;

        assert!(matches!(
            result,
            Err(ProvisioningError::Status(StatusCode::UNAUTHORIZED, ref msg)) if msg == "unauthorized"
        ));
        register_mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_fails_when_the_registration_is_rejected() {
        let mut server = Server::new_async().await;
        let endpoint: Uri = server.url().try_into().unwrap();

        server
            .mock("PUT", "/0ne000ABCDE/registrations/sim-device-01/register")
            .match_query(api_version())
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"operationId": "4.abc", "status": "assigning"}"#)
            .create_async()
            .await;

        server
            .mock("GET", "/0ne000ABCDE/registrations/sim-device-01/operations/4.abc")
            .match_query(api_version())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "operationId": "4.abc",
                    "status": "failed",
                    "registrationState": {
                        "status": "failed",
                        "errorMessage": "Custom allocation failed"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = register(&test_identity(), &test_config(endpoint)).await;

        assert!(matches!(
            result,
            Err(ProvisioningError::Rejected(RegistrationStatus::Failed, ref msg))
                if msg == "Custom allocation failed"
        ));
    }

    #[tokio::test]
    async fn it_gives_up_when_the_registration_stays_pending() {
        let mut server = Server::new_async().await;
        let endpoint: Uri = server.url().try_into().unwrap();

        server
            .mock("PUT", "/0ne000ABCDE/registrations/sim-device-01/register")
            .match_query(api_version())
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"operationId": "4.abc", "status": "assigning"}"#)
            .create_async()
            .await;

        let status_mock = server
            .mock("GET", "/0ne000ABCDE/registrations/sim-device-01/operations/4.abc")
            .match_query(api_version())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"operationId": "4.abc", "status": "assigning"}"#)
            .expect(3)
            .create_async()
            .await;

        let result = register(&test_identity(), &test_config(endpoint)).await;

        assert!(matches!(result, Err(ProvisioningError::Pending(3))));
        status_mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_rejects_missing_credentials_without_calling_remote() {
        let mut server = Server::new_async().await;
        let endpoint: Uri = server.url().try_into().unwrap();

        let register_mock = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let identity = DeviceIdentity {
            symmetric_key: "".into(),
            ..test_identity()
        };
        let result = register(&identity, &test_config(endpoint)).await;

        assert!(matches!(
            result,
            Err(ProvisioningError::MissingCredential("symmetric key"))
        ));
        register_mock.assert_async().await;
    }
}
