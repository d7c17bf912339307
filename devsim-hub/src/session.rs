use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::connection::ConnectionString;
use crate::error::{
    CommandResponseError, ConnectionError, PropertyReportError, PublishError, RequestError,
    TwinError,
};
use crate::method::{MethodRequest, MethodResponse};
use crate::topic::{self, HubTopic};
use crate::twin::{DesiredChange, Twin};
use crate::util::crypto::{SasToken, expiry_from_now};
use crate::util::types::DeviceId;

const API_VERSION: &str = "api-version=2021-04-12";

// twin documents can be much larger than the rumqttc default
const MAX_PACKET_SIZE: usize = 256 * 1024;

const REQUEST_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub port: u16,
    pub tls: bool,
    pub keep_alive: Duration,

    /// How long to wait for the connection acknowledgement and for the
    /// response to a twin request
    pub request_timeout: Duration,

    /// Lifetime of the hub token. The token is signed once on open and
    /// never refreshed.
    pub token_ttl: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            port: 8883,
            tls: true,
            keep_alive: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            token_ttl: Duration::from_secs(86_400),
        }
    }
}

/// Operations the device performs against the hub
#[async_trait]
pub trait Hub: Send + Sync + 'static {
    /// Publish a device-to-cloud telemetry message
    async fn send_event(&self, payload: Vec<u8>) -> Result<(), PublishError>;

    /// Fetch the full device twin
    async fn get_twin(&self) -> Result<Twin, TwinError>;

    /// Patch the reported section of the device twin
    async fn update_reported(&self, patch: &Value) -> Result<(), PropertyReportError>;

    /// Reply to a command invocation
    async fn respond(&self, response: MethodResponse) -> Result<(), CommandResponseError>;
}

/// Inbound streams of a hub session.
///
/// Both channels close when the connection to the hub is lost.
#[derive(Debug)]
pub struct HubEvents {
    pub desired: mpsc::UnboundedReceiver<DesiredChange>,
    pub methods: mpsc::UnboundedReceiver<MethodRequest>,
}

#[derive(Debug)]
struct Response {
    status: u16,
    body: Vec<u8>,
}

type Pending = Mutex<HashMap<String, oneshot::Sender<Response>>>;

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Response>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The single live connection to the hub
pub struct HubSession {
    client: AsyncClient,
    device_id: DeviceId,
    pending: Arc<Pending>,
    next_request_id: AtomicU64,
    request_timeout: Duration,
}

impl HubSession {
    /// Connect to the hub and subscribe to twin responses, desired
    /// property changes and command invocations.
    #[instrument(name = "open", skip_all, fields(hub = %conn.host_name, device_id = %conn.device_id), err)]
    pub async fn open(
        conn: &ConnectionString,
        options: &SessionOptions,
    ) -> Result<(Self, HubEvents), ConnectionError> {
        let host = &conn.host_name;
        let device_id = &conn.device_id;

        let token = SasToken::sign(
            &format!("{host}/devices/{device_id}"),
            &conn.shared_access_key,
            expiry_from_now(options.token_ttl),
        )?;

        let mut mqtt_options = MqttOptions::new(device_id.as_str(), host.as_str(), options.port);
        mqtt_options
            .set_keep_alive(options.keep_alive)
            .set_credentials(format!("{host}/{device_id}/?{API_VERSION}"), token.to_string())
            .set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        if options.tls {
            mqtt_options.set_transport(Transport::tls_with_default_config());
        }

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        debug!("waiting for connection acknowledgement");
        tokio::time::timeout(options.request_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| ConnectionError::Timeout(options.request_timeout))??;

        for filter in [
            topic::TWIN_RESPONSES,
            topic::DESIRED_PATCHES,
            topic::METHOD_REQUESTS,
        ] {
            client.subscribe(filter, QoS::AtMostOnce).await?;
        }

        let (desired_tx, desired_rx) = mpsc::unbounded_channel();
        let (methods_tx, methods_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Pending::default());
        let router = Router {
            pending: Arc::clone(&pending),
            desired_tx,
            methods_tx,
        };
        tokio::spawn(run_event_loop(eventloop, router));

        info!("connected");

        Ok((
            Self {
                client,
                device_id: device_id.clone(),
                pending,
                next_request_id: AtomicU64::new(1),
                request_timeout: options.request_timeout,
            },
            HubEvents {
                desired: desired_rx,
                methods: methods_rx,
            },
        ))
    }

    fn next_request_id(&self) -> String {
        self.next_request_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string()
    }

    /// Publish a request and wait for the response carrying the same
    /// request id.
    async fn request(
        &self,
        request_id: &str,
        topic: String,
        payload: Vec<u8>,
    ) -> Result<Response, RequestError> {
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id.to_string(), tx);

        if let Err(e) = self
            .client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
        {
            lock(&self.pending).remove(request_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(RequestError::Closed),
            Err(_) => {
                lock(&self.pending).remove(request_id);
                Err(RequestError::Timeout(self.request_timeout))
            }
        }
    }
}

#[async_trait]
impl Hub for HubSession {
    async fn send_event(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .publish(
                topic::telemetry(&self.device_id),
                QoS::AtLeastOnce,
                false,
                payload,
            )
            .await?;
        Ok(())
    }

    async fn get_twin(&self) -> Result<Twin, TwinError> {
        let request_id = self.next_request_id();
        let response = self
            .request(&request_id, topic::twin_get(&request_id), Vec::new())
            .await?;

        if response.status != 200 {
            return Err(TwinError::Status(response.status));
        }

        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn update_reported(&self, patch: &Value) -> Result<(), PropertyReportError> {
        let body = serde_json::to_vec(patch)?;
        let request_id = self.next_request_id();
        let response = self
            .request(&request_id, topic::reported_patch(&request_id), body)
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(PropertyReportError::Status(response.status));
        }

        Ok(())
    }

    async fn respond(&self, response: MethodResponse) -> Result<(), CommandResponseError> {
        let body = serde_json::to_vec(&response.payload)?;
        self.client
            .publish(
                topic::method_response(response.status, &response.request_id),
                QoS::AtMostOnce,
                false,
                body,
            )
            .await?;
        Ok(())
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

/// Drive the connection until it fails. There is no reconnect, once
/// the connection is lost the session stays closed.
async fn run_event_loop(mut eventloop: EventLoop, router: Router) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                router.route(&publish.topic, &publish.payload)
            }
            Ok(event) => trace!(?event, "mqtt event"),
            Err(e) => {
                error!("connection to hub lost: {e}");
                break;
            }
        }
    }
    router.close();
}

/// Dispatches inbound publishes to request waiters and event channels
struct Router {
    pending: Arc<Pending>,
    desired_tx: mpsc::UnboundedSender<DesiredChange>,
    methods_tx: mpsc::UnboundedSender<MethodRequest>,
}

impl Router {
    fn route(&self, topic: &str, payload: &[u8]) {
        match HubTopic::parse(topic) {
            Some(HubTopic::TwinResponse { status, request_id }) => {
                let waiter = lock(&self.pending).remove(request_id);
                match waiter {
                    Some(tx) => {
                        _ = tx.send(Response {
                            status,
                            body: payload.to_vec(),
                        })
                    }
                    None => debug!(request_id, "dropping response to unknown request"),
                }
            }
            Some(HubTopic::DesiredPatch { version }) => {
                match DesiredChange::from_payload(payload, version) {
                    Ok(change) => {
                        if self.desired_tx.send(change).is_err() {
                            debug!("no listener for desired properties");
                        }
                    }
                    Err(e) => warn!("ignoring malformed desired properties: {e}"),
                }
            }
            Some(HubTopic::MethodRequest { name, request_id }) => {
                let request = MethodRequest {
                    name: name.to_string(),
                    request_id: request_id.to_string(),
                    payload: serde_json::from_slice(payload).unwrap_or(Value::Null),
                };
                if self.methods_tx.send(request).is_err() {
                    debug!(name, "no listener for commands");
                }
            }
            None => debug!(topic, "ignoring message on unexpected topic"),
        }
    }

    /// Fail all requests still waiting for a response
    fn close(&self) {
        lock(&self.pending).clear();
    }
}
