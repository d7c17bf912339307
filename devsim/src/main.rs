use std::error::Error;
use std::sync::Arc;

use tracing::{info, instrument, trace};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod cli;

use devsim_device as device;
use devsim_hub as hub;
use devsim_provision as provision;
use devsim_util as util;

use crate::cli::Cli;
use crate::device::{DeviceConfig, start_device};
use crate::hub::{ConnectionString, HubSession, SessionOptions};
use crate::provision::{DeviceIdentity, ProvisioningConfig, RequestConfig, register};

fn initialize_tracing() {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overriden using
            // RUST_LOG
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("debug".parse().unwrap())
                    .add_directive("rumqttc=warn".parse().unwrap())
                    .add_directive("hyper_util=error".parse().unwrap())
                    .add_directive("reqwest=info".parse().unwrap()),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine, settings may come from the environment
    dotenvy::dotenv().ok();

    initialize_tracing();

    let cli = cli::parse();

    start_simulator(cli).await
}

/// Provision the device, connect to the assigned hub and run the
/// simulated device until the process is killed.
///
/// Provisioning and connection failures are fatal, nothing is retried.
#[instrument(name = "devsim", skip_all, err)]
async fn start_simulator(cli: Cli) -> Result<(), Box<dyn Error>> {
    let identity = DeviceIdentity {
        scope_id: cli.scope_id.clone().unwrap_or_default(),
        registration_id: cli.device_id.clone().unwrap_or_default(),
        symmetric_key: cli.primary_key.clone().unwrap_or_default(),
    };

    let provisioning_config = ProvisioningConfig {
        endpoint: cli.provisioning_endpoint.clone(),
        request: RequestConfig {
            timeout: cli.request_timeout,
            poll_interval: cli.provisioning_poll_interval,
            ..RequestConfig::default()
        },
        ..ProvisioningConfig::default()
    };
    trace!(identity = ?identity, provisioning = ?provisioning_config, "using config:");

    let assignment = register(&identity, &provisioning_config).await?;
    info!(
        hub = %assignment.assigned_hub,
        device_id = %assignment.device_id,
        "device provisioned"
    );

    let connection_string = ConnectionString::new(
        assignment.assigned_hub,
        assignment.device_id,
        identity.symmetric_key,
    );
    let session_options = SessionOptions {
        request_timeout: cli.request_timeout,
        token_ttl: cli.token_ttl,
        ..SessionOptions::default()
    };
    let (session, events) = HubSession::open(&connection_string, &session_options).await?;

    let device_config = DeviceConfig {
        base_hal: cli.base_hal,
        telemetry_interval: cli.telemetry_interval,
        name_settle_delay: cli.name_settle,
        brightness_settle_delay: cli.brightness_settle,
    };
    start_device(Arc::new(session), events, device_config).await;

    Ok(())
}
