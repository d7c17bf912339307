use clap::Parser;
use std::num::ParseIntError;
use std::time::Duration;

use crate::provision::DEFAULT_PROVISIONING_ENDPOINT;
use crate::util::http::Uri;
use crate::util::types::SymmetricKey;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

fn parse_period(s: &str) -> Result<Duration, String> {
    let period = parse_duration(s).map_err(|e| e.to_string())?;
    if period.is_zero() {
        return Err("period must be greater than zero".to_string());
    }
    Ok(period)
}

fn parse_duration_secs(s: &str) -> Result<Duration, ParseIntError> {
    let secs: u64 = s.parse()?;
    Ok(Duration::from_secs(secs))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Provisioning service scope the device registers in
    #[arg(env = "ID_SCOPE", long = "id-scope", value_name = "scope")]
    pub scope_id: Option<String>,

    /// Registration id of the device
    #[arg(env = "DEVICE_ID", long = "device-id", value_name = "id")]
    pub device_id: Option<String>,

    /// Base64 encoded symmetric key of the device
    #[arg(
        env = "PRIMARY_KEY",
        long = "primary-key",
        value_name = "key",
        hide_env_values = true
    )]
    pub primary_key: Option<SymmetricKey>,

    /// Provisioning service endpoint URI
    #[arg(
        env = "DEVSIM_PROVISIONING_ENDPOINT",
        long = "provisioning-endpoint",
        value_name = "uri",
        default_value = DEFAULT_PROVISIONING_ENDPOINT
    )]
    pub provisioning_endpoint: Uri,

    /// Timeout of provisioning and hub requests in milliseconds
    #[arg(
        env = "DEVSIM_REQUEST_TIMEOUT_MS",
        long = "request-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "30000"
    )]
    pub request_timeout: Duration,

    /// Registration status poll interval in milliseconds
    #[arg(
        env = "DEVSIM_PROVISIONING_POLL_INTERVAL_MS",
        long = "provisioning-poll-interval-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "3000"
    )]
    pub provisioning_poll_interval: Duration,

    /// Telemetry interval in milliseconds
    #[arg(
        env = "DEVSIM_TELEMETRY_INTERVAL_MS",
        long = "telemetry-interval-ms",
        value_name = "ms",
        value_parser = parse_period,
        default_value = "1000"
    )]
    pub telemetry_interval: Duration,

    /// Lower bound of the simulated hal reading
    #[arg(
        env = "DEVSIM_BASE_HAL",
        long = "base-hal",
        value_name = "int",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub base_hal: i64,

    /// Time the `name` property takes to settle in milliseconds
    #[arg(
        env = "DEVSIM_NAME_SETTLE_MS",
        long = "name-settle-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "1000"
    )]
    pub name_settle: Duration,

    /// Time the `brightness` property takes to settle in milliseconds
    #[arg(
        env = "DEVSIM_BRIGHTNESS_SETTLE_MS",
        long = "brightness-settle-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "5000"
    )]
    pub brightness_settle: Duration,

    /// Lifetime of the hub token in seconds
    #[arg(
        env = "DEVSIM_TOKEN_TTL_SECS",
        long = "token-ttl-secs",
        value_name = "secs",
        value_parser = parse_duration_secs,
        default_value = "86400"
    )]
    pub token_ttl: Duration,
}

pub fn parse() -> Cli {
    Parser::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_uses_defaults_for_optional_settings() {
        let cli = Cli::try_parse_from([
            "devsim",
            "--id-scope",
            "0ne000AAAAA",
            "--device-id",
            "sim-device-01",
            "--primary-key",
            "c2VjcmV0",
        ])
        .unwrap();

        assert_eq!(cli.scope_id.as_deref(), Some("0ne000AAAAA"));
        assert_eq!(cli.primary_key, Some(SymmetricKey::from("c2VjcmV0")));
        assert_eq!(
            cli.provisioning_endpoint.to_string(),
            Uri::from_static(DEFAULT_PROVISIONING_ENDPOINT).to_string()
        );
        assert_eq!(cli.request_timeout, Duration::from_secs(30));
        assert_eq!(cli.provisioning_poll_interval, Duration::from_secs(3));
        assert_eq!(cli.telemetry_interval, Duration::from_secs(1));
        assert_eq!(cli.base_hal, 0);
        assert_eq!(cli.name_settle, Duration::from_secs(1));
        assert_eq!(cli.brightness_settle, Duration::from_secs(5));
        assert_eq!(cli.token_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn it_parses_millisecond_settings() {
        let cli = Cli::try_parse_from([
            "devsim",
            "--telemetry-interval-ms",
            "250",
            "--base-hal",
            "-5",
            "--token-ttl-secs",
            "60",
        ])
        .unwrap();

        assert_eq!(cli.telemetry_interval, Duration::from_millis(250));
        assert_eq!(cli.base_hal, -5);
        assert_eq!(cli.token_ttl, Duration::from_secs(60));
    }

    #[test]
    fn it_rejects_invalid_durations() {
        assert!(Cli::try_parse_from(["devsim", "--request-timeout-ms", "soon"]).is_err());
    }

    #[test]
    fn it_rejects_a_zero_telemetry_interval() {
        assert!(Cli::try_parse_from(["devsim", "--telemetry-interval-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["devsim", "--telemetry-interval-ms", "-1"]).is_err());
    }
}
