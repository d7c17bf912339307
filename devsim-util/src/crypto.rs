use std::fmt::Display;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("shared access key is not valid base64")]
    InvalidKey,

    #[error("shared access key has an invalid length")]
    InvalidKeyLength,
}

/// Percent-encode a token component.
pub fn url_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Compute the base64 HMAC-SHA256 of `data` using a base64 encoded key.
pub fn hmac_sha256_base64(key: &str, data: &str) -> Result<String, SignatureError> {
    let key = Base64::decode_vec(key).map_err(|_| SignatureError::InvalidKey)?;
    let mut mac =
        HmacSha256::new_from_slice(&key).map_err(|_| SignatureError::InvalidKeyLength)?;
    mac.update(data.as_bytes());
    Ok(Base64::encode_string(&mac.finalize().into_bytes()))
}

/// Seconds since the epoch `ttl` from now.
pub fn expiry_from_now(ttl: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + ttl).as_secs()
}

/// A shared access signature over a resource URI.
///
/// Formats as
/// `SharedAccessSignature sr=<resource>&sig=<signature>&se=<expiry>[&skn=<key name>]`
/// with the resource and signature percent-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SasToken {
    resource: String,
    signature: String,
    expiry: u64,
    key_name: Option<String>,
}

impl SasToken {
    pub fn sign(resource: &str, key: &str, expiry: u64) -> Result<Self, SignatureError> {
        let resource = url_encode(resource);
        let signature = hmac_sha256_base64(key, &format!("{resource}\n{expiry}"))?;

        Ok(Self {
            resource,
            signature,
            expiry,
            key_name: None,
        })
    }

    pub fn with_key_name(self, key_name: impl Into<String>) -> Self {
        Self {
            key_name: Some(key_name.into()),
            ..self
        }
    }
}

impl Display for SasToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SharedAccessSignature sr={}&sig={}&se={}",
            self.resource,
            url_encode(&self.signature),
            self.expiry
        )?;
        if let Some(key_name) = &self.key_name {
            write!(f, "&skn={key_name}")?;
        }
        Ok(())
    }
}
