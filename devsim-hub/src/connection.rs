use crate::util::types::{DeviceId, SymmetricKey};

/// Credentials of the device on its assigned hub, the
/// `HostName=<hub>;DeviceId=<id>;SharedAccessKey=<key>` triple
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionString {
    pub host_name: String,
    pub device_id: DeviceId,
    pub shared_access_key: SymmetricKey,
}

impl ConnectionString {
    pub fn new(
        host_name: impl Into<String>,
        device_id: DeviceId,
        shared_access_key: SymmetricKey,
    ) -> Self {
        Self {
            host_name: host_name.into(),
            device_id,
            shared_access_key,
        }
    }
}
