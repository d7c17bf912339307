/*
The device session with the message hub.

A session owns the single MQTT connection to the hub. Everything the
device sends (telemetry, reported properties, command responses) and
receives (twin documents, desired property changes, command invocations)
goes through it.
*/

mod connection;
mod error;
mod method;
mod session;
mod topic;
mod twin;

pub use connection::ConnectionString;
pub use error::{
    CommandResponseError, ConnectionError, PropertyReportError, PublishError, RequestError,
    TwinError,
};
pub use method::{MethodRequest, MethodResponse};
pub use session::{Hub, HubEvents, HubSession, SessionOptions};
pub use twin::{DesiredChange, Twin};

use devsim_util as util;
