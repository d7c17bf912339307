use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, trace};

use crate::hub::{DesiredChange, Hub};
use crate::properties::{AckStatus, PropertyPatch, send_device_properties};

/// Outcome of applying a desired value
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub value: Value,
    pub status: AckStatus,
    pub code: i32,
}

impl Resolution {
    pub fn completed(value: Value) -> Self {
        Self {
            value,
            status: AckStatus::Completed,
            code: 200,
        }
    }
}

/// A property the cloud may write to
#[async_trait]
pub trait WriteableProperty: Send + Sync {
    /// Apply the desired value and return what should be acknowledged
    async fn apply(&self, value: Value) -> Resolution;
}

/// Simulated hardware that takes some time to settle on a new value
#[derive(Clone, Debug)]
pub struct SettlingProperty {
    delay: Duration,
}

impl SettlingProperty {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl WriteableProperty for SettlingProperty {
    async fn apply(&self, value: Value) -> Resolution {
        tokio::time::sleep(self.delay).await;
        Resolution::completed(value)
    }
}

/// Writeable properties known to the device, by name
#[derive(Clone, Default)]
pub struct WriteableProperties {
    handlers: HashMap<String, Arc<dyn WriteableProperty>>,
}

impl WriteableProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `name`, replacing any earlier one
    pub fn with(
        mut self,
        name: impl Into<String>,
        handler: impl WriteableProperty + 'static,
    ) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WriteableProperty>> {
        self.handlers.get(name).cloned()
    }
}

impl fmt::Debug for WriteableProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Applies desired property changes and acknowledges them
pub struct WriteableDispatcher<H> {
    hub: Arc<H>,
    properties: Arc<WriteableProperties>,
}

impl<H> Clone for WriteableDispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            properties: Arc::clone(&self.properties),
        }
    }
}

impl<H: Hub> WriteableDispatcher<H> {
    pub fn new(hub: Arc<H>, properties: WriteableProperties) -> Self {
        Self {
            hub,
            properties: Arc::new(properties),
        }
    }

    /// Apply every registered setting in the change.
    ///
    /// Settings are applied concurrently, each one reporting its own
    /// acknowledgement as soon as it settles. Unregistered settings are
    /// skipped. Returns once every acknowledgement has been sent.
    pub async fn apply_change(&self, change: DesiredChange) {
        let DesiredChange { version, settings } = change;

        let mut tasks = JoinSet::new();
        for (setting, value) in settings {
            let Some(handler) = self.properties.get(&setting) else {
                continue;
            };

            info!("Received setting: {setting}: {value}");
            let hub = Arc::clone(&self.hub);
            tasks.spawn(async move {
                let resolution = handler.apply(value).await;
                let patch = PropertyPatch {
                    key: setting,
                    value: resolution.value,
                    ack_status: resolution.status,
                    ack_code: resolution.code,
                    ack_version: version,
                };
                send_device_properties(hub.as_ref(), &patch).await;
            });
        }

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                error!("writeable property handler failed: {e}");
            }
        }
    }

    /// Handle changes as they arrive until the hub session ends.
    ///
    /// Each change is applied on its own task so a slow property never
    /// holds back later changes.
    pub async fn start(self, mut desired: mpsc::UnboundedReceiver<DesiredChange>) {
        while let Some(change) = desired.recv().await {
            let dispatcher = self.clone();
            tokio::spawn(async move { dispatcher.apply_change(change).await });
        }
        trace!("desired property stream closed");
    }
}
