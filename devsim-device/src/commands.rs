use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, trace, warn};

use crate::hub::{Hub, MethodRequest};

/// Reply to a command invocation
#[derive(Clone, Debug, PartialEq)]
pub struct CommandReply {
    pub status: u16,
    pub payload: Value,
}

/// A command the cloud may invoke on the device
pub trait CommandHandler: Send + Sync {
    fn handle(&self, request: &MethodRequest) -> CommandReply;
}

/// Pretend to start blinking the device LED
#[derive(Clone, Copy, Debug, Default)]
pub struct BlinkLed;

impl BlinkLed {
    pub const NAME: &'static str = "BlinkLED";
}

impl CommandHandler for BlinkLed {
    fn handle(&self, _: &MethodRequest) -> CommandReply {
        CommandReply {
            status: 200,
            payload: json!({ "status": "Blinking LED every 5 seconds" }),
        }
    }
}

/// Commands known to the device, by name
#[derive(Clone, Default)]
pub struct Commands {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `name`, replacing any earlier one
    pub fn with(
        mut self,
        name: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Answers command invocations from the hub
pub struct CommandDispatcher<H> {
    hub: Arc<H>,
    commands: Commands,
}

impl<H: Hub> CommandDispatcher<H> {
    pub fn new(hub: Arc<H>, commands: Commands) -> Self {
        Self { hub, commands }
    }

    /// Send exactly one response to a known command.
    ///
    /// Unknown commands are logged and left unanswered, the caller sees
    /// a timeout on the cloud side.
    #[instrument(skip_all, fields(command = %request.name, request_id = %request.request_id))]
    pub async fn handle(&self, request: MethodRequest) {
        let Some(handler) = self.commands.get(&request.name) else {
            warn!("ignoring unknown command");
            return;
        };

        info!("Received synchronous call to {}", request.name);
        let CommandReply { status, payload } = handler.handle(&request);
        let response = request.respond(status, payload);
        let payload = response.payload.clone();

        match self.hub.respond(response).await {
            Ok(()) => info!(status, "Sent command response: {payload}"),
            Err(e) => error!("Unable to send method response: {e}"),
        }
    }

    /// Handle invocations as they arrive until the hub session ends
    pub async fn start(self, mut methods: mpsc::UnboundedReceiver<MethodRequest>) {
        while let Some(request) = methods.recv().await {
            self.handle(request).await;
        }
        trace!("command stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MethodResponse;
    use crate::testing::FakeHub;

    fn invocation(name: &str, request_id: &str) -> MethodRequest {
        MethodRequest {
            name: name.to_string(),
            request_id: request_id.to_string(),
            payload: Value::Null,
        }
    }

    fn commands() -> Commands {
        Commands::new().with(BlinkLed::NAME, BlinkLed)
    }

    #[tokio::test]
    async fn it_responds_once_to_a_known_command() {
        let hub = Arc::new(FakeHub::default());
        let dispatcher = CommandDispatcher::new(Arc::clone(&hub), commands());

        dispatcher.handle(invocation("BlinkLED", "7")).await;

        assert_eq!(
            hub.responses(),
            vec![MethodResponse {
                request_id: "7".to_string(),
                status: 200,
                payload: json!({ "status": "Blinking LED every 5 seconds" }),
            }]
        );
    }

    #[tokio::test]
    async fn it_leaves_unknown_commands_unanswered() {
        let hub = Arc::new(FakeHub::default());
        let dispatcher = CommandDispatcher::new(Arc::clone(&hub), commands());

        dispatcher.handle(invocation("Reboot", "8")).await;

        assert!(hub.responses().is_empty());
    }

    #[tokio::test]
    async fn it_uses_the_latest_registration() {
        struct Busy;

        impl CommandHandler for Busy {
            fn handle(&self, _: &MethodRequest) -> CommandReply {
                CommandReply {
                    status: 503,
                    payload: json!({ "status": "busy" }),
                }
            }
        }

        let hub = Arc::new(FakeHub::default());
        let dispatcher =
            CommandDispatcher::new(Arc::clone(&hub), commands().with(BlinkLed::NAME, Busy));

        dispatcher.handle(invocation("BlinkLED", "9")).await;

        let responses = hub.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status, 503);
    }

    #[tokio::test]
    async fn it_survives_failed_responses() {
        let hub = Arc::new(FakeHub::failing_responses());
        let dispatcher = CommandDispatcher::new(Arc::clone(&hub), commands());
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(invocation("BlinkLED", "1")).unwrap();
        tx.send(invocation("BlinkLED", "2")).unwrap();
        drop(tx);
        dispatcher.start(rx).await;

        assert_eq!(hub.response_attempts(), 2);
    }
}
