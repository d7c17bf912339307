use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::hub::{
    CommandResponseError, Hub, MethodResponse, PropertyReportError, PublishError, Twin,
    TwinError,
};

/// In-memory hub recording everything the device sends
#[derive(Default)]
pub struct FakeHub {
    events: Mutex<Vec<Vec<u8>>>,
    reported: Mutex<Vec<Value>>,
    responses: Mutex<Vec<MethodResponse>>,
    publish_attempts: AtomicUsize,
    response_attempts: AtomicUsize,
    fail_publish: bool,
    fail_twin: bool,
    fail_reports: bool,
    fail_responses: bool,
}

impl FakeHub {
    pub fn failing_publish() -> Self {
        Self {
            fail_publish: true,
            ..Default::default()
        }
    }

    pub fn failing_twin() -> Self {
        Self {
            fail_twin: true,
            ..Default::default()
        }
    }

    pub fn failing_reports() -> Self {
        Self {
            fail_reports: true,
            ..Default::default()
        }
    }

    pub fn failing_responses() -> Self {
        Self {
            fail_responses: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Vec<u8>> {
        self.events.lock().unwrap().clone()
    }

    pub fn reported(&self) -> Vec<Value> {
        self.reported.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<MethodResponse> {
        self.responses.lock().unwrap().clone()
    }

    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    pub fn response_attempts(&self) -> usize {
        self.response_attempts.load(Ordering::SeqCst)
    }
}

fn encode_error() -> serde_json::Error {
    serde_json::from_str::<Value>("}").unwrap_err()
}

#[async_trait]
impl Hub for FakeHub {
    async fn send_event(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_publish {
            let request = rumqttc::Request::PingReq(rumqttc::PingReq);
            return Err(rumqttc::ClientError::Request(request).into());
        }
        self.events.lock().unwrap().push(payload);
        Ok(())
    }

    async fn get_twin(&self) -> Result<Twin, TwinError> {
        if self.fail_twin {
            return Err(TwinError::Status(500));
        }
        Ok(Twin {
            desired: json!({ "$version": 1 }),
            reported: json!({ "$version": 1 }),
        })
    }

    async fn update_reported(&self, patch: &Value) -> Result<(), PropertyReportError> {
        if self.fail_reports {
            return Err(PropertyReportError::Status(400));
        }
        self.reported.lock().unwrap().push(patch.clone());
        Ok(())
    }

    async fn respond(&self, response: MethodResponse) -> Result<(), CommandResponseError> {
        self.response_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_responses {
            return Err(encode_error().into());
        }
        self.responses.lock().unwrap().push(response);
        Ok(())
    }
}
