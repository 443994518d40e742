//! In-memory transport for unit tests.

use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use async_trait::async_trait;
use http::StatusCode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Clone)]
enum Reply {
    Respond(u16, String),
    Fail,
}

/// Answers by the last path segment of the request URL and records every
/// request it sees. Unscripted endpoints answer `404 {}`.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_json(&self, endpoint: &str, status: u16, body: serde_json::Value) {
        self.reply_raw(endpoint, status, &body.to_string());
    }

    pub fn reply_raw(&self, endpoint: &str, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Reply::Respond(status, body.to_string()));
    }

    pub fn fail(&self, endpoint: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Reply::Fail);
    }

    /// Requests to `endpoint` block until [`ScriptedTransport::release`] is called.
    pub fn hold(&self, endpoint: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, endpoint: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(endpoint) {
            gate.add_permits(1);
        }
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| endpoint_of(&r.url) == endpoint)
            .count()
    }
}

fn endpoint_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or_default()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let endpoint = endpoint_of(&request.url).to_string();
        self.requests.lock().unwrap().push(request.clone());

        let gate = self.gates.lock().unwrap().get(&endpoint).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let reply = self.replies.lock().unwrap().get(&endpoint).cloned();
        match reply {
            Some(Reply::Respond(status, body)) => Ok(TransportResponse::new(
                StatusCode::from_u16(status).unwrap(),
                body,
            )),
            Some(Reply::Fail) => Err(TransportError::new(request.url, "connection refused")),
            None => Ok(TransportResponse::new(StatusCode::NOT_FOUND, "{}")),
        }
    }
}
