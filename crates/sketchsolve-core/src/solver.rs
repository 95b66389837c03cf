//! Client for the external recognition/solving service.
//!
//! The service is an opaque request/response collaborator:
//!
//! ```json
//! POST {endpoint}/calculate
//! { "image": "data:image/png;base64,...", "dict_of_vars": { "x": "5" } }
//! ```
//!
//! responding with an ordered batch:
//!
//! ```json
//! { "data": [ { "expr": "x", "result": "5", "assign": true } ] }
//! ```
//!
//! The native client runs each request on a background thread and reports
//! back over a channel drained by `poll()`, so the caller's event loop
//! never blocks on the network round trip.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on one submission's network round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound payload for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    /// Base64 PNG data URI of the sketch.
    pub image: String,
    /// Variable bindings accumulated across submissions.
    pub dict_of_vars: HashMap<String, String>,
}

/// Raw response envelope; items are decoded leniently afterwards.
#[derive(Debug, Deserialize)]
struct CalculateResponse {
    data: Vec<serde_json::Value>,
}

/// One decoded item of a response batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseItem {
    pub expr: String,
    pub result: String,
    pub assign: bool,
}

/// Solver client errors.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("a submission is already in flight")]
    Busy,
}

/// Outcome of an in-flight submission.
#[derive(Debug, Clone)]
pub enum SolverEvent {
    /// Response received; malformed batch items were skipped during decode.
    Completed { items: Vec<ResponseItem> },
    /// Request failed or the response envelope was unreadable.
    Failed { message: String },
}

/// Seam between the session controller and the solving service.
///
/// The production implementation is `SolverClient`; tests substitute a
/// scripted fake.
pub trait SolveTransport {
    /// Issue one request. Rejected with `SolverError::Busy` while a prior
    /// request is outstanding; submissions are strictly serialized.
    fn submit(&mut self, request: CalculateRequest) -> Result<(), SolverError>;

    /// Non-blocking; yields the outcome of the in-flight request once.
    fn poll(&mut self) -> Option<SolverEvent>;

    /// Whether a request is outstanding.
    fn in_flight(&self) -> bool;
}

/// Decode one batch item, tolerating the service's loose typing: `result`
/// may arrive as a JSON number, `assign` may be absent.
fn decode_item(value: &serde_json::Value) -> Option<ResponseItem> {
    let expr = value.get("expr")?.as_str()?.to_string();
    let result = match value.get("result")? {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let assign = value
        .get("assign")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    Some(ResponseItem {
        expr,
        result,
        assign,
    })
}

/// Decode a batch in array order, skipping and logging malformed items.
fn decode_items(values: &[serde_json::Value]) -> Vec<ResponseItem> {
    values
        .iter()
        .filter_map(|value| match decode_item(value) {
            Some(item) => Some(item),
            None => {
                log::warn!("skipping malformed response item: {}", value);
                None
            }
        })
        .collect()
}

/// HTTP client for the solving service.
///
/// One background thread per request; the thread owns the request and
/// reports exactly one `SolverEvent` back over its channel.
pub struct SolverClient {
    endpoint: String,
    event_rx: Option<Receiver<SolverEvent>>,
}

impl SolverClient {
    /// Create a client for `endpoint` (scheme and host, no trailing path).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            event_rx: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn run_request(
        client: reqwest::blocking::Client,
        url: String,
        request: CalculateRequest,
    ) -> SolverEvent {
        let response = match client.post(&url).json(&request).send() {
            Ok(response) => response,
            Err(e) => {
                return SolverEvent::Failed {
                    message: format!("request failed: {e}"),
                };
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                return SolverEvent::Failed {
                    message: format!("solver rejected request: {e}"),
                };
            }
        };

        match response.json::<CalculateResponse>() {
            Ok(envelope) => SolverEvent::Completed {
                items: decode_items(&envelope.data),
            },
            Err(e) => SolverEvent::Failed {
                message: format!("unreadable response: {e}"),
            },
        }
    }
}

impl SolveTransport for SolverClient {
    fn submit(&mut self, request: CalculateRequest) -> Result<(), SolverError> {
        if self.event_rx.is_some() {
            return Err(SolverError::Busy);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SolverError::Transport(e.to_string()))?;

        let url = format!("{}/calculate", self.endpoint);
        let (event_tx, event_rx) = channel();
        thread::spawn(move || {
            log::debug!("solver request to {}", url);
            let event = Self::run_request(client, url, request);
            let _ = event_tx.send(event);
        });
        self.event_rx = Some(event_rx);
        Ok(())
    }

    fn poll(&mut self) -> Option<SolverEvent> {
        let rx = self.event_rx.as_ref()?;
        match rx.try_recv() {
            Ok(event) => {
                self.event_rx = None;
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.event_rx = None;
                Some(SolverEvent::Failed {
                    message: "request thread terminated".to_string(),
                })
            }
        }
    }

    fn in_flight(&self) -> bool {
        self.event_rx.is_some()
    }
}
