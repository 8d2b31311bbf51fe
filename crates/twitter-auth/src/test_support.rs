//! Scripted transport and browser session for handshake tests

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tokio::sync::Notify;
use transport::header::AUTHORIZATION;
use transport::{HeaderMap, HttpRequest, HttpResponse, StatusCode, Transport, TransportError};

use crate::session::{SessionOutcome, SessionRequest, WebAuthSession};

/// Replays queued responses in order and records every request it is given.
pub struct MockTransport {
    responses: Mutex<VecDeque<transport::Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_body(&self, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn push_error(&self, err: TransportError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = transport::Result<HttpResponse>> + Send + '_>> {
        self.requests.lock().unwrap().push(request);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no scripted response".into())));
        Box::pin(async move { response })
    }
}

/// Browser stand-in that returns a preset outcome, optionally only after
/// `release()` is called.
pub struct FakeSession {
    outcome: Mutex<Option<SessionOutcome>>,
    requests: Mutex<Vec<SessionRequest>>,
    gate: Option<Notify>,
    started: Notify,
}

impl FakeSession {
    pub fn returning(outcome: SessionOutcome) -> Self {
        Self {
            outcome: Mutex::new(Some(outcome)),
            requests: Mutex::new(Vec::new()),
            gate: None,
            started: Notify::new(),
        }
    }

    pub fn gated(outcome: SessionOutcome) -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::returning(outcome)
        }
    }

    pub fn set_outcome(&self, outcome: SessionOutcome) {
        *self.outcome.lock().unwrap() = Some(outcome);
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn wait_until_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

impl WebAuthSession for FakeSession {
    fn start(
        &self,
        request: SessionRequest,
    ) -> Pin<Box<dyn Future<Output = SessionOutcome> + Send + '_>> {
        self.requests.lock().unwrap().push(request);
        self.started.notify_one();
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome
                .lock()
                .unwrap()
                .take()
                .unwrap_or(SessionOutcome::Cancelled)
        })
    }
}

/// Raw (still percent-encoded) value of one parameter in the Authorization header.
pub fn authorization_param(request: &HttpRequest, name: &str) -> Option<String> {
    let header = request.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let prefix = format!("{name}=\"");
    header
        .strip_prefix("OAuth ")?
        .split(", ")
        .find_map(|p| p.strip_prefix(prefix.as_str()))
        .map(|v| v.trim_end_matches('"').to_string())
}
