//! Shared test helpers: a scripted transport and session builders

use async_trait::async_trait;
use feedly_client::session::{
    Auth, FeedlySession, HttpRequest, HttpResponse, HttpTransport, SharedSession, TransportError,
};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const API_HOST: &str = "https://api.test";

/// Transport answering from a queue and recording what was sent
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    yielding: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Yield to the runtime before answering so concurrent requests interleave
    pub fn set_yielding(&self) {
        self.yielding.store(true, Ordering::SeqCst);
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(HttpResponse::json(StatusCode::from_u16(status).unwrap(), &body));
    }

    pub fn push_status(&self, status: u16) {
        self.push(HttpResponse::new(StatusCode::from_u16(status).unwrap(), ""));
    }

    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Request URLs without the host
    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.url.trim_start_matches(API_HOST).to_string())
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted response".to_string())))
    }
}

pub fn session_with_auth(transport: &Arc<ScriptedTransport>, auth: Auth) -> FeedlySession {
    FeedlySession::new(auth)
        .with_api_host(API_HOST)
        .with_transport(transport.clone())
}

pub fn session(transport: &Arc<ScriptedTransport>) -> FeedlySession {
    session_with_auth(transport, Auth::new("token"))
}

pub fn shared_session(transport: &Arc<ScriptedTransport>) -> SharedSession {
    session(transport).with_user_id("abc").into_shared()
}
