//! Scripted transport for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use terminal_core::{
    ClientConfig, HttpRequest, HttpResponse, HttpTransport, ManualClock, TransportError,
};

use crate::health::HealthMonitor;
use crate::request::Api;

type Reply = Result<HttpResponse, TransportError>;

/// Answers requests from a queue of canned replies and records every
/// request it sees.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    routes: Mutex<Vec<(String, Reply)>>,
    fallback: Mutex<Option<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one response.
    pub(crate) fn reply(&self, status: u16, body: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Queue one transport failure.
    pub(crate) fn fail(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(TransportError(message.to_string())));
    }

    /// Always answer requests for `url` with this response, ahead of the
    /// queue.
    pub(crate) fn route(&self, url: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .push((url.to_string(), Ok(HttpResponse::new(status, body))));
    }

    /// Answer with this response once the queue is empty.
    pub(crate) fn repeat(&self, status: u16, body: impl Into<String>) {
        *self.fallback.lock().unwrap() = Some(Ok(HttpResponse::new(status, body)));
    }

    /// Hold every exchange for `delay` before answering.
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let routed = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(url, _)| *url == request.url)
            .map(|(_, reply)| reply.clone());
        self.requests.lock().unwrap().push(request);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reply) = routed {
            return reply;
        }
        let queued = self.replies.lock().unwrap().pop_front();
        queued
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or_else(|| Err(TransportError("no scripted reply".to_string())))
    }
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new("http://localhost:8000/api/")
}

/// An [`Api`] over `transport` with a fresh monitor and a manual clock.
pub(crate) fn api_with(transport: Arc<ScriptedTransport>) -> (Api, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let config = test_config();
    let health = HealthMonitor::with_clock(transport.clone(), &config, clock.clone());
    (Api::new(transport, &config, health), clock)
}
