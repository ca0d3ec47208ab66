mod web;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::metadata::types::{NormalizedUrl, PageResponse, TransportError};
use crate::metadata::Transport;

/// Replays a fixed sequence of attempt results instead of touching the network.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<StatusCode, TransportError>>>,
    body: String,
    pub calls: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<StatusCode, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            body: "<title>ok</title>".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &NormalizedUrl) -> Result<PageResponse, TransportError> {
        self.calls.lock().unwrap().push(Instant::now());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())));

        next.map(|status| PageResponse {
            status,
            content_type: Some("text/html".into()),
            final_url: url.url().clone(),
            body: self.body.clone(),
            truncated: false,
        })
    }
}
