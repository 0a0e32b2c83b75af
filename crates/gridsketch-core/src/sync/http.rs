//! HTTP client for the server's `/api/editor/data` endpoint.

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::document::{Document, default_entity_color};
use crate::storage::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DATA_PATH: &str = "/api/editor/data";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// `{success, data, error}` as returned by the server.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpRemoteStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn data_url(&self) -> String {
        format!("{}{DATA_PATH}", self.base_url)
    }

    async fn read_envelope(response: reqwest::Response) -> RemoteResult<Document> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        decode_envelope(&text)
    }
}

fn decode_envelope(text: &str) -> RemoteResult<Document> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|e| RemoteError::InvalidDocument(e.to_string()))?;
    if !envelope.success {
        return Err(RemoteError::Unsuccessful(
            envelope.error.unwrap_or_else(|| "request failed".to_string()),
        ));
    }
    let data = envelope
        .data
        .ok_or_else(|| RemoteError::InvalidDocument("response has no data".to_string()))?;
    let (document, _) =
        Document::from_value(data, default_entity_color()).map_err(|e| RemoteError::InvalidDocument(e.to_string()))?;
    Ok(document)
}

impl RemoteStore for HttpRemoteStore {
    fn fetch(&self) -> BoxFuture<'_, RemoteResult<Document>> {
        let url = self.data_url();
        Box::pin(async move {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
            Self::read_envelope(response).await
        })
    }

    fn replace(&self, document: &Document) -> BoxFuture<'_, RemoteResult<Document>> {
        let url = self.data_url();
        let body = document.to_value();
        Box::pin(async move {
            let body = body.map_err(|e| RemoteError::InvalidDocument(e.to_string()))?;
            let response = self
                .http
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
            Self::read_envelope(response).await
        })
    }
}
