//! HTTP/JSON implementation of [`RemoteChatService`].
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | `fetch_history` | `GET conversations/{id}/messages` | `[RemoteMessage]` |
//! | `send_message` | `POST conversations/{id}/messages` `{ "text" }` | `RemoteMessage` |
//! | `analyze` | `POST conversations/{id}/analyze` `{ "history": [MessageRecord] }` | `AnalysisResponse` |
//!
//! Any non-2xx status becomes [`NetworkError::Status`] carrying the response body.

use std::time::Duration;

use async_trait::async_trait;
use chat_core::{AnalysisResponse, MessageRecord, RemoteMessage};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::RemoteConfig;
use crate::error::NetworkError;
use crate::RemoteChatService;

/// Masks an API token for safe logging: first 7 chars + "***" + last 4 chars.
/// If length <= 11, returns "***" so no part of a short token leaks.
pub fn mask_token(token: &str) -> String {
    let len = token.len();
    if len <= 11 || !token.is_char_boundary(7) || !token.is_char_boundary(len - 4) {
        return "***".to_string();
    }
    format!("{}***{}", &token[..7], &token[len - 4..])
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct AnalyzeBody<'a> {
    history: &'a [MessageRecord],
}

/// Remote chat service client over HTTP with JSON bodies.
#[derive(Clone)]
pub struct HttpRemoteChatService {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpRemoteChatService {
    pub fn new(config: &RemoteConfig) -> Result<Self, NetworkError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| NetworkError::Transport(format!("invalid base URL {}: {}", config.base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(
            base_url = %base_url,
            api_token = %config.api_token.as_deref().map(mask_token).unwrap_or_else(|| "-".to_string()),
            timeout_secs = config.timeout_secs,
            "Remote chat client created"
        );

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, conversation_id: &str, tail: &str) -> Result<Url, NetworkError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NetworkError::Transport(format!("base URL cannot have a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["conversations", conversation_id, tail]);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, NetworkError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Remote chat service returned error");
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteChatService for HttpRemoteChatService {
    #[instrument(skip(self))]
    async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<RemoteMessage>, NetworkError> {
        let url = self.endpoint(conversation_id, "messages")?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let messages: Vec<RemoteMessage> = Self::decode(response).await?;
        info!(count = messages.len(), "Fetched conversation history");
        Ok(messages)
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<RemoteMessage, NetworkError> {
        let url = self.endpoint(conversation_id, "messages")?;
        let response = self
            .authorized(self.client.post(url))
            .json(&SendMessageBody { text })
            .send()
            .await?;
        let message: RemoteMessage = Self::decode(response).await?;
        info!(server_id = %message.id, "Message accepted by server");
        Ok(message)
    }

    #[instrument(skip(self, history), fields(history_len = history.len()))]
    async fn analyze(
        &self,
        conversation_id: &str,
        history: &[MessageRecord],
    ) -> Result<AnalysisResponse, NetworkError> {
        let url = self.endpoint(conversation_id, "analyze")?;
        let response = self
            .authorized(self.client.post(url))
            .json(&AnalyzeBody { history })
            .send()
            .await?;
        let analysis: AnalysisResponse = Self::decode(response).await?;
        info!(suggestions = analysis.suggestions.len(), "Analysis received");
        Ok(analysis)
    }
}
