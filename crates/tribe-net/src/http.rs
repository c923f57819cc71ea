//! reqwest-backed [`ChatApi`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use tribe_shared::{Message, Participant};

use crate::api::ChatApi;
use crate::error::{ApiError, Operation, Result};
use crate::validate::{validate_text, validate_uuid, Since};
use crate::wire::{into_messages, into_participants, NewMessageRequest, WireMessage, WireParticipant};

/// HTTP client for the chat REST service.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base: Url,
}

impl HttpChatApi {
    /// Build a client rooted at `base_url` (e.g. `https://host/api`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::Config(format!("invalid base url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Config(format!(
                "base url {base_url:?} cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            warn!(%operation, error = %e, "Request failed");
            ApiError::Network {
                operation,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%operation, status = status.as_u16(), "Server returned an error status");
            return Err(ApiError::Http {
                operation,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            operation,
            message: e.to_string(),
        })
    }

    async fn get_messages(&self, operation: Operation, segments: &[&str]) -> Result<Vec<Message>> {
        let url = self.endpoint(segments);
        debug!(%operation, %url, "GET");
        let wire: Vec<WireMessage> = self.execute(operation, self.client.get(url)).await?;
        Ok(into_messages(wire))
    }

    async fn get_participants(
        &self,
        operation: Operation,
        segments: &[&str],
    ) -> Result<Vec<Participant>> {
        let url = self.endpoint(segments);
        debug!(%operation, %url, "GET");
        let wire: Vec<WireParticipant> = self.execute(operation, self.client.get(url)).await?;
        Ok(into_participants(wire))
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_all_messages(&self) -> Result<Vec<Message>> {
        self.get_messages(Operation::FetchAllMessages, &["messages", "all"])
            .await
    }

    async fn fetch_latest_messages(&self) -> Result<Vec<Message>> {
        self.get_messages(Operation::FetchLatestMessages, &["messages", "latest"])
            .await
    }

    async fn fetch_older_messages(&self, ref_uuid: &str) -> Result<Vec<Message>> {
        let ref_uuid = validate_uuid(ref_uuid)?;
        self.get_messages(Operation::FetchOlderMessages, &["messages", "older", ref_uuid])
            .await
    }

    async fn fetch_participants(&self) -> Result<Vec<Participant>> {
        self.get_participants(Operation::FetchParticipants, &["participants", "all"])
            .await
    }

    async fn send_message(&self, text: &str) -> Result<Message> {
        let text = validate_text(text)?;
        let operation = Operation::SendMessage;
        let url = self.endpoint(&["messages", "new"]);
        debug!(%operation, %url, "POST");

        let wire: WireMessage = self
            .execute(
                operation,
                self.client.post(url).json(&NewMessageRequest { text }),
            )
            .await?;
        Ok(Message::from(wire))
    }

    async fn fetch_message_updates(&self, since: &Since) -> Result<Vec<Message>> {
        let since = since.to_path_segment()?;
        self.get_messages(Operation::FetchMessageUpdates, &["messages", "updates", since.as_str()])
            .await
    }

    async fn fetch_participant_updates(&self, since: &Since) -> Result<Vec<Participant>> {
        let since = since.to_path_segment()?;
        self.get_participants(
            Operation::FetchParticipantUpdates,
            &["participants", "updates", since.as_str()],
        )
        .await
    }
}
