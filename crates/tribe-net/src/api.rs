//! The chat service seen as a collaborator.
//!
//! [`ChatApi`] is the seam between the sync engine and the network.  The
//! production implementation is [`crate::HttpChatApi`]; tests substitute
//! scripted fakes.

use async_trait::async_trait;

use tribe_shared::{Message, Participant};

use crate::error::Result;
use crate::validate::Since;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /messages/all`
    async fn fetch_all_messages(&self) -> Result<Vec<Message>>;

    /// `GET /messages/latest`
    async fn fetch_latest_messages(&self) -> Result<Vec<Message>>;

    /// `GET /messages/older/{uuid}`.  Rejects a malformed uuid locally.
    async fn fetch_older_messages(&self, ref_uuid: &str) -> Result<Vec<Message>>;

    /// `GET /participants/all`
    async fn fetch_participants(&self) -> Result<Vec<Participant>>;

    /// `POST /messages/new`.  Rejects empty text locally.
    async fn send_message(&self, text: &str) -> Result<Message>;

    /// `GET /messages/updates/{time}`
    async fn fetch_message_updates(&self, since: &Since) -> Result<Vec<Message>>;

    /// `GET /participants/updates/{time}`
    async fn fetch_participant_updates(&self, since: &Since) -> Result<Vec<Participant>>;
}
