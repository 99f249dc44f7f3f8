use crate::address::RecipientRef;
use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque compose tab/session identifier, assigned by the host client.
pub type SessionId = u64;

/// Message identifier in the host message store.
pub type MessageId = u64;

/// The compose fields the engine reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeDetails {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Vec<RecipientRef>,
    /// Present for replies and forwards: the message being responded to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_message_id: Option<MessageId>,
}

/// Send-capability flags from the compose lifecycle signal. The compose
/// window counts as loaded once either flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeReadiness {
    #[serde(default)]
    pub can_send_now: bool,
    #[serde(default)]
    pub can_send_later: bool,
}

impl ComposeReadiness {
    pub fn is_ready(self) -> bool {
        self.can_send_now || self.can_send_later
    }
}

/// The host client's compose window API.
#[async_trait]
pub trait ComposeSurface: Send + Sync {
    async fn get_compose_details(&self, session: SessionId)
        -> Result<ComposeDetails, EngineError>;

    async fn set_compose_from(&self, session: SessionId, from: &str)
        -> Result<(), EngineError>;
}

/// To/Cc headers of a stored message, as address-or-object lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageHeaders {
    #[serde(default)]
    pub to: Vec<RecipientRef>,
    #[serde(default)]
    pub cc: Vec<RecipientRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FullMessage {
    #[serde(default)]
    pub headers: MessageHeaders,
}

impl FullMessage {
    /// To then Cc, in header order.
    pub fn recipients(&self) -> Vec<RecipientRef> {
        let mut out = self.headers.to.clone();
        out.extend(self.headers.cc.iter().cloned());
        out
    }
}

/// The host client's message store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn get_full(&self, message_id: MessageId) -> Result<FullMessage, EngineError>;
}
