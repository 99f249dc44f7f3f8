//! Prompt window plumbing.
//!
//! The host opens a modal-like window per request and posts back exactly one
//! tagged response before the window closes. Requests carry a correlation id
//! so responses are matched through a pending-request map rather than a
//! single resolver slot; a window closed without an explicit action must be
//! reported via [`PromptBroker::abandon`], which resolves as a decline.

use crate::address::AliasMethod;
use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub type PromptId = u64;

/// Parameters shown by the alias suggestion window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasPromptRequest {
    pub from: String,
    pub to: String,
    pub method: AliasMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// User's answer to the alias suggestion window.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasPromptReply {
    #[serde(default)]
    pub use_alias: bool,
    #[serde(default)]
    pub alias_name: Option<String>,
    #[serde(default)]
    pub dont_ask_again: bool,
}

/// Parameters shown by the identity creation window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPromptRequest {
    pub email: String,
    pub suggested_name: String,
    pub base_name: String,
}

/// User's answer to the identity creation window. `create` and
/// `dont_ask_again` are independent; both may be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPromptReply {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub identity_name: Option<String>,
    #[serde(default)]
    pub dont_ask_again: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PromptRequest {
    Alias(AliasPromptRequest),
    Identity(IdentityPromptRequest),
}

/// Tagged response shape posted back by a prompt window.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum PromptResponse {
    #[serde(rename = "aliasPromptResponse")]
    Alias(AliasPromptReply),
    #[serde(rename = "identityPromptResponse")]
    Identity(IdentityPromptReply),
}

/// A request handed to the host for display, with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingPrompt {
    pub id: PromptId,
    #[serde(flatten)]
    pub request: PromptRequest,
}

/// The host side that renders prompt windows.
#[async_trait]
pub trait PromptSurface: Send + Sync {
    /// Open the window. The eventual answer arrives out-of-band through
    /// [`PromptBroker::resolve`].
    async fn open(&self, prompt: PendingPrompt) -> Result<(), EngineError>;
}

/// Matches prompt responses to outstanding requests by correlation id.
pub struct PromptBroker {
    surface: Arc<dyn PromptSurface>,
    next_id: AtomicU64,
    pending: Mutex<HashMap<PromptId, oneshot::Sender<PromptResponse>>>,
}

impl PromptBroker {
    pub fn new(surface: Arc<dyn PromptSurface>) -> Self {
        PromptBroker {
            surface,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self) -> (PromptId, oneshot::Receiver<PromptResponse>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    /// Route a response from the host to its waiting request. Returns false
    /// for an unknown or already-answered id.
    pub fn resolve(&self, id: PromptId, response: PromptResponse) -> bool {
        let sender = self.pending.lock().unwrap().remove(&id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                log::warn!("prompt response for unknown request {}", id);
                false
            }
        }
    }

    /// The window for `id` closed without posting a response; the waiting
    /// request resolves as a decline.
    pub fn abandon(&self, id: PromptId) {
        self.pending.lock().unwrap().remove(&id);
    }

    /// Open the alias suggestion window and wait for its answer.
    pub async fn ask_alias(
        &self,
        request: AliasPromptRequest,
    ) -> Result<AliasPromptReply, EngineError> {
        let (id, rx) = self.register();
        if let Err(e) = self
            .surface
            .open(PendingPrompt {
                id,
                request: PromptRequest::Alias(request),
            })
            .await
        {
            self.abandon(id);
            return Err(e);
        }

        match rx.await {
            Ok(PromptResponse::Alias(reply)) => Ok(reply),
            Ok(PromptResponse::Identity(_)) => Err(EngineError::parse(
                "alias prompt answered with identity response",
            )),
            // Sender dropped: window closed without an action.
            Err(_) => Ok(AliasPromptReply::default()),
        }
    }

    /// Open the identity creation window and wait for its answer.
    pub async fn ask_identity(
        &self,
        request: IdentityPromptRequest,
    ) -> Result<IdentityPromptReply, EngineError> {
        let (id, rx) = self.register();
        if let Err(e) = self
            .surface
            .open(PendingPrompt {
                id,
                request: PromptRequest::Identity(request),
            })
            .await
        {
            self.abandon(id);
            return Err(e);
        }

        match rx.await {
            Ok(PromptResponse::Identity(reply)) => Ok(reply),
            Ok(PromptResponse::Alias(_)) => Err(EngineError::parse(
                "identity prompt answered with alias response",
            )),
            Err(_) => Ok(IdentityPromptReply::default()),
        }
    }
}
