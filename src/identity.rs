use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a configured sender identity, owned by the host
/// client's directory and refreshed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub account_id: String,
    #[serde(default)]
    pub reply_to: String,
    #[serde(default)]
    pub compose_html: bool,
    #[serde(default)]
    pub signature: String,
}

/// Parameters for creating a new identity in the host directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIdentity {
    pub email: String,
    pub name: String,
    pub reply_to: String,
    pub compose_html: bool,
    pub signature: String,
}

/// The host client's identity directory.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Identity>, EngineError>;

    async fn create(
        &self,
        account_id: &str,
        template: NewIdentity,
    ) -> Result<Identity, EngineError>;
}
