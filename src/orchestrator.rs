use crate::address::{
    extract_address, extract_address_str, extract_domain, strip_plus_tag, synthesize_alias,
    AliasMethod,
};
use crate::compose::{ComposeDetails, ComposeSurface, MessageStore, SessionId};
use crate::engine::Snapshot;
use crate::error::EngineError;
use crate::matcher::find_matching_alias;
use crate::prompt::{AliasPromptRequest, PromptBroker};
use crate::provisioner::{IdentityProvisioner, ProvisionOutcome};
use crate::store::SettingsRepository;
use std::sync::Arc;

/// What one compose evaluation did.
#[derive(Debug, Clone, Default)]
pub struct ComposeOutcome {
    /// Bare alias address applied to the compose From field, if any.
    pub applied_alias: Option<String>,
    pub provision: Option<ProvisionOutcome>,
}

/// Runs the three ordered, short-circuiting stages over one compose event:
/// detect an alias from the replied-to message, offer inventing a new one,
/// and offer registering the adopted alias as an identity.
///
/// A failure in one stage is logged and never aborts later stages.
pub struct PromptOrchestrator {
    compose: Arc<dyn ComposeSurface>,
    messages: Arc<dyn MessageStore>,
    prompts: Arc<PromptBroker>,
    repository: SettingsRepository,
    provisioner: IdentityProvisioner,
}

impl PromptOrchestrator {
    pub fn new(
        compose: Arc<dyn ComposeSurface>,
        messages: Arc<dyn MessageStore>,
        prompts: Arc<PromptBroker>,
        repository: SettingsRepository,
        provisioner: IdentityProvisioner,
    ) -> Self {
        PromptOrchestrator {
            compose,
            messages,
            prompts,
            repository,
            provisioner,
        }
    }

    pub async fn handle_compose(
        &self,
        session: SessionId,
        details: &ComposeDetails,
        snapshot: &Snapshot,
    ) -> ComposeOutcome {
        let mut outcome = ComposeOutcome::default();

        // Stage 1: detect an alias the correspondent already used.
        match self.detect_reply_alias(session, details, snapshot).await {
            Ok(applied) => outcome.applied_alias = applied,
            Err(e) => log::error!("alias detection failed: {}", e),
        }

        // Stage 2: offer inventing a fresh alias.
        if outcome.applied_alias.is_none() {
            match self.suggest_alias(session, details, snapshot).await {
                Ok(applied) => outcome.applied_alias = applied,
                Err(e) => log::error!("alias suggestion failed: {}", e),
            }
        }

        // Stage 3: offer registering the used alias as an identity.
        if let Some(alias) = outcome.applied_alias.clone() {
            if snapshot.settings.offer_identity_creation {
                let base = strip_plus_tag(&alias);
                match self
                    .provisioner
                    .maybe_create_identity(&alias, &base, &snapshot.settings)
                    .await
                {
                    Ok(result) => outcome.provision = Some(result),
                    Err(e) => log::error!("identity provisioning failed: {}", e),
                }
            }
        }

        outcome
    }

    /// Replies and forwards only: scan the original message's To/Cc for an
    /// address that is an alias of a configured identity, and make it the
    /// compose From.
    async fn detect_reply_alias(
        &self,
        session: SessionId,
        details: &ComposeDetails,
        snapshot: &Snapshot,
    ) -> Result<Option<String>, EngineError> {
        let Some(message_id) = details.related_message_id else {
            return Ok(None);
        };

        let original = self.messages.get_full(message_id).await?;
        let recipients = original.recipients();

        let Some(found) = find_matching_alias(&recipients, &snapshot.identities, |id| {
            snapshot.settings.account(id)
        }) else {
            return Ok(None);
        };

        log::debug!(
            "setting From to \"{}\" (method: {})",
            found.alias,
            found.method.as_str()
        );
        match self.compose.set_compose_from(session, &found.alias).await {
            Ok(()) => Ok(Some(found.address)),
            Err(e) => {
                // The alias was not applied; later stages still run.
                log::error!("failed to set From for detected alias: {}", e);
                Ok(None)
            }
        }
    }

    /// Composing from a base address: ask the user whether to invent an
    /// alias for this recipient, honoring the per-identity suppression list.
    async fn suggest_alias(
        &self,
        session: SessionId,
        details: &ComposeDetails,
        snapshot: &Snapshot,
    ) -> Result<Option<String>, EngineError> {
        let Some(from_address) = details.from.as_deref().and_then(extract_address_str) else {
            return Ok(None);
        };

        let Some(identity) = snapshot.identity_for_address(&from_address) else {
            return Ok(None);
        };
        let account = snapshot.settings.account(&identity.id);
        if !account.detection_enabled || !account.suggestions_enabled {
            return Ok(None);
        }

        // Only offer when composing from the base address itself.
        let from_is_base = match account.alias_method {
            AliasMethod::Plus => !from_address.contains('+'),
            AliasMethod::OwnDomain | AliasMethod::Catchall => {
                from_address == identity.email.to_lowercase()
            }
        };
        if !from_is_base {
            return Ok(None);
        }

        let Some(to_address) = details.to.first().and_then(extract_address) else {
            return Ok(None);
        };
        if account.suggestion_dont_ask.iter().any(|r| *r == to_address) {
            return Ok(None);
        }

        let domain = extract_domain(&from_address).map(|d| d.to_string());
        log::debug!(
            "prompting for alias (method: {})",
            account.alias_method.as_str()
        );
        let reply = self
            .prompts
            .ask_alias(AliasPromptRequest {
                from: from_address.clone(),
                to: to_address.clone(),
                method: account.alias_method,
                domain,
            })
            .await?;

        let alias_name = reply.alias_name.as_deref().unwrap_or("").trim().to_string();
        if reply.use_alias && !alias_name.is_empty() {
            let alias = synthesize_alias(&from_address, &alias_name, account.alias_method)
                .ok_or_else(|| {
                    EngineError::parse(format!("cannot derive alias from {}", from_address))
                })?;
            self.compose.set_compose_from(session, &alias).await?;
            log::debug!("set From to {}", alias);
            Ok(Some(alias))
        } else if reply.dont_ask_again {
            self.repository
                .record_dont_ask(&identity.id, &to_address)
                .await?;
            Ok(None)
        } else {
            Ok(None)
        }
    }
}
