use crate::address::plus_tag;
use crate::error::EngineError;
use crate::identity::{Identity, IdentityDirectory, NewIdentity};
use crate::prompt::{IdentityPromptRequest, PromptBroker};
use crate::settings::Settings;
use crate::store::SettingsRepository;
use std::sync::Arc;

/// What happened to a provisioning attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionOutcome {
    /// An identity for the alias already exists.
    AlreadyExists,
    /// The alias is on the global skip list.
    Skipped,
    /// The user declined creation.
    Declined,
    Created(Identity),
}

/// Offers to register a just-used alias as a persistent identity, cloning
/// the base identity's compose preferences.
pub struct IdentityProvisioner {
    directory: Arc<dyn IdentityDirectory>,
    prompts: Arc<PromptBroker>,
    repository: SettingsRepository,
}

impl IdentityProvisioner {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        prompts: Arc<PromptBroker>,
        repository: SettingsRepository,
    ) -> Self {
        IdentityProvisioner {
            directory,
            prompts,
            repository,
        }
    }

    /// Decide whether `alias_address` should become a new identity and, if
    /// the user agrees, request its creation from the directory.
    ///
    /// `create` and `dontAskAgain` in the prompt reply are independent; a
    /// single answer can both create the identity and suppress future
    /// offers for this alias.
    pub async fn maybe_create_identity(
        &self,
        alias_address: &str,
        base_address: &str,
        settings: &Settings,
    ) -> Result<ProvisionOutcome, EngineError> {
        log::debug!(
            "provisioning check for alias {} (base {})",
            alias_address,
            base_address
        );

        let identities = self.directory.list().await?;
        if identities
            .iter()
            .any(|id| id.email.eq_ignore_ascii_case(alias_address))
        {
            log::debug!("identity already exists for {}", alias_address);
            return Ok(ProvisionOutcome::AlreadyExists);
        }

        if settings
            .skip_identity_creation
            .iter()
            .any(|a| a == alias_address)
        {
            log::debug!("skipping identity creation for {} (user preference)", alias_address);
            return Ok(ProvisionOutcome::Skipped);
        }

        let base = identities
            .iter()
            .find(|id| id.email.eq_ignore_ascii_case(base_address))
            .ok_or_else(|| {
                EngineError::NotFound(format!("no base identity for {}", base_address))
            })?;

        let tag = plus_tag(alias_address).ok_or_else(|| {
            EngineError::parse(format!("alias {} carries no +tag", alias_address))
        })?;
        let suggested_name = format!("{} ({})", base.name, tag);

        log::debug!("prompting to create identity: {}", suggested_name);
        let reply = self
            .prompts
            .ask_identity(IdentityPromptRequest {
                email: alias_address.to_string(),
                suggested_name: suggested_name.clone(),
                base_name: base.name.clone(),
            })
            .await?;

        let mut outcome = ProvisionOutcome::Declined;
        if reply.create {
            let name = reply
                .identity_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(suggested_name);
            let created = self
                .directory
                .create(
                    &base.account_id,
                    NewIdentity {
                        email: alias_address.to_string(),
                        name: name.clone(),
                        reply_to: base.reply_to.clone(),
                        compose_html: base.compose_html,
                        signature: base.signature.clone(),
                    },
                )
                .await?;
            log::info!("created new identity: {} <{}>", name, alias_address);
            outcome = ProvisionOutcome::Created(created);
        }

        if reply.dont_ask_again {
            if let Err(e) = self.repository.record_skip_identity(alias_address).await {
                log::error!("failed to persist skip entry for {}: {}", alias_address, e);
            } else {
                log::debug!("added {} to identity-creation skip list", alias_address);
            }
        }

        Ok(outcome)
    }
}
