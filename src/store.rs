use crate::error::EngineError;
use crate::identity::Identity;
use crate::migration;
use crate::settings::{
    AccountSettings, Settings, KEY_ACCOUNT_SETTINGS, KEY_DEBUG_LOGGING,
    KEY_LEGACY_DONT_ASK_AGAIN, KEY_LEGACY_PROMPT_FOR_ALIAS, KEY_OFFER_IDENTITY_CREATION,
    KEY_SKIP_IDENTITY_CREATION,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The host client's durable key-value settings store.
///
/// Values are JSON; the engine owns only the schema it writes (see the
/// `settings` module), not the storage itself.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, EngineError>;
    async fn set(&self, entries: Map<String, Value>) -> Result<(), EngineError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), EngineError>;
}

/// In-memory store, used by tests and the offline CLI.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Map<String, Value>) -> Self {
        MemoryStore {
            data: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, EngineError> {
        let data = self.data.lock().unwrap();
        let mut out = Map::new();
        for key in keys {
            if let Some(value) = data.get(*key) {
                out.insert((*key).to_string(), value.clone());
            }
        }
        Ok(out)
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), EngineError> {
        let mut data = self.data.lock().unwrap();
        for (key, value) in entries {
            data.insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), EngineError> {
        let mut data = self.data.lock().unwrap();
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }
}

/// Typed access to the persisted settings document.
///
/// All mutations run read-merge-write against the store so a write from one
/// compose session does not clobber keys it never touched. Two sessions
/// racing on the same key can still lose an in-memory mutation; that is an
/// accepted eventual-consistency trade-off.
#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        SettingsRepository { store }
    }

    /// Load the full settings document, applying the legacy-schema
    /// migration once if the old keys are still present.
    pub async fn load(&self, identities: &[Identity]) -> Result<Settings, EngineError> {
        let stored = self
            .store
            .get(&[
                KEY_ACCOUNT_SETTINGS,
                KEY_LEGACY_PROMPT_FOR_ALIAS,
                KEY_LEGACY_DONT_ASK_AGAIN,
                KEY_OFFER_IDENTITY_CREATION,
                KEY_SKIP_IDENTITY_CREATION,
                KEY_DEBUG_LOGGING,
            ])
            .await?;

        if migration::needs_migration(&stored) {
            log::info!("migrating settings from legacy schema");
            let migrated = migration::migrate_legacy(&stored, identities);
            let mut entries = Map::new();
            entries.insert(
                KEY_ACCOUNT_SETTINGS.to_string(),
                serde_json::to_value(&migrated)
                    .map_err(|e| EngineError::parse(e.to_string()))?,
            );
            self.store.set(entries).await?;
            self.store
                .remove(&[KEY_LEGACY_PROMPT_FOR_ALIAS, KEY_LEGACY_DONT_ASK_AGAIN])
                .await?;
            return Box::pin(self.load(identities)).await;
        }

        let value = Value::Object(stored);
        serde_json::from_value(value).map_err(|e| EngineError::parse(e.to_string()))
    }

    /// Append `recipient` to the identity's suggestion suppression list.
    pub async fn record_dont_ask(
        &self,
        identity_id: &str,
        recipient: &str,
    ) -> Result<(), EngineError> {
        let stored = self.store.get(&[KEY_ACCOUNT_SETTINGS]).await?;
        let mut accounts: HashMap<String, AccountSettings> = match stored.get(KEY_ACCOUNT_SETTINGS)
        {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| EngineError::parse(e.to_string()))?,
            None => HashMap::new(),
        };

        let account = accounts.entry(identity_id.to_string()).or_default();
        if !account
            .suggestion_dont_ask
            .iter()
            .any(|r| r == recipient)
        {
            account.suggestion_dont_ask.push(recipient.to_string());
        }

        let mut entries = Map::new();
        entries.insert(
            KEY_ACCOUNT_SETTINGS.to_string(),
            serde_json::to_value(&accounts).map_err(|e| EngineError::parse(e.to_string()))?,
        );
        self.store.set(entries).await
    }

    /// Append `alias` to the global identity-creation skip list.
    pub async fn record_skip_identity(&self, alias: &str) -> Result<(), EngineError> {
        let stored = self.store.get(&[KEY_SKIP_IDENTITY_CREATION]).await?;
        let mut skip: Vec<String> = match stored.get(KEY_SKIP_IDENTITY_CREATION) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| EngineError::parse(e.to_string()))?,
            None => Vec::new(),
        };

        if !skip.iter().any(|a| a == alias) {
            skip.push(alias.to_string());
        }

        let mut entries = Map::new();
        entries.insert(
            KEY_SKIP_IDENTITY_CREATION.to_string(),
            serde_json::to_value(&skip).map_err(|e| EngineError::parse(e.to_string()))?,
        );
        self.store.set(entries).await
    }
}
