use crate::address::AliasMethod;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage keys for the persisted settings shape.
pub const KEY_ACCOUNT_SETTINGS: &str = "accountSettings";
pub const KEY_OFFER_IDENTITY_CREATION: &str = "offerIdentityCreation";
pub const KEY_SKIP_IDENTITY_CREATION: &str = "skipIdentityCreation";
pub const KEY_DEBUG_LOGGING: &str = "debugLogging";

/// Legacy keys, consumed once by the settings migration.
pub const KEY_LEGACY_PROMPT_FOR_ALIAS: &str = "promptForAlias";
pub const KEY_LEGACY_DONT_ASK_AGAIN: &str = "dontAskAgain";

/// Per-identity configuration, persisted keyed by identity id so it
/// survives an identity rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Whether alias handling is enabled for this identity at all.
    #[serde(rename = "feature1Enabled", default)]
    pub detection_enabled: bool,

    #[serde(rename = "aliasMethod", default)]
    pub alias_method: AliasMethod,

    /// Whether to offer inventing a fresh alias when composing from the base address.
    #[serde(rename = "feature2Enabled", default)]
    pub suggestions_enabled: bool,

    /// Recipient addresses the suggestion prompt must not reappear for.
    #[serde(rename = "feature2DontAskList", default)]
    pub suggestion_dont_ask: Vec<String>,
}

impl Default for AccountSettings {
    fn default() -> Self {
        AccountSettings {
            detection_enabled: false,
            alias_method: AliasMethod::Plus,
            suggestions_enabled: false,
            suggestion_dont_ask: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// The full persisted settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "accountSettings", default)]
    pub account_settings: HashMap<String, AccountSettings>,

    #[serde(rename = "offerIdentityCreation", default = "default_true")]
    pub offer_identity_creation: bool,

    /// Alias addresses the identity-creation prompt must not reappear for.
    #[serde(rename = "skipIdentityCreation", default)]
    pub skip_identity_creation: Vec<String>,

    #[serde(rename = "debugLogging", default)]
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            account_settings: HashMap::new(),
            offer_identity_creation: true,
            skip_identity_creation: Vec::new(),
            debug_logging: false,
        }
    }
}

impl Settings {
    /// Settings for one identity, falling back to defaults when never configured.
    pub fn account(&self, identity_id: &str) -> AccountSettings {
        self.account_settings
            .get(identity_id)
            .cloned()
            .unwrap_or_default()
    }
}
