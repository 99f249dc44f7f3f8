//! One-time transform from the legacy flat settings schema to the
//! per-account shape.
//!
//! Legacy shape:
//! - `promptForAlias`: emails for which the suggestion prompt was enabled
//! - `dontAskAgain`: `[fromEmail, toEmail]` pairs to suppress
//!
//! The new shape keys per-identity settings by identity id, so the
//! transform needs the current identity list to map emails to ids.

use crate::address::AliasMethod;
use crate::identity::Identity;
use crate::settings::{
    AccountSettings, KEY_ACCOUNT_SETTINGS, KEY_LEGACY_DONT_ASK_AGAIN,
    KEY_LEGACY_PROMPT_FOR_ALIAS,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The migration runs only while the new key is absent and at least one
/// legacy key is still present.
pub fn needs_migration(stored: &Map<String, Value>) -> bool {
    !stored.contains_key(KEY_ACCOUNT_SETTINGS)
        && (stored.contains_key(KEY_LEGACY_PROMPT_FOR_ALIAS)
            || stored.contains_key(KEY_LEGACY_DONT_ASK_AGAIN))
}

/// Build the per-account settings map from the legacy keys.
pub fn migrate_legacy(
    stored: &Map<String, Value>,
    identities: &[Identity],
) -> HashMap<String, AccountSettings> {
    let prompt_for_alias: Vec<String> = stored
        .get(KEY_LEGACY_PROMPT_FOR_ALIAS)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let dont_ask_again: Vec<(String, String)> = stored
        .get(KEY_LEGACY_DONT_ASK_AGAIN)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    let mut accounts = HashMap::new();
    for identity in identities {
        let was_suggesting = prompt_for_alias.iter().any(|e| *e == identity.email);
        let dont_ask: Vec<String> = dont_ask_again
            .iter()
            .filter(|(from, _)| *from == identity.email)
            .map(|(_, to)| to.clone())
            .collect();

        accounts.insert(
            identity.id.clone(),
            AccountSettings {
                // Alias handling stays opt-in after migration.
                detection_enabled: false,
                alias_method: AliasMethod::Plus,
                suggestions_enabled: was_suggesting,
                suggestion_dont_ask: dont_ask,
            },
        );
    }

    log::info!("settings migration complete: {} identities", accounts.len());
    accounts
}
