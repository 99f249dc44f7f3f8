use crate::address::{
    compute_base, extract_address, extract_domain, format_mailbox, AliasMethod, RecipientRef,
};
use crate::identity::Identity;
use crate::settings::AccountSettings;

/// Result of a successful alias detection. Ephemeral; consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasMatch {
    /// Display form suitable for the compose From field. Carries the
    /// identity's display name when the matched recipient had none.
    pub alias: String,
    /// The bare, lower-cased alias address.
    pub address: String,
    pub identity: Identity,
    pub method: AliasMethod,
}

/// Whether `address` is an alias of `identity` under `method`.
///
/// Under `plus` the address must reduce to the identity's email while
/// genuinely carrying a `+tag`; under the domain-scoped methods it must
/// share the identity's domain while differing from the identity's own
/// address.
pub fn matches_base(address: &str, identity: &Identity, method: AliasMethod) -> bool {
    let identity_email = identity.email.to_lowercase();
    match method {
        AliasMethod::Plus => match compute_base(address, AliasMethod::Plus) {
            Some(base) => base == identity_email && base != address,
            None => false,
        },
        AliasMethod::OwnDomain | AliasMethod::Catchall => {
            match (extract_domain(address), extract_domain(&identity_email)) {
                (Some(addr_domain), Some(id_domain)) => {
                    addr_domain == id_domain && address != identity_email
                }
                _ => false,
            }
        }
    }
}

/// Find the first recipient that is an alias of some configured identity.
///
/// Identities are scanned in their given order and recipients within each
/// identity, so the first configured identity wins ties. Identities with
/// alias handling disabled are skipped. Each identity is matched with the
/// method currently configured for it.
pub fn find_matching_alias<F>(
    recipients: &[RecipientRef],
    identities: &[Identity],
    settings_lookup: F,
) -> Option<AliasMatch>
where
    F: Fn(&str) -> AccountSettings,
{
    log::debug!(
        "searching for alias match in {} recipient(s)",
        recipients.len()
    );

    for identity in identities {
        let account = settings_lookup(&identity.id);
        if !account.detection_enabled {
            continue;
        }

        for recipient in recipients {
            let Some(address) = extract_address(recipient) else {
                continue;
            };

            if matches_base(&address, identity, account.alias_method) {
                // Borrow the identity's display name when the recipient
                // arrived as a bare address.
                let alias = if recipient.raw() == address && !identity.name.is_empty() {
                    format_mailbox(&identity.name, &address)
                } else {
                    recipient.raw().to_string()
                };

                log::debug!(
                    "alias match: {} (method: {}, identity: {})",
                    address,
                    account.alias_method.as_str(),
                    identity.email
                );

                return Some(AliasMatch {
                    alias,
                    address,
                    identity: identity.clone(),
                    method: account.alias_method,
                });
            }
        }
    }

    None
}
