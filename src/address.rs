use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// How an identity's aliases relate to its base address.
///
/// `own-domain` and `catchall` are distinct configuration labels but share
/// one matching rule: anything else at the identity's domain is an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AliasMethod {
    #[serde(rename = "plus")]
    Plus,
    #[serde(rename = "own-domain")]
    OwnDomain,
    #[serde(rename = "catchall")]
    Catchall,
}

impl Default for AliasMethod {
    fn default() -> Self {
        AliasMethod::Plus
    }
}

impl AliasMethod {
    /// True for the methods that compare at domain level rather than address level.
    pub fn is_domain_scoped(self) -> bool {
        matches!(self, AliasMethod::OwnDomain | AliasMethod::Catchall)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AliasMethod::Plus => "plus",
            AliasMethod::OwnDomain => "own-domain",
            AliasMethod::Catchall => "catchall",
        }
    }
}

/// A recipient as delivered by the host client: either a bare header string
/// ("Jane <jane@example.com>" or "jane@example.com") or an object carrying
/// an `address` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientRef {
    Raw(String),
    Mailbox {
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl RecipientRef {
    /// The string the extraction rules operate on.
    pub fn raw(&self) -> &str {
        match self {
            RecipientRef::Raw(s) => s,
            RecipientRef::Mailbox { address, .. } => address,
        }
    }
}

impl From<&str> for RecipientRef {
    fn from(s: &str) -> Self {
        RecipientRef::Raw(s.to_string())
    }
}

fn angle_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(.+?)>").unwrap())
}

fn plus_base_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^+@]+)(\+[^@]+)?@(.+)$").unwrap())
}

/// Extract a normalized (lower-cased) address from a recipient reference.
///
/// If the input contains an angle-bracket-delimited substring, the address is
/// the content between `<` and `>`; otherwise the trimmed whole string.
/// Returns None for empty input.
pub fn extract_address(recipient: &RecipientRef) -> Option<String> {
    extract_address_str(recipient.raw())
}

/// Same extraction rule over a raw header string.
pub fn extract_address_str(raw: &str) -> Option<String> {
    if let Some(caps) = angle_regex().captures(raw) {
        return Some(caps[1].to_lowercase());
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Substring after the first `@`, or None if the address has no `@`.
pub fn extract_domain(address: &str) -> Option<&str> {
    address.split_once('@').map(|(_, domain)| domain)
}

/// Compute the method-specific base an alias is matched against.
///
/// For `plus`, the base is `localpart@domain` with any `+tag` stripped; an
/// address without a tag is its own base (the matcher treats base-equals-
/// address as "no alias"). For the domain-scoped methods the base is the
/// domain alone.
pub fn compute_base(address: &str, method: AliasMethod) -> Option<String> {
    match method {
        AliasMethod::Plus => plus_base_regex()
            .captures(address)
            .map(|caps| format!("{}@{}", &caps[1], &caps[3])),
        AliasMethod::OwnDomain | AliasMethod::Catchall => {
            extract_domain(address).map(|d| d.to_string())
        }
    }
}

/// The tag between `+` and `@` of a plus-style alias.
pub fn plus_tag(address: &str) -> Option<&str> {
    let (local, _domain) = address.split_once('@')?;
    let (_base, tag) = local.split_once('+')?;
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Strip any `+tag` from the local part, yielding the base address.
pub fn strip_plus_tag(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) => {
            let base_local = local.split('+').next().unwrap_or(local);
            format!("{}@{}", base_local, domain)
        }
        None => address.to_string(),
    }
}

/// Build a concrete alias from a base address and a user-chosen name.
///
/// `plus` inserts the name as a tag (`local+name@domain`); the domain-scoped
/// methods replace the local part entirely (`name@domain`).
pub fn synthesize_alias(base_address: &str, alias_name: &str, method: AliasMethod) -> Option<String> {
    let (local, domain) = base_address.split_once('@')?;
    match method {
        AliasMethod::Plus => Some(format!("{}+{}@{}", local, alias_name, domain)),
        AliasMethod::OwnDomain | AliasMethod::Catchall => {
            Some(format!("{}@{}", alias_name, domain))
        }
    }
}

/// Format a display name and address as a single header value.
pub fn format_mailbox(name: &str, address: &str) -> String {
    format!("{} <{}>", name, address)
}
