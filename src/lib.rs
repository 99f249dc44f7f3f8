pub mod address;
pub mod compose;
pub mod engine;
pub mod error;
pub mod gate;
pub mod identity;
pub mod matcher;
pub mod migration;
pub mod orchestrator;
pub mod prompt;
pub mod provisioner;
pub mod settings;
pub mod store;

pub use address::{AliasMethod, RecipientRef};
pub use engine::{AliasEngine, Collaborators, Snapshot};
pub use error::EngineError;
pub use identity::{Identity, IdentityDirectory, NewIdentity};
pub use matcher::{find_matching_alias, AliasMatch};
pub use settings::{AccountSettings, Settings};
