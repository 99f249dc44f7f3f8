use crate::compose::{ComposeReadiness, ComposeSurface, MessageStore, SessionId};
use crate::error::EngineError;
use crate::gate::ComposeGate;
use crate::identity::{Identity, IdentityDirectory};
use crate::orchestrator::PromptOrchestrator;
use crate::prompt::{PromptBroker, PromptSurface};
use crate::provisioner::{IdentityProvisioner, ProvisionOutcome};
use crate::settings::Settings;
use crate::store::{KeyValueStore, SettingsRepository};
use std::sync::{Arc, Mutex};

/// Immutable view of identities and settings, hydrated once and passed
/// explicitly into each operation. Refreshed out-of-band by the host's
/// change notifications; never mutated in place.
#[derive(Clone)]
pub struct Snapshot {
    pub identities: Arc<Vec<Identity>>,
    pub settings: Arc<Settings>,
}

impl Snapshot {
    /// The identity owning `address` (compared case-insensitively).
    pub fn identity_for_address(&self, address: &str) -> Option<&Identity> {
        self.identities
            .iter()
            .find(|id| id.email.eq_ignore_ascii_case(address))
    }
}

/// External collaborators the engine is wired to.
pub struct Collaborators {
    pub directory: Arc<dyn IdentityDirectory>,
    pub compose: Arc<dyn ComposeSurface>,
    pub messages: Arc<dyn MessageStore>,
    pub store: Arc<dyn KeyValueStore>,
    pub prompts: Arc<dyn PromptSurface>,
}

/// Entry point tying the gate, the orchestrator and the caches together.
///
/// All methods are driven by host lifecycle callbacks; processing within one
/// compose session is strictly sequential, while different sessions may
/// interleave at any await point.
pub struct AliasEngine {
    directory: Arc<dyn IdentityDirectory>,
    compose: Arc<dyn ComposeSurface>,
    repository: SettingsRepository,
    prompts: Arc<PromptBroker>,
    orchestrator: PromptOrchestrator,
    gate: ComposeGate,
    snapshot: Mutex<Option<Snapshot>>,
}

impl AliasEngine {
    pub fn new(collaborators: Collaborators) -> Self {
        let repository = SettingsRepository::new(collaborators.store);
        let prompts = Arc::new(PromptBroker::new(collaborators.prompts));
        let provisioner = IdentityProvisioner::new(
            collaborators.directory.clone(),
            prompts.clone(),
            repository.clone(),
        );
        let orchestrator = PromptOrchestrator::new(
            collaborators.compose.clone(),
            collaborators.messages,
            prompts.clone(),
            repository.clone(),
            provisioner,
        );
        AliasEngine {
            directory: collaborators.directory,
            compose: collaborators.compose,
            repository,
            prompts,
            orchestrator,
            gate: ComposeGate::new(),
            snapshot: Mutex::new(None),
        }
    }

    /// Handle for routing prompt-window responses back to their requests.
    pub fn prompts(&self) -> Arc<PromptBroker> {
        self.prompts.clone()
    }

    /// Load identities and settings from the collaborators.
    pub async fn initialize(&self) -> Result<Snapshot, EngineError> {
        log::info!("initializing alias engine");
        let identities = self.directory.list().await?;
        let settings = self.repository.load(&identities).await?;
        log::info!(
            "initialized with {} identities, {} configured accounts",
            identities.len(),
            settings.account_settings.len()
        );
        let snapshot = Snapshot {
            identities: Arc::new(identities),
            settings: Arc::new(settings),
        };
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        // Lazy re-initialization covers a restarted host process.
        let current = self.snapshot.lock().unwrap().clone();
        match current {
            Some(snapshot) => Ok(snapshot),
            None => self.initialize().await,
        }
    }

    /// Compose lifecycle signal. Each session is evaluated at most once,
    /// the first time its send-capability flags come up.
    pub async fn handle_compose_state_changed(
        &self,
        session: SessionId,
        readiness: ComposeReadiness,
    ) {
        if !self.gate.try_begin(session, readiness) {
            return;
        }

        if let Err(e) = self.process_session(session).await {
            log::error!("compose session {} failed: {}", session, e);
        }
        self.gate.finish(session);
        log::debug!("compose session {} processed", session);
    }

    async fn process_session(&self, session: SessionId) -> Result<(), EngineError> {
        let snapshot = self.snapshot().await?;
        let details = self.compose.get_compose_details(session).await?;
        let outcome = self
            .orchestrator
            .handle_compose(session, &details, &snapshot)
            .await;

        // A freshly created identity must be visible to later sessions.
        if matches!(outcome.provision, Some(ProvisionOutcome::Created(_))) {
            self.refresh_identities().await?;
        }
        Ok(())
    }

    /// The host compose window for `session` closed; its gate entry can go.
    pub fn handle_session_closed(&self, session: SessionId) {
        self.gate.forget(session);
    }

    /// Durable settings changed behind our back; reload them.
    pub async fn notify_storage_changed(&self) {
        log::debug!("settings changed, reloading");
        let identities = match self.snapshot.lock().unwrap().clone() {
            Some(snapshot) => snapshot.identities,
            None => return, // nothing cached yet; next session hydrates fresh
        };
        match self.repository.load(&identities).await {
            Ok(settings) => {
                let mut slot = self.snapshot.lock().unwrap();
                *slot = Some(Snapshot {
                    identities,
                    settings: Arc::new(settings),
                });
            }
            Err(e) => log::error!("failed to reload settings: {}", e),
        }
    }

    /// An identity was created, updated or deleted in the host directory.
    pub async fn notify_identities_changed(&self) {
        if let Err(e) = self.refresh_identities().await {
            log::error!("failed to reload identities: {}", e);
        }
    }

    async fn refresh_identities(&self) -> Result<(), EngineError> {
        let identities = Arc::new(self.directory.list().await?);
        log::debug!("identity list refreshed: {} entries", identities.len());
        let mut slot = self.snapshot.lock().unwrap();
        let settings = match slot.as_ref() {
            Some(snapshot) => snapshot.settings.clone(),
            None => Arc::new(Settings::default()),
        };
        *slot = Some(Snapshot {
            identities,
            settings,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AliasMethod;
    use crate::compose::{ComposeDetails, FullMessage, MessageHeaders, MessageId};
    use crate::identity::NewIdentity;
    use crate::prompt::{
        AliasPromptReply, IdentityPromptReply, PendingPrompt, PromptRequest, PromptResponse,
        PromptSurface,
    };
    use crate::settings::AccountSettings;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDirectory {
        identities: Mutex<Vec<Identity>>,
        created: Mutex<Vec<NewIdentity>>,
    }

    #[async_trait]
    impl IdentityDirectory for FakeDirectory {
        async fn list(&self) -> Result<Vec<Identity>, EngineError> {
            Ok(self.identities.lock().unwrap().clone())
        }

        async fn create(
            &self,
            account_id: &str,
            template: NewIdentity,
        ) -> Result<Identity, EngineError> {
            let identity = Identity {
                id: format!("id-{}", template.email),
                email: template.email.clone(),
                name: template.name.clone(),
                account_id: account_id.to_string(),
                reply_to: template.reply_to.clone(),
                compose_html: template.compose_html,
                signature: template.signature.clone(),
            };
            self.created.lock().unwrap().push(template);
            self.identities.lock().unwrap().push(identity.clone());
            Ok(identity)
        }
    }

    struct FakeCompose {
        details: Mutex<HashMap<SessionId, ComposeDetails>>,
        from_updates: Mutex<Vec<(SessionId, String)>>,
        detail_fetches: AtomicUsize,
    }

    #[async_trait]
    impl ComposeSurface for FakeCompose {
        async fn get_compose_details(
            &self,
            session: SessionId,
        ) -> Result<ComposeDetails, EngineError> {
            self.detail_fetches.fetch_add(1, Ordering::SeqCst);
            self.details
                .lock()
                .unwrap()
                .get(&session)
                .cloned()
                .ok_or_else(|| EngineError::lookup(format!("no session {}", session)))
        }

        async fn set_compose_from(
            &self,
            session: SessionId,
            from: &str,
        ) -> Result<(), EngineError> {
            self.from_updates
                .lock()
                .unwrap()
                .push((session, from.to_string()));
            Ok(())
        }
    }

    struct FakeMessages {
        messages: Mutex<HashMap<MessageId, FullMessage>>,
    }

    #[async_trait]
    impl MessageStore for FakeMessages {
        async fn get_full(&self, message_id: MessageId) -> Result<FullMessage, EngineError> {
            self.messages
                .lock()
                .unwrap()
                .get(&message_id)
                .cloned()
                .ok_or_else(|| EngineError::lookup(format!("no message {}", message_id)))
        }
    }

    /// Answers each opened prompt from a per-type script; an exhausted
    /// script behaves like a window closed without any action.
    struct ScriptedPrompts {
        broker: Mutex<Option<Arc<PromptBroker>>>,
        alias_replies: Mutex<VecDeque<AliasPromptReply>>,
        identity_replies: Mutex<VecDeque<IdentityPromptReply>>,
        opened: Mutex<Vec<PendingPrompt>>,
    }

    impl ScriptedPrompts {
        fn alias_prompt_count(&self) -> usize {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .filter(|p| matches!(p.request, PromptRequest::Alias(_)))
                .count()
        }

        fn identity_prompt_count(&self) -> usize {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .filter(|p| matches!(p.request, PromptRequest::Identity(_)))
                .count()
        }
    }

    #[async_trait]
    impl PromptSurface for ScriptedPrompts {
        async fn open(&self, prompt: PendingPrompt) -> Result<(), EngineError> {
            let broker = self.broker.lock().unwrap().clone().unwrap();
            let id = prompt.id;
            let response = match &prompt.request {
                PromptRequest::Alias(_) => self
                    .alias_replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .map(PromptResponse::Alias),
                PromptRequest::Identity(_) => self
                    .identity_replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .map(PromptResponse::Identity),
            };
            self.opened.lock().unwrap().push(prompt);
            match response {
                Some(response) => {
                    broker.resolve(id, response);
                }
                None => broker.abandon(id),
            }
            Ok(())
        }
    }

    struct Harness {
        engine: AliasEngine,
        directory: Arc<FakeDirectory>,
        compose: Arc<FakeCompose>,
        messages: Arc<FakeMessages>,
        prompts: Arc<ScriptedPrompts>,
        store: Arc<MemoryStore>,
    }

    fn ready() -> ComposeReadiness {
        ComposeReadiness {
            can_send_now: true,
            can_send_later: true,
        }
    }

    fn identity(id: &str, email: &str, name: &str) -> Identity {
        Identity {
            id: id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            account_id: "acct1".to_string(),
            reply_to: String::new(),
            compose_html: false,
            signature: String::new(),
        }
    }

    fn account(method: AliasMethod, suggestions: bool) -> AccountSettings {
        AccountSettings {
            detection_enabled: true,
            alias_method: method,
            suggestions_enabled: suggestions,
            suggestion_dont_ask: Vec::new(),
        }
    }

    fn harness(
        identities: Vec<Identity>,
        accounts: HashMap<String, AccountSettings>,
        alias_replies: Vec<AliasPromptReply>,
        identity_replies: Vec<IdentityPromptReply>,
    ) -> Harness {
        let directory = Arc::new(FakeDirectory {
            identities: Mutex::new(identities),
            created: Mutex::new(Vec::new()),
        });
        let compose = Arc::new(FakeCompose {
            details: Mutex::new(HashMap::new()),
            from_updates: Mutex::new(Vec::new()),
            detail_fetches: AtomicUsize::new(0),
        });
        let messages = Arc::new(FakeMessages {
            messages: Mutex::new(HashMap::new()),
        });
        let prompts = Arc::new(ScriptedPrompts {
            broker: Mutex::new(None),
            alias_replies: Mutex::new(alias_replies.into()),
            identity_replies: Mutex::new(identity_replies.into()),
            opened: Mutex::new(Vec::new()),
        });
        let mut seed = serde_json::Map::new();
        seed.insert("accountSettings".to_string(), json!(accounts));
        let store = Arc::new(MemoryStore::with_entries(seed));

        let engine = AliasEngine::new(Collaborators {
            directory: directory.clone(),
            compose: compose.clone(),
            messages: messages.clone(),
            store: store.clone(),
            prompts: prompts.clone(),
        });
        prompts
            .broker
            .lock()
            .unwrap()
            .replace(engine.prompts());

        Harness {
            engine,
            directory,
            compose,
            messages,
            prompts,
            store,
        }
    }

    fn reply_session(h: &Harness, session: SessionId, from: &str, message_id: MessageId) {
        h.compose.details.lock().unwrap().insert(
            session,
            ComposeDetails {
                from: Some(from.to_string()),
                to: Vec::new(),
                related_message_id: Some(message_id),
            },
        );
    }

    fn fresh_session(h: &Harness, session: SessionId, from: &str, to: &[&str]) {
        h.compose.details.lock().unwrap().insert(
            session,
            ComposeDetails {
                from: Some(from.to_string()),
                to: to.iter().map(|s| (*s).into()).collect(),
                related_message_id: None,
            },
        );
    }

    #[tokio::test]
    async fn test_reply_detection_applies_alias_and_offers_identity() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, false));
        let h = harness(
            vec![identity("i1", "a@d.com", "Alice")],
            accounts,
            Vec::new(),
            vec![IdentityPromptReply::default()], // decline creation
        );

        h.messages.messages.lock().unwrap().insert(
            42,
            FullMessage {
                headers: MessageHeaders {
                    to: vec!["a+proj@d.com".into()],
                    cc: Vec::new(),
                },
            },
        );
        reply_session(&h, 1, "a@d.com", 42);

        h.engine.handle_compose_state_changed(1, ready()).await;

        let updates = h.compose.from_updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(1, "Alice <a+proj@d.com>".to_string())]);

        // The provisioner was offered the alias with its derived base.
        let opened = h.prompts.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        match &opened[0].request {
            PromptRequest::Identity(req) => {
                assert_eq!(req.email, "a+proj@d.com");
                assert_eq!(req.suggested_name, "Alice (proj)");
                assert_eq!(req.base_name, "Alice");
            }
            other => panic!("unexpected prompt: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cc_header_is_searched_after_to() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, false));
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            Vec::new(),
            Vec::new(),
        );
        h.store
            .set(
                serde_json::from_value(json!({"offerIdentityCreation": false})).unwrap(),
            )
            .await
            .unwrap();

        h.messages.messages.lock().unwrap().insert(
            7,
            FullMessage {
                headers: MessageHeaders {
                    to: vec!["unrelated@elsewhere.com".into()],
                    cc: vec!["a+list@d.com".into()],
                },
            },
        );
        reply_session(&h, 1, "a@d.com", 7);

        h.engine.handle_compose_state_changed(1, ready()).await;

        let updates = h.compose.from_updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(1, "a+list@d.com".to_string())]);
        assert_eq!(h.prompts.identity_prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_suggestion_flow_synthesizes_plus_alias() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, true));
        let h = harness(
            vec![identity("i1", "a@d.com", "Alice")],
            accounts,
            vec![AliasPromptReply {
                use_alias: true,
                alias_name: Some("shop".to_string()),
                dont_ask_again: false,
            }],
            vec![IdentityPromptReply::default()],
        );
        fresh_session(&h, 5, "a@d.com", &["store@big.example"]);

        h.engine.handle_compose_state_changed(5, ready()).await;

        let updates = h.compose.from_updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(5, "a+shop@d.com".to_string())]);
        assert_eq!(h.prompts.alias_prompt_count(), 1);
        // Adopting the alias then triggers the identity offer.
        assert_eq!(h.prompts.identity_prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_suggestion_synthesizes_domain_alias() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::OwnDomain, true));
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            vec![AliasPromptReply {
                use_alias: true,
                alias_name: Some("sales".to_string()),
                dont_ask_again: false,
            }],
            Vec::new(),
        );
        fresh_session(&h, 5, "a@d.com", &["buyer@big.example"]);

        h.engine.handle_compose_state_changed(5, ready()).await;

        let updates = h.compose.from_updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(5, "sales@d.com".to_string())]);
    }

    #[tokio::test]
    async fn test_suggestion_requires_detection_enabled() {
        let mut accounts = HashMap::new();
        accounts.insert(
            "i1".to_string(),
            AccountSettings {
                detection_enabled: false,
                suggestions_enabled: true,
                ..Default::default()
            },
        );
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            vec![AliasPromptReply::default()],
            Vec::new(),
        );
        fresh_session(&h, 2, "a@d.com", &["x@other.com"]);

        h.engine.handle_compose_state_changed(2, ready()).await;

        assert_eq!(h.prompts.alias_prompt_count(), 0);
        assert!(h.compose.from_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_suggestion_skipped_when_from_is_already_an_alias() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, true));
        let h = harness(
            vec![identity("i1", "a+work@d.com", "")],
            accounts,
            vec![AliasPromptReply::default()],
            Vec::new(),
        );
        fresh_session(&h, 2, "a+work@d.com", &["x@other.com"]);

        h.engine.handle_compose_state_changed(2, ready()).await;
        assert_eq!(h.prompts.alias_prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_dont_ask_again_suppresses_next_session() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, true));
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            vec![AliasPromptReply {
                use_alias: false,
                alias_name: None,
                dont_ask_again: true,
            }],
            Vec::new(),
        );
        fresh_session(&h, 1, "a@d.com", &["x@other.com"]);

        h.engine.handle_compose_state_changed(1, ready()).await;
        assert_eq!(h.prompts.alias_prompt_count(), 1);
        assert!(h.compose.from_updates.lock().unwrap().is_empty());

        // The suppression was persisted through the repository.
        let stored = h.store.get(&["accountSettings"]).await.unwrap();
        assert_eq!(
            stored["accountSettings"]["i1"]["feature2DontAskList"],
            json!(["x@other.com"])
        );

        // The host notifies about the storage write; an identical compose
        // session afterwards stays silent.
        h.engine.notify_storage_changed().await;
        fresh_session(&h, 2, "a@d.com", &["x@other.com"]);
        h.engine.handle_compose_state_changed(2, ready()).await;
        assert_eq!(h.prompts.alias_prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_repeat_ready_signal_is_ignored() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, false));
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            Vec::new(),
            Vec::new(),
        );
        h.messages.messages.lock().unwrap().insert(
            9,
            FullMessage {
                headers: MessageHeaders {
                    to: vec!["a+x@d.com".into()],
                    cc: Vec::new(),
                },
            },
        );
        reply_session(&h, 3, "a@d.com", 9);

        h.engine.handle_compose_state_changed(3, ready()).await;
        h.engine.handle_compose_state_changed(3, ready()).await;

        assert_eq!(h.compose.detail_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(h.compose.from_updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_ready_signal_defers_processing() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, false));
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            Vec::new(),
            Vec::new(),
        );
        fresh_session(&h, 4, "a@d.com", &[]);

        h.engine
            .handle_compose_state_changed(4, ComposeReadiness::default())
            .await;
        assert_eq!(h.compose.detail_fetches.load(Ordering::SeqCst), 0);

        h.engine.handle_compose_state_changed(4, ready()).await;
        assert_eq!(h.compose.detail_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_created_identity_refreshes_cache() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, true));
        let h = harness(
            vec![identity("i1", "a@d.com", "Alice")],
            accounts,
            vec![AliasPromptReply {
                use_alias: true,
                alias_name: Some("proj".to_string()),
                dont_ask_again: false,
            }],
            vec![IdentityPromptReply {
                create: true,
                identity_name: None,
                dont_ask_again: false,
            }],
        );
        fresh_session(&h, 1, "a@d.com", &["partner@big.example"]);

        h.engine.handle_compose_state_changed(1, ready()).await;

        let created = h.directory.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].email, "a+proj@d.com");
        assert_eq!(created[0].name, "Alice (proj)");

        // The engine's snapshot now carries the new identity.
        let snapshot = h.engine.snapshot().await.unwrap();
        assert!(snapshot.identity_for_address("a+proj@d.com").is_some());
    }

    #[tokio::test]
    async fn test_detection_failure_still_allows_suggestion() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, true));
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            vec![AliasPromptReply {
                use_alias: true,
                alias_name: Some("fallback".to_string()),
                dont_ask_again: false,
            }],
            Vec::new(),
        );
        // related_message_id points nowhere: stage 1 fails with a lookup
        // error, stage 2 must still run.
        h.compose.details.lock().unwrap().insert(
            6,
            ComposeDetails {
                from: Some("a@d.com".to_string()),
                to: vec!["x@other.com".into()],
                related_message_id: Some(404),
            },
        );

        h.engine.handle_compose_state_changed(6, ready()).await;

        let updates = h.compose.from_updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(6, "a+fallback@d.com".to_string())]);
    }

    #[tokio::test]
    async fn test_offer_identity_creation_disabled_skips_stage_three() {
        let mut accounts = HashMap::new();
        accounts.insert("i1".to_string(), account(AliasMethod::Plus, true));
        let h = harness(
            vec![identity("i1", "a@d.com", "")],
            accounts,
            vec![AliasPromptReply {
                use_alias: true,
                alias_name: Some("shop".to_string()),
                dont_ask_again: false,
            }],
            Vec::new(),
        );
        h.store
            .set(serde_json::from_value(json!({"offerIdentityCreation": false})).unwrap())
            .await
            .unwrap();
        fresh_session(&h, 1, "a@d.com", &["x@other.com"]);

        h.engine.handle_compose_state_changed(1, ready()).await;

        assert_eq!(
            h.compose.from_updates.lock().unwrap().clone(),
            vec![(1, "a+shop@d.com".to_string())]
        );
        assert_eq!(h.prompts.identity_prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_session_closed_forgets_gate_entry() {
        let h = harness(Vec::new(), HashMap::new(), Vec::new(), Vec::new());
        fresh_session(&h, 8, "a@d.com", &[]);
        h.engine.handle_compose_state_changed(8, ready()).await;
        assert_eq!(h.compose.detail_fetches.load(Ordering::SeqCst), 1);

        h.engine.handle_session_closed(8);
        // The id slot is free again; hosts do not reuse ids, this only
        // keeps the tracking set bounded.
        h.engine.handle_compose_state_changed(8, ready()).await;
        assert_eq!(h.compose.detail_fetches.load(Ordering::SeqCst), 2);
    }
}
