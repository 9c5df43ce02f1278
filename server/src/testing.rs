//! Recording fakes for the collaborators, shared by unit tests across modules.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use porta_shared::{
    ChannelId, Endpoint, MessageId, PanelBody, PanelControls, RoleId, ServerDescriptor,
    ServerInfo, ServerRegistry, UserId,
};
use tokio::sync::watch;

use crate::auth::Caller;
use crate::clients::{MessageLayer, Notice, RemoteControl, ServerQuery};
use crate::config::{DiscordSettings, Settings};
use crate::error::{ControlError, MessageError, QueryError};
use crate::state::{AppState, Collaborators};
use crate::store::memory::MemoryStore;

pub const ADMIN_ROLE: RoleId = RoleId(500);

pub fn descriptor(key: &str, port: u16) -> ServerDescriptor {
    ServerDescriptor {
        key: key.to_string(),
        query: Endpoint::new("10.0.0.1", port),
        control: Endpoint::new("10.0.0.1", port),
        control_credential: format!("{key}-secret"),
        display_password: None,
    }
}

pub fn settings() -> Settings {
    Settings {
        discord: DiscordSettings {
            bot_token: "test-token".to_string(),
            application_id: Some(42),
            public_key: None,
            api_base: "http://127.0.0.1:9".to_string(),
            http_timeout: Duration::from_secs(1),
        },
        privileged_roles: BTreeSet::from([ADMIN_ROLE]),
        registry: ServerRegistry::new([descriptor("surf", 27015), descriptor("bhop", 27016)]),
        http_addr: "127.0.0.1:0".to_string(),
        refresh_interval: Duration::from_secs(30),
        edit_pause: Duration::from_millis(1),
        query_timeout: Duration::from_millis(200),
        control_timeout: Duration::from_millis(200),
    }
}

pub fn admin() -> Caller {
    Caller {
        user: UserId(1),
        display_name: "admin".to_string(),
        roles: BTreeSet::from([ADMIN_ROLE]),
    }
}

pub fn player() -> Caller {
    Caller {
        user: UserId(2),
        display_name: "player".to_string(),
        roles: BTreeSet::from([RoleId(7)]),
    }
}

pub fn surf_info() -> ServerInfo {
    ServerInfo {
        map: Some("surf_utopia".to_string()),
        players: 2,
        max_players: 24,
        names: vec!["zed".to_string(), "amy".to_string()],
    }
}

/// Answers per query port; ports without an answer are unreachable.
#[derive(Default)]
pub struct FakeQuery {
    answers: Mutex<HashMap<u16, ServerInfo>>,
    calls: AtomicU64,
}

impl FakeQuery {
    pub fn answering(port: u16, info: ServerInfo) -> Self {
        let fake = Self::default();
        fake.set(port, info);
        fake
    }

    pub fn set(&self, port: u16, info: ServerInfo) {
        self.answers.lock().expect("answers lock").insert(port, info);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerQuery for FakeQuery {
    async fn query(&self, address: &Endpoint, _timeout: Duration) -> Result<ServerInfo, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .expect("answers lock")
            .get(&address.port)
            .cloned()
            .ok_or_else(|| QueryError::Unreachable(address.to_string()))
    }
}

#[derive(Default)]
pub struct FakeControl {
    commands: Mutex<Vec<(String, String, String)>>,
    failure: Mutex<Option<ControlError>>,
}

impl FakeControl {
    pub fn failing(error: ControlError) -> Self {
        let fake = Self::default();
        *fake.failure.lock().expect("failure lock") = Some(error);
        fake
    }

    /// `(address, credential, command)` per call.
    pub fn commands(&self) -> Vec<(String, String, String)> {
        self.commands.lock().expect("commands lock").clone()
    }
}

#[async_trait]
impl RemoteControl for FakeControl {
    async fn execute(
        &self,
        address: &Endpoint,
        credential: &str,
        command: &str,
        _timeout: Duration,
    ) -> Result<String, ControlError> {
        self.commands.lock().expect("commands lock").push((
            address.to_string(),
            credential.to_string(),
            command.to_string(),
        ));
        match self.failure.lock().expect("failure lock").clone() {
            Some(error) => Err(error),
            None => Ok(format!("ran {command}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageCall {
    Send(ChannelId),
    Edit(ChannelId, MessageId, PanelBody),
    Resolve(ChannelId, MessageId),
    Delete(ChannelId, MessageId),
    CreateThread(ChannelId, String),
    PostText(ChannelId, String),
    InteractionResponse(String, Notice),
}

/// In-memory chat platform. Messages listed in `gone` behave as deleted; `transient`
/// messages fail every call with a retryable error. `gone_on_edit` messages still resolve
/// but vanish by the time they are edited.
#[derive(Default)]
pub struct FakeMessages {
    calls: Mutex<Vec<MessageCall>>,
    gone: Mutex<HashSet<MessageId>>,
    gone_on_edit: Mutex<HashSet<MessageId>>,
    transient: Mutex<HashSet<MessageId>>,
    yield_on_create: AtomicBool,
    next_id: AtomicU64,
}

impl FakeMessages {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(10_000),
            ..Self::default()
        }
    }

    pub fn mark_gone(&self, message: MessageId) {
        self.gone.lock().expect("gone lock").insert(message);
    }

    pub fn mark_gone_on_edit(&self, message: MessageId) {
        self.gone_on_edit.lock().expect("gone lock").insert(message);
    }

    /// Makes `send` and `create_thread` suspend once, so joined callers interleave.
    pub fn yield_on_create(&self) {
        self.yield_on_create.store(true, Ordering::SeqCst);
    }

    pub fn mark_transient(&self, message: MessageId) {
        self.transient.lock().expect("transient lock").insert(message);
    }

    pub fn calls(&self) -> Vec<MessageCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn edits(&self) -> Vec<(ChannelId, MessageId, PanelBody)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MessageCall::Edit(channel, message, body) => Some((channel, message, body)),
                _ => None,
            })
            .collect()
    }

    pub fn sends(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, MessageCall::Send(_)))
            .count()
    }

    pub fn deletes(&self) -> Vec<(ChannelId, MessageId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MessageCall::Delete(channel, message) => Some((channel, message)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MessageCall) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn check(&self, message: MessageId) -> Result<(), MessageError> {
        if self.gone.lock().expect("gone lock").contains(&message) {
            return Err(MessageError::Gone(format!("message {message}")));
        }
        if self.transient.lock().expect("transient lock").contains(&message) {
            return Err(MessageError::Transient("503 from fake".to_string()));
        }
        Ok(())
    }

    async fn maybe_yield(&self) {
        if self.yield_on_create.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl MessageLayer for FakeMessages {
    async fn send(
        &self,
        channel: ChannelId,
        _body: &PanelBody,
        _controls: &PanelControls,
    ) -> Result<MessageId, MessageError> {
        self.record(MessageCall::Send(channel));
        self.maybe_yield().await;
        Ok(MessageId(self.allocate()))
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        body: &PanelBody,
        _controls: &PanelControls,
    ) -> Result<(), MessageError> {
        self.record(MessageCall::Edit(channel, message, body.clone()));
        if self.gone_on_edit.lock().expect("gone lock").contains(&message) {
            return Err(MessageError::Gone(format!("message {message}")));
        }
        self.check(message)
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), MessageError> {
        self.record(MessageCall::Delete(channel, message));
        self.check(message)
    }

    async fn resolve(&self, channel: ChannelId, message: MessageId) -> Result<(), MessageError> {
        self.record(MessageCall::Resolve(channel, message));
        self.check(message)
    }

    async fn create_thread(
        &self,
        channel: ChannelId,
        name: &str,
    ) -> Result<ChannelId, MessageError> {
        self.record(MessageCall::CreateThread(channel, name.to_string()));
        self.maybe_yield().await;
        Ok(ChannelId(self.allocate()))
    }

    async fn post_text(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, MessageError> {
        self.record(MessageCall::PostText(channel, content.to_string()));
        Ok(MessageId(self.allocate()))
    }

    async fn current_user(&self) -> Result<UserId, MessageError> {
        Ok(UserId(99))
    }

    async fn edit_interaction_response(
        &self,
        token: &str,
        notice: &Notice,
    ) -> Result<(), MessageError> {
        self.record(MessageCall::InteractionResponse(token.to_string(), notice.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub query: Arc<FakeQuery>,
    pub control: Arc<FakeControl>,
    pub messages: Arc<FakeMessages>,
    pub store: Arc<MemoryStore>,
    pub ready: watch::Sender<bool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeQuery::default(), FakeControl::default(), MemoryStore::default())
    }

    pub fn with(query: FakeQuery, control: FakeControl, store: MemoryStore) -> Self {
        Self::with_settings(settings(), query, control, store)
    }

    pub fn with_settings(
        settings: Settings,
        query: FakeQuery,
        control: FakeControl,
        store: MemoryStore,
    ) -> Self {
        let query = Arc::new(query);
        let control = Arc::new(control);
        let messages = Arc::new(FakeMessages::new());
        let store = Arc::new(store);
        let (ready, ready_rx) = watch::channel(true);
        let collaborators = Collaborators {
            query: query.clone(),
            control: control.clone(),
            messages: messages.clone(),
            panels: store.clone(),
            ledger: store.clone(),
        };
        let state = AppState::new(settings, collaborators, None, ready_rx);
        Self {
            state,
            query,
            control,
            messages,
            store,
            ready,
        }
    }
}
