//! Integration tests for the chat crate
//!
//! These tests drive the engine end to end against a scripted relay:
//! polling, unread math, thread filtering, sending, and cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chat::api::{Backend, MessagePage};
use chat::models::{
    ContactId, ContactProfile, Conversation, Message, MessageId, OutgoingFlag, Stats, UserProfile,
};
use chat::storage::{FileWatermarkStore, InMemoryWatermarkStore, ReadStateStore};
use chat::sync::{Command, Request};
use chat::{ApiError, ChatEngine, ClientConfig, Resource, SendError, Side, Snapshot};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const ALICE: &str = "+15550001";
const BOB: &str = "+15550002";
const ME: &str = "+31612345678";

/// Scripted relay backend
#[derive(Default)]
struct FakeRelay {
    state: Mutex<RelayState>,
}

#[derive(Default)]
struct RelayState {
    conversations: Vec<Conversation>,
    messages: HashMap<String, Vec<Message>>,
    names: HashMap<String, String>,
    fail_conversations: Option<ApiError>,
    fail_profiles: bool,
    fail_send: Option<ApiError>,
    sent: Vec<(String, String)>,
    next_id: u64,
    panic_next_listing: bool,
    listings: usize,
}

impl FakeRelay {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an inbound message and bump the conversation's count
    fn receive(&self, contact: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let message = Message::builder(format!("m{}", state.next_id))
            .body(body)
            .sender_number(contact)
            .build();
        state.push(contact, message);
    }

    fn name(&self, contact: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .names
            .insert(contact.to_string(), name.to_string());
    }

    fn fail_conversations(&self, error: Option<ApiError>) {
        self.state.lock().unwrap().fail_conversations = error;
    }

    fn fail_profiles(&self, fail: bool) {
        self.state.lock().unwrap().fail_profiles = fail;
    }

    fn fail_send(&self, error: Option<ApiError>) {
        self.state.lock().unwrap().fail_send = error;
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Make the next conversation listing panic inside the backend
    fn panic_next_listing(&self) {
        self.state.lock().unwrap().panic_next_listing = true;
    }

    fn listings(&self) -> usize {
        self.state.lock().unwrap().listings
    }
}

impl RelayState {
    fn push(&mut self, contact: &str, message: Message) {
        self.messages
            .entry(contact.to_string())
            .or_default()
            .push(message);
        let count = self.messages[contact].len() as u64;
        match self
            .conversations
            .iter_mut()
            .find(|c| c.contact_id.as_str() == contact)
        {
            Some(conversation) => conversation.message_count = count,
            None => self.conversations.push(Conversation::new(contact, count)),
        }
    }
}

impl Backend for FakeRelay {
    fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.listings += 1;
        if std::mem::take(&mut state.panic_next_listing) {
            drop(state);
            panic!("relay connection pool exploded");
        }
        if let Some(e) = &state.fail_conversations {
            return Err(e.clone());
        }
        Ok(state
            .conversations
            .iter()
            .map(|c| match state.names.get(c.contact_id.as_str()) {
                Some(name) => c.clone().with_display_name(name.clone()),
                None => c.clone(),
            })
            .collect())
    }

    fn list_groups(&self) -> Result<Vec<Conversation>, ApiError> {
        Ok(self
            .list_conversations()?
            .into_iter()
            .filter(|c| c.is_group)
            .collect())
    }

    fn list_messages(&self, contact_id: &ContactId) -> Result<MessagePage, ApiError> {
        let state = self.state.lock().unwrap();
        let messages = state
            .messages
            .get(contact_id.as_str())
            .cloned()
            .unwrap_or_default();
        Ok(MessagePage {
            raw_count: messages.len(),
            messages,
        })
    }

    fn get_message(&self, id: &MessageId) -> Result<Message, ApiError> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .values()
            .flatten()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                message: "Message not found".to_string(),
            })
    }

    fn contact_profile(&self, contact_id: &ContactId) -> Result<ContactProfile, ApiError> {
        let state = self.state.lock().unwrap();
        if state.fail_profiles {
            return Err(ApiError::Transport("connection reset".to_string()));
        }
        let mut profile = ContactProfile::bare(contact_id.clone());
        profile.display_name = state.names.get(contact_id.as_str()).cloned();
        profile.message_count = state
            .messages
            .get(contact_id.as_str())
            .map(|m| m.len() as u64);
        Ok(profile)
    }

    fn send_message(&self, contact_id: &ContactId, body: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = &state.fail_send {
            return Err(e.clone());
        }
        state.next_id += 1;
        let message = Message::builder(format!("m{}", state.next_id))
            .body(body)
            .sender_number(ME)
            .outgoing(OutgoingFlag::Bool(true))
            .build();
        state.push(contact_id.as_str(), message);
        state
            .sent
            .push((contact_id.as_str().to_string(), body.to_string()));
        Ok(())
    }

    fn user_profile(&self) -> Result<UserProfile, ApiError> {
        Ok(UserProfile {
            username: "tester".to_string(),
            email: None,
            first_name: None,
            last_name: None,
        })
    }

    fn stats(&self) -> Result<Stats, ApiError> {
        Ok(Stats::default())
    }
}

fn test_config() -> ClientConfig {
    ClientConfig {
        local_numbers: vec![ME.to_string()],
        ..ClientConfig::default()
    }
}

fn engine_with(read_state: ReadStateStore) -> ChatEngine {
    ChatEngine::new(&test_config(), read_state)
}

fn fresh_engine() -> ChatEngine {
    engine_with(ReadStateStore::new(Box::new(InMemoryWatermarkStore::new())))
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn unread(snapshot: &Snapshot, contact: &str) -> u64 {
    snapshot
        .conversations
        .iter()
        .find(|c| c.contact_id.as_str() == contact)
        .map(|c| c.unread)
        .unwrap_or_else(|| panic!("{} not in conversation list", contact))
}

fn visible_bodies(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .thread
        .as_ref()
        .map(|t| {
            t.groups
                .iter()
                .flat_map(|g| g.messages.iter().map(|m| m.body.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_unread_counts_follow_watermarks() {
    let relay = FakeRelay::new();
    for _ in 0..5 {
        relay.receive(ALICE, "hey");
    }
    for _ in 0..3 {
        relay.receive(BOB, "yo");
    }

    let mut map = chat::storage::WatermarkMap::new();
    map.insert(ALICE.to_string(), 2);
    map.insert(BOB.to_string(), 10);
    let mut engine = engine_with(ReadStateStore::new(Box::new(
        InMemoryWatermarkStore::with_watermarks(map),
    )));
    assert_eq!(engine.load_read_state(), 2);

    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);

    let snapshot = engine.snapshot();
    assert!(snapshot.conversations_loaded);
    assert_eq!(unread(&snapshot, ALICE), 3);
    // Watermark above the count never goes negative
    assert_eq!(unread(&snapshot, BOB), 0);

    relay.receive(ALICE, "still there?");
    relay.receive(ALICE, "hello??");

    // Nothing changes before the 5s timer
    engine.pump(&*relay, t0 + secs(4));
    assert_eq!(unread(&engine.snapshot(), ALICE), 3);

    engine.pump(&*relay, t0 + secs(5));
    assert_eq!(unread(&engine.snapshot(), ALICE), 5);
}

#[test]
fn test_opening_conversation_clears_unread_before_next_tick() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "one");
    relay.receive(ALICE, "two");

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    assert_eq!(unread(&engine.snapshot(), ALICE), 2);

    engine.open_conversation(ContactId::new(ALICE), t0 + secs(1));
    assert_eq!(engine.read_state().get(&ContactId::new(ALICE)), 2);
    assert_eq!(unread(&engine.snapshot(), ALICE), 0);

    engine.close_thread();
    engine.pump(&*relay, t0 + secs(5));
    assert_eq!(unread(&engine.snapshot(), ALICE), 0);
}

#[test]
fn test_blank_messages_hidden_but_counted_for_unread() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "");
    relay.receive(ALICE, "   ");
    relay.receive(ALICE, "hi");

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    assert_eq!(unread(&engine.snapshot(), ALICE), 3);

    engine.open_conversation(ContactId::new(ALICE), t0);
    engine.pump(&*relay, t0);

    let snapshot = engine.snapshot();
    assert_eq!(visible_bodies(&snapshot), vec!["hi"]);
    assert_eq!(snapshot.thread.as_ref().unwrap().header.visible_messages, 1);
    assert_eq!(unread(&snapshot, ALICE), 0);

    // A blank message arriving while the thread is closed still shows as unread
    engine.close_thread();
    relay.receive(ALICE, "\t");
    engine.pump(&*relay, t0 + secs(5));
    assert_eq!(unread(&engine.snapshot(), ALICE), 1);
}

#[test]
fn test_viewing_thread_marks_reported_count_read() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "first");

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    engine.open_conversation(ContactId::new(ALICE), t0);
    engine.pump(&*relay, t0);

    // New message arrives while the thread is on screen
    relay.receive(ALICE, "second");
    engine.pump(&*relay, t0 + secs(3));
    assert_eq!(engine.read_state().get(&ContactId::new(ALICE)), 2);

    engine.pump(&*relay, t0 + secs(5));
    assert_eq!(unread(&engine.snapshot(), ALICE), 0);
}

#[test]
fn test_thread_header_falls_back_without_metadata() {
    let relay = FakeRelay::new();
    relay.receive(BOB, "hello");
    relay.name(BOB, "Bob");
    relay.fail_profiles(true);

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    engine.open_conversation(ContactId::new(BOB), t0);
    engine.pump(&*relay, t0);

    let snapshot = engine.snapshot();
    let thread = snapshot.thread.as_ref().unwrap();
    assert_eq!(thread.header.title, BOB);
    assert_eq!(thread.header.kind(), "Individual");
    assert_eq!(visible_bodies(&snapshot), vec!["hello"]);
    assert_eq!(
        thread.error.as_ref().map(|e| e.resource),
        Some(Resource::ContactProfile)
    );

    // Metadata is retried and picked up on a later tick
    relay.fail_profiles(false);
    engine.pump(&*relay, t0 + secs(3));
    let snapshot = engine.snapshot();
    let thread = snapshot.thread.as_ref().unwrap();
    assert_eq!(thread.header.title, "Bob");
    assert!(thread.error.is_none());
}

#[test]
fn test_send_then_immediate_resync() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "ping");

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    engine.open_conversation(ContactId::new(ALICE), t0);
    engine.pump(&*relay, t0);

    engine.set_draft("hello");
    let request = engine.send().unwrap().unwrap();
    assert!(engine.snapshot().sending);
    let response = request.execute(&*relay);

    // Well before either timer would fire
    let t1 = t0 + secs(1);
    engine.apply(response, t1);
    assert_eq!(engine.snapshot().draft, "");

    let due = engine.due_requests(t1);
    assert!(due.iter().any(|r| matches!(r, Request::Thread { .. })));
    assert!(due.iter().any(|r| matches!(r, Request::Conversations { .. })));
    for request in due {
        let response = request.execute(&*relay);
        engine.apply(response, t1);
    }

    let snapshot = engine.snapshot();
    assert_eq!(visible_bodies(&snapshot), vec!["ping", "hello"]);
    let groups = &snapshot.thread.as_ref().unwrap().groups;
    assert_eq!(groups.last().unwrap().side, Side::Outbound);
    assert_eq!(unread(&snapshot, ALICE), 0);
    assert_eq!(relay.sent(), vec![(ALICE.to_string(), "hello".to_string())]);
}

#[test]
fn test_send_failure_keeps_draft() {
    let relay = FakeRelay::new();
    relay.fail_send(Some(ApiError::Status {
        status: 500,
        message: "Signal unavailable".to_string(),
    }));

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start_new_chat(ContactId::new(BOB), t0);
    engine.set_draft("are you there?");

    let err = assert_err!(engine.send_blocking(&*relay));
    assert!(matches!(err, SendError::Rejected(ApiError::Status { status: 500, .. })));

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.draft, "are you there?");
    assert!(!snapshot.sending);
    assert_eq!(snapshot.send_error, Some(err));
    assert!(relay.sent().is_empty());

    // No automatic retry
    engine.pump(&*relay, t0);
    assert!(relay.sent().is_empty());

    relay.fail_send(None);
    assert_ok!(engine.send_blocking(&*relay));
    assert_eq!(engine.snapshot().draft, "");
    assert!(engine.snapshot().send_error.is_none());
}

#[test]
fn test_second_send_rejected_while_outstanding() {
    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start_new_chat(ContactId::new(ALICE), t0);
    engine.set_draft("once");

    let first = engine.send().unwrap();
    assert!(first.is_some());
    assert_eq!(engine.send(), Err(SendError::Busy));
    assert_eq!(engine.snapshot().send_error, Some(SendError::Busy));
}

#[test]
fn test_text_typed_while_sending_is_kept() {
    let relay = FakeRelay::new();
    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start_new_chat(ContactId::new(ALICE), t0);

    engine.set_draft("first");
    let request = engine.send().unwrap().unwrap();
    engine.set_draft("second line");
    assert_eq!(engine.send(), Err(SendError::Busy));

    engine.apply(request.execute(&*relay), t0);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.draft, "second line");
    assert!(!snapshot.sending);
    assert_eq!(snapshot.sends_finished, 1);
    assert!(snapshot.send_error.is_none());
    assert_eq!(relay.sent(), vec![(ALICE.to_string(), "first".to_string())]);

    assert_ok!(engine.send_blocking(&*relay));
    assert_eq!(engine.snapshot().draft, "");
    assert_eq!(relay.sent()[1], (ALICE.to_string(), "second line".to_string()));
}

#[test]
fn test_failed_send_request_frees_compose_box() {
    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start_new_chat(ContactId::new(ALICE), t0);
    engine.set_draft("hello");

    let request = engine.send().unwrap().unwrap();
    let panicked = ApiError::Transport("request panicked".to_string());
    engine.apply(request.fail(panicked.clone()), t0);

    let snapshot = engine.snapshot();
    assert!(!snapshot.sending);
    assert_eq!(snapshot.draft, "hello");
    assert_eq!(snapshot.send_error, Some(SendError::Rejected(panicked)));
    assert!(engine.send().unwrap().is_some());
}

#[test]
fn test_blank_send_is_noop() {
    let relay = FakeRelay::new();
    let mut engine = fresh_engine();
    engine.start_new_chat(ContactId::new(ALICE), Instant::now());

    engine.set_draft("   ");
    assert_eq!(engine.send(), Ok(None));
    assert_ok!(engine.send_blocking(&*relay));
    assert!(relay.sent().is_empty());
    assert!(engine.snapshot().send_error.is_none());
}

#[test]
fn test_send_without_conversation() {
    let mut engine = fresh_engine();
    engine.set_draft("hello");
    assert_eq!(engine.send(), Err(SendError::NoConversation));
    assert_eq!(engine.snapshot().draft, "hello");
}

#[test]
fn test_switching_conversation_cancels_previous_thread() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "from alice");
    relay.receive(BOB, "from bob");

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.open_conversation(ContactId::new(ALICE), t0);

    // Alice's fetch is in flight when the user switches to Bob
    let in_flight = engine.due_requests(t0);
    assert_eq!(in_flight.len(), 1);
    engine.open_conversation(ContactId::new(BOB), t0 + secs(1));

    for request in in_flight {
        let response = request.execute(&*relay);
        engine.apply(response, t0 + secs(1));
    }
    assert!(visible_bodies(&engine.snapshot()).is_empty());
    // Late result for Alice did not mark her read
    assert_eq!(engine.read_state().get(&ContactId::new(ALICE)), 0);

    engine.pump(&*relay, t0 + secs(1));
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.thread.as_ref().unwrap().header.contact_id.as_str(), BOB);
    assert_eq!(visible_bodies(&snapshot), vec!["from bob"]);
}

#[test]
fn test_conversation_failure_keeps_stale_list() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "hi");

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);

    relay.fail_conversations(Some(ApiError::Transport("connection refused".to_string())));
    relay.receive(ALICE, "missed");
    engine.pump(&*relay, t0 + secs(5));

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.conversations.len(), 1);
    assert_eq!(unread(&snapshot, ALICE), 1);
    assert_eq!(
        snapshot.conversation_error.as_ref().map(|e| e.resource),
        Some(Resource::Conversations)
    );

    relay.fail_conversations(None);
    engine.pump(&*relay, t0 + secs(10));
    let snapshot = engine.snapshot();
    assert!(snapshot.conversation_error.is_none());
    assert_eq!(unread(&snapshot, ALICE), 2);
}

#[test]
fn test_results_after_stop_are_discarded() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "hi");

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    let in_flight = engine.due_requests(t0);
    engine.stop();

    for request in in_flight {
        let response = request.execute(&*relay);
        engine.apply(response, t0);
    }
    let snapshot = engine.snapshot();
    assert!(!snapshot.conversations_loaded);
    assert!(snapshot.conversations.is_empty());
    assert!(engine.due_requests(t0 + secs(60)).is_empty());
}

#[test]
fn test_unauthorized_is_surfaced() {
    let relay = FakeRelay::new();
    relay.fail_conversations(Some(ApiError::Unauthorized));

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    assert!(engine.snapshot().unauthorized);

    relay.fail_conversations(None);
    engine.pump(&*relay, t0 + secs(5));
    assert!(!engine.snapshot().unauthorized);
}

#[test]
fn test_classification_and_grouping_in_thread() {
    let relay = FakeRelay::new();
    {
        let mut state = relay.state.lock().unwrap();
        let rows = vec![
            Message::builder("1").body("hi").sender_number(ALICE).build(),
            Message::builder("2").body("hello again").sender_number(ALICE).build(),
            // National form of the local number
            Message::builder("3").body("mine").sender_number("0612345678").build(),
            Message::builder("4").body("also mine").sender_name("Me").build(),
            Message::builder("5").body("bob here").sender_number(BOB).build(),
        ];
        for row in rows {
            state.push("grp=", row);
        }
    }

    let mut engine = fresh_engine();
    let t0 = Instant::now();
    engine.open_conversation(ContactId::new("grp="), t0);
    engine.pump(&*relay, t0);

    let snapshot = engine.snapshot();
    let groups = &snapshot.thread.as_ref().unwrap().groups;
    let shape: Vec<(Side, usize)> = groups.iter().map(|g| (g.side, g.messages.len())).collect();
    assert_eq!(
        shape,
        vec![(Side::Inbound, 2), (Side::Outbound, 2), (Side::Inbound, 1)]
    );
    assert_eq!(groups[0].sender_label.as_deref(), Some(ALICE));
    assert_eq!(groups[1].sender_label, None);
}

#[test]
fn test_read_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("read-state.json");
    let relay = FakeRelay::new();
    relay.receive(ALICE, "a");
    relay.receive(ALICE, "b");

    {
        let mut engine = engine_with(ReadStateStore::new(Box::new(FileWatermarkStore::new(
            path.clone(),
        ))));
        let t0 = Instant::now();
        engine.start(t0);
        engine.pump(&*relay, t0);
        engine.open_conversation(ContactId::new(ALICE), t0);
    }

    let mut engine = engine_with(ReadStateStore::new(Box::new(FileWatermarkStore::new(path))));
    assert_eq!(engine.load_read_state(), 1);
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    assert_eq!(unread(&engine.snapshot(), ALICE), 0);
}

#[test]
fn test_corrupt_read_state_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("read-state.json");
    std::fs::write(&path, "{not json").unwrap();

    let relay = FakeRelay::new();
    relay.receive(ALICE, "a");

    let mut engine = engine_with(ReadStateStore::new(Box::new(FileWatermarkStore::new(path))));
    assert_eq!(engine.load_read_state(), 0);
    assert!(engine.snapshot().persistence_warning.is_some());

    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    assert_eq!(unread(&engine.snapshot(), ALICE), 1);
}

#[test]
fn test_unreadable_read_state_surfaces_warning() {
    let store = Arc::new(InMemoryWatermarkStore::new());
    store.set_corrupt(true);

    let mut engine = engine_with(ReadStateStore::new(Box::new(store)));
    assert_eq!(engine.load_read_state(), 0);
    assert!(matches!(
        engine.snapshot().persistence_warning,
        Some(chat::PersistenceWarning::Load { .. })
    ));
}

#[test]
fn test_failed_save_keeps_in_memory_watermark() {
    let store = Arc::new(InMemoryWatermarkStore::new());
    store.set_fail_saves(true);
    let relay = FakeRelay::new();
    relay.receive(ALICE, "a");

    let mut engine = engine_with(ReadStateStore::new(Box::new(store.clone())));
    let t0 = Instant::now();
    engine.start(t0);
    engine.pump(&*relay, t0);
    engine.open_conversation(ContactId::new(ALICE), t0);

    let snapshot = engine.snapshot();
    assert_eq!(unread(&snapshot, ALICE), 0);
    assert!(snapshot.persistence_warning.is_some());
    assert!(store.saved().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_driver_open_and_send() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "ping");

    let backend: Arc<dyn Backend> = relay.clone();
    let handle = chat::sync::driver::spawn(fresh_engine(), backend);

    let snapshot = assert_ok!(handle.wait_for(|s| s.conversations_loaded).await);
    assert_eq!(unread(&snapshot, ALICE), 1);

    assert_ok!(handle.command(Command::OpenConversation(ContactId::new(ALICE))).await);
    let snapshot = assert_ok!(
        handle
            .wait_for(|s| visible_bodies(s) == vec!["ping".to_string()])
            .await
    );
    assert_eq!(unread(&snapshot, ALICE), 0);

    assert_ok!(handle.command(Command::SetDraft("hello".to_string())).await);
    assert_ok!(handle.command(Command::Send).await);
    let snapshot = assert_ok!(
        handle
            .wait_for(|s| visible_bodies(s).iter().any(|b| b == "hello"))
            .await
    );
    assert_eq!(snapshot.draft, "");

    let engine = assert_ok!(handle.shutdown().await);
    assert!(engine.thread().active().is_none());
    assert_eq!(relay.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_driver_stops_on_cancel() {
    let relay = FakeRelay::new();
    let backend: Arc<dyn Backend> = relay;
    let handle = chat::sync::driver::spawn(fresh_engine(), backend);

    let token = handle.cancel_token();
    token.cancel();

    let engine = assert_ok!(handle.shutdown().await);
    assert!(!engine.conversations().poller().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_driver_recovers_from_panicking_request() {
    let relay = FakeRelay::new();
    relay.receive(ALICE, "ping");
    relay.panic_next_listing();

    let backend: Arc<dyn Backend> = relay.clone();
    let handle = chat::sync::driver::spawn(fresh_engine(), backend);

    let snapshot = assert_ok!(handle.wait_for(|s| s.conversation_error.is_some()).await);
    assert!(!snapshot.conversations_loaded);

    // The next tick polls again instead of waiting on the lost fetch
    let snapshot = assert_ok!(handle.wait_for(|s| s.conversations_loaded).await);
    assert_eq!(unread(&snapshot, ALICE), 1);
    assert!(snapshot.conversation_error.is_none());
    assert_eq!(relay.listings(), 2);

    assert_ok!(handle.shutdown().await);
}
