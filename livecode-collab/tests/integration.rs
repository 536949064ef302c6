//! Integration tests for two peers exchanging real wire frames.
//!
//! Each peer is a session over a `MemoryEditor` whose transport writes
//! encoded frames to a channel; the tests relay frames by hand.

use livecode_collab::{
    ChannelTransport, CollabSession, EditorBuffer, EditorSelection, MemoryEditor, MessageType,
    Operation, Position, SelectionTrigger, SyncConfig, SyncMessage,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

// ─── Helpers ─────────────────────────────────────────────────────────────────

struct Peer {
    id: Uuid,
    session: CollabSession<ChannelTransport>,
    editor: MemoryEditor,
    outbox: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Peer {
    fn new(name: &str, doc: Uuid, text: &str) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let id = Uuid::new_v4();
        let (tx, outbox) = mpsc::unbounded_channel();
        let mut session = CollabSession::new(SyncConfig::default(), ChannelTransport::new(id, name, tx));
        session.open_document(doc, text);
        Self {
            id,
            session,
            editor: MemoryEditor::new(text),
            outbox,
        }
    }

    /// Deliver queued editor notifications to the session.
    fn pump(&mut self, now: Instant) {
        for event in self.editor.drain_events() {
            self.session
                .handle_editor_event(&self.editor, &event, now)
                .unwrap();
        }
    }

    /// Pump, then run one animation frame.
    fn frame(&mut self) {
        self.pump(Instant::now());
        self.session.on_frame().unwrap();
    }

    fn sent(&mut self) -> Vec<SyncMessage> {
        let mut frames = Vec::new();
        while let Ok(bytes) = self.outbox.try_recv() {
            frames.push(SyncMessage::decode(&bytes).unwrap());
        }
        frames
    }

    fn receive(&mut self, msg: SyncMessage) {
        self.session.transport_mut().observe(msg.clock);
        let event = msg.into_inbound().unwrap();
        self.session.handle_inbound(&mut self.editor, &event).unwrap();
        self.pump(Instant::now());
    }

    fn relay_to(&mut self, other: &mut Peer) -> usize {
        let frames = self.sent();
        let count = frames.len();
        for msg in frames {
            other.receive(msg);
        }
        count
    }
}

// ─── Text ────────────────────────────────────────────────────────────────────

#[test]
fn test_alternating_edits_converge() {
    let doc = Uuid::new_v4();
    let mut alice = Peer::new("Alice", doc, "hello");
    let mut bob = Peer::new("Bob", doc, "hello");

    alice.editor.replace_at(1, 3, "i");
    alice.frame();
    assert_eq!(alice.relay_to(&mut bob), 1);
    assert_eq!(bob.editor.text(), "hio");

    // Bob's buffer changed only through the remote apply: nothing goes back.
    bob.frame();
    assert!(bob.sent().is_empty());

    bob.editor.type_at(3, " there");
    bob.editor.type_at(0, ">> ");
    bob.frame();
    assert_eq!(bob.relay_to(&mut alice), 1);

    assert_eq!(alice.editor.text(), ">> hio there");
    assert_eq!(alice.editor.text(), bob.editor.text());
}

#[test]
fn test_keystroke_right_after_remote_apply_converges() {
    let doc = Uuid::new_v4();
    let mut alice = Peer::new("Alice", doc, "hello");
    let mut bob = Peer::new("Bob", doc, "hello");

    alice.editor.type_at(5, "!");
    alice.frame();
    assert_eq!(alice.relay_to(&mut bob), 1);

    // Bob types before his next frame tick releases the echo guard.
    assert!(bob.session.is_receiving());
    bob.editor.type_at(0, ">");
    bob.frame();

    let frames = bob.sent();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].operation_payload().unwrap().base_len(), 6);
    for msg in frames {
        alice.receive(msg);
    }

    assert_eq!(alice.editor.text(), ">hello!");
    assert_eq!(bob.editor.text(), ">hello!");
}

#[test]
fn test_keystrokes_in_one_frame_send_one_operation() {
    let doc = Uuid::new_v4();
    let mut alice = Peer::new("Alice", doc, "ab");
    let mut bob = Peer::new("Bob", doc, "ab");

    alice.editor.type_at(1, "c");
    alice.pump(Instant::now());
    alice.editor.type_at(2, "d");
    alice.frame();

    let frames = alice.sent();
    assert_eq!(frames.len(), 1);
    let op = frames[0].operation_payload().unwrap();
    assert_eq!(op.base_len(), 2);
    assert_eq!(op.apply("ab").unwrap(), "acdb");

    for msg in frames {
        bob.receive(msg);
    }
    assert_eq!(bob.editor.text(), "acdb");
}

#[test]
fn test_concurrent_edits_converge_with_transform() {
    let doc = Uuid::new_v4();
    let mut alice = Peer::new("Alice", doc, "hello world");
    let mut bob = Peer::new("Bob", doc, "hello world");

    alice.editor.replace_at(0, 5, "howdy");
    alice.frame();
    bob.editor.type_at(11, "!");
    bob.frame();

    let a_msg = alice.sent().remove(0);
    let b_msg = bob.sent().remove(0);
    let a = a_msg.operation_payload().unwrap();
    let b = b_msg.operation_payload().unwrap();

    // The ordering authority rebases each operation over the other.
    let (a_prime, b_prime) = Operation::transform(&a, &b).unwrap();
    let a_frame = SyncMessage::operation(alice.id, doc, a_msg.clock, &a_prime).unwrap();
    let b_frame = SyncMessage::operation(bob.id, doc, b_msg.clock, &b_prime).unwrap();

    alice.receive(b_frame);
    bob.receive(a_frame);

    assert_eq!(alice.editor.text(), "howdy world!");
    assert_eq!(bob.editor.text(), "howdy world!");
    alice.frame();
    bob.frame();
    assert!(alice.sent().is_empty());
    assert!(bob.sent().is_empty());
}

#[test]
fn test_multiline_multibyte_edits_converge() {
    let doc = Uuid::new_v4();
    let text = "fn main() {\n    println!(\"héllo\");\n}\n";
    let mut alice = Peer::new("Alice", doc, text);
    let mut bob = Peer::new("Bob", doc, text);

    let lines = [
        (Position::new(2, 15), Position::new(2, 20), "wörld"),
        (Position::new(3, 2), Position::new(3, 2), "\n// ✓"),
        (Position::new(1, 4), Position::new(1, 8), "run"),
    ];
    for (start, end, insert) in lines {
        alice
            .editor
            .edit(&[(livecode_collab::TextRange::new(start, end), insert)]);
        alice.frame();
        alice.relay_to(&mut bob);
    }

    assert_eq!(bob.editor.text(), "fn run() {\n    println!(\"wörld\");\n}\n// ✓\n");
    assert_eq!(alice.editor.text(), bob.editor.text());
}

#[test]
fn test_stale_remote_operation_rejected() {
    let doc = Uuid::new_v4();
    let mut alice = Peer::new("Alice", doc, "abc");
    let mut bob = Peer::new("Bob", doc, "abcdef");

    alice.editor.type_at(3, "!");
    alice.frame();
    let msg = alice.sent().remove(0);
    let event = msg.into_inbound().unwrap();

    let result = bob.session.handle_inbound(&mut bob.editor, &event);
    assert!(matches!(
        result,
        Err(livecode_collab::SyncError::RemoteOperationRejected(_))
    ));
    assert_eq!(bob.editor.text(), "abcdef");
}

// ─── Selections ──────────────────────────────────────────────────────────────

#[test]
fn test_selection_roundtrip_and_departure() {
    let doc = Uuid::new_v4();
    let mut alice = Peer::new("Alice", doc, "hello\nworld");
    let mut bob = Peer::new("Bob", doc, "hello\nworld");

    alice.editor.set_selections(
        vec![
            EditorSelection::new(Position::new(1, 1), Position::new(1, 6)),
            EditorSelection::caret(Position::new(2, 3)),
        ],
        SelectionTrigger::Mouse,
    );
    alice.pump(Instant::now());

    let frames = alice.sent();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].msg_type, MessageType::Selection);
    for msg in frames {
        bob.receive(msg);
    }

    // Primary cursor + range, one secondary cursor.
    assert_eq!(bob.editor.decorations_for(alice.id).len(), 3);
    let remote = bob.session.selection().remote_selection(alice.id).unwrap();
    assert_eq!(remote.display_name, "Alice");
    assert_eq!(remote.payload.primary.cursor_offset, 5);
    assert!(bob.session.stylesheet().contains("content: \"Alice\""));

    // Alice moves to another document: Bob drops her decorations.
    alice
        .session
        .switch_document(&mut alice.editor, Uuid::new_v4(), "other")
        .unwrap();
    alice.relay_to(&mut bob);
    assert!(bob.editor.decorations_for(alice.id).is_empty());
    assert_eq!(bob.session.selection().remote_count(), 0);
}

#[test]
fn test_typing_selection_debounced() {
    let doc = Uuid::new_v4();
    let mut alice = Peer::new("Alice", doc, "abc");
    let t0 = Instant::now();

    alice.editor.type_at(3, "d");
    alice
        .editor
        .set_selections(vec![EditorSelection::caret(Position::new(1, 5))], SelectionTrigger::ContentChange);
    alice.pump(t0);
    alice.session.on_frame().unwrap();

    let frames = alice.sent();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].msg_type, MessageType::Operation);

    alice.session.poll(t0 + Duration::from_millis(499)).unwrap();
    assert!(alice.sent().is_empty());
    alice.session.poll(t0 + Duration::from_millis(500)).unwrap();
    let frames = alice.sent();
    assert_eq!(frames.len(), 1);
    let update = frames[0].selection_update().unwrap();
    assert_eq!(update.selection.unwrap().primary.cursor_offset, 4);
}
