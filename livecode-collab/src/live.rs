//! Live sync controller: local edits out, remote operations in.
//!
//! ```text
//!            local change              frame tick
//!   Idle ─────────────────► Editing ───────────────► Idle
//!    │  ▲                      │                       (pending op handed
//!    │  │ steps applied        │ remote op               to the transport)
//!    │  │                      ▼
//!    └──┴──────────────► Receiving
//!       remote op          (local change events swallowed)
//!
//!   any ──switch_document──► Switching ──► Idle  (pending op discarded)
//! ```
//!
//! The controller owns one [`DocumentSession`] per open document instead
//! of a process-wide model cache. Only the active document is backed by
//! the editor buffer; remote operations for the others are applied to
//! their confirmed text directly.
//!
//! Programmatic edits made while applying a remote operation come back
//! as ordinary change notifications. They are swallowed until the next
//! frame tick by an echo guard. The guard remembers the text the remote
//! apply produced: a batch that turns that text into the live buffer is a
//! local edit typed inside the window and is queued like any other.

use std::collections::HashMap;

use uuid::Uuid;

use crate::editor::{EditorBuffer, TextChange};
use crate::offset::{offset_to_position, TextRange};
use crate::operation::{Operation, OperationError, Step};
use crate::protocol::ProtocolError;
use crate::translate::{ChangeTranslator, TranslateError};

/// Controller state for the active document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// Local edits accumulated, not yet handed to the transport.
    Editing,
    /// A remote operation is being applied to the buffer.
    Receiving,
    /// The editor is being pointed at a different document.
    Switching,
}

/// Errors surfaced by the live sync layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// An operation was applied to text of the wrong length.
    LengthMismatch { expected: usize, actual: usize },
    /// The tracked snapshot diverged from the buffer; the in-progress
    /// operation was dropped and the next edit resynchronizes.
    DesyncDetected(String),
    /// A remote operation did not fit the document; nothing was applied.
    RemoteOperationRejected(String),
    NoActiveDocument,
    UnknownDocument(Uuid),
    Transport(ProtocolError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => {
                write!(f, "Length mismatch: expected {expected} chars, got {actual}")
            }
            Self::DesyncDetected(e) => write!(f, "Desync detected: {e}"),
            Self::RemoteOperationRejected(e) => write!(f, "Remote operation rejected: {e}"),
            Self::NoActiveDocument => write!(f, "No active document"),
            Self::UnknownDocument(id) => write!(f, "Unknown document {id}"),
            Self::Transport(e) => write!(f, "Transport error: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<OperationError> for SyncError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::LengthMismatch { expected, actual } => {
                SyncError::LengthMismatch { expected, actual }
            }
            other => SyncError::DesyncDetected(other.to_string()),
        }
    }
}

impl From<TranslateError> for SyncError {
    fn from(e: TranslateError) -> Self {
        match e {
            TranslateError::DesyncDetected(reason) => SyncError::DesyncDetected(reason),
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(e: ProtocolError) -> Self {
        SyncError::Transport(e)
    }
}

/// Per-document state.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    doc_id: Uuid,
    /// Last text known to match the buffer.
    confirmed: String,
    translator: ChangeTranslator,
    /// Local edits since the last flush, composed into one operation.
    pending: Option<Operation>,
}

impl DocumentSession {
    fn new(doc_id: Uuid, text: String) -> Self {
        Self {
            doc_id,
            confirmed: text,
            translator: ChangeTranslator::new(),
            pending: None,
        }
    }

    pub fn doc_id(&self) -> Uuid {
        self.doc_id
    }

    pub fn text(&self) -> &str {
        &self.confirmed
    }

    pub fn pending(&self) -> Option<&Operation> {
        self.pending.as_ref()
    }

    fn discard(&mut self) -> Option<Operation> {
        self.translator.flush();
        self.pending.take()
    }
}

/// Routes local edits to the transport and remote operations to the
/// buffer.
#[derive(Debug, Default)]
pub struct LiveSyncController {
    state: SyncState,
    active: Option<Uuid>,
    sessions: HashMap<Uuid, DocumentSession>,
    /// Text produced by the last remote apply; armed until the next frame.
    echo_guard: Option<String>,
}

impl LiveSyncController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// True while a remote operation is being applied or its change
    /// notifications are still expected.
    pub fn is_receiving(&self) -> bool {
        self.state == SyncState::Receiving || self.echo_guard.is_some()
    }

    pub fn active_document(&self) -> Option<Uuid> {
        self.active
    }

    pub fn session(&self, doc_id: Uuid) -> Option<&DocumentSession> {
        self.sessions.get(&doc_id)
    }

    /// Confirmed text of any open document.
    pub fn document_text(&self, doc_id: Uuid) -> Option<&str> {
        self.sessions.get(&doc_id).map(|s| s.text())
    }

    pub fn pending(&self) -> Option<&Operation> {
        self.active
            .and_then(|id| self.sessions.get(&id))
            .and_then(|s| s.pending())
    }

    fn transition(&mut self, next: SyncState) {
        if self.state != next {
            log::debug!("Live sync {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn active_session_mut(&mut self) -> Result<&mut DocumentSession, SyncError> {
        let id = self.active.ok_or(SyncError::NoActiveDocument)?;
        self.sessions.get_mut(&id).ok_or(SyncError::UnknownDocument(id))
    }

    /// Register a document. The first document opened becomes active.
    pub fn open_document(&mut self, doc_id: Uuid, text: impl Into<String>) {
        let text = text.into();
        match self.sessions.get_mut(&doc_id) {
            Some(session) => {
                session.discard();
                session.confirmed = text;
            }
            None => {
                self.sessions.insert(doc_id, DocumentSession::new(doc_id, text));
            }
        }
        if self.active.is_none() {
            self.active = Some(doc_id);
        }
        log::info!("Opened document {doc_id}");
    }

    /// Point the editor at another document.
    ///
    /// Returns the unsent operation of the previous document, which is
    /// discarded: the new buffer has no relation to its base.
    pub fn switch_document(&mut self, doc_id: Uuid, text: impl Into<String>) -> Option<Operation> {
        self.transition(SyncState::Switching);

        let discarded = self
            .active
            .and_then(|id| self.sessions.get_mut(&id))
            .and_then(|session| session.discard());
        if let Some(op) = &discarded {
            log::debug!("Discarding unsent {}→{} operation on switch", op.base_len(), op.target_len());
        }
        self.echo_guard = None;

        let text = text.into();
        self.sessions
            .entry(doc_id)
            .and_modify(|s| s.confirmed = text.clone())
            .or_insert_with(|| DocumentSession::new(doc_id, text));
        self.active = Some(doc_id);

        self.transition(SyncState::Idle);
        log::info!("Switched to document {doc_id}");
        discarded
    }

    /// Forget a document. Closing the active one leaves no document active.
    pub fn close_document(&mut self, doc_id: Uuid) -> Option<DocumentSession> {
        let session = self.sessions.remove(&doc_id);
        if self.active == Some(doc_id) {
            self.active = None;
            self.echo_guard = None;
            self.transition(SyncState::Idle);
        }
        if session.is_some() {
            log::info!("Closed document {doc_id}");
        }
        session
    }

    /// Handle one content-change notification for the active document.
    ///
    /// Returns the operation for this batch (already composed into the
    /// pending operation), or `None` when the batch was swallowed as the
    /// echo of a remote apply.
    pub fn on_content_changed<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &E,
        changes: &[TextChange],
    ) -> Result<Option<Operation>, SyncError> {
        let receiving = self.state == SyncState::Receiving;
        let guard = self.echo_guard.clone();
        let session = self.active_session_mut()?;

        if receiving || guard.is_some() {
            session.translator.flush();
            let current = editor.text();
            // A batch that takes the applied text to the live buffer is a
            // local edit made after the apply, not its echo.
            let interleaved = match guard.as_deref() {
                Some(applied) if applied != current => session
                    .translator
                    .translate_changes(changes, applied)
                    .ok()
                    .filter(|_| session.translator.snapshot() == Some(current.as_str())),
                _ => None,
            };
            if let Some(op) = interleaved {
                self.echo_guard = None;
                log::debug!("Local edit interleaved with a remote apply; queued against the applied text");
                return self.queue_local(op, current);
            }
            session.translator.flush();
            session.confirmed = current;
            log::debug!("Swallowed {} echoed change(s)", changes.len());
            return Ok(None);
        }

        let op = match session.translator.translate_changes(changes, &session.confirmed) {
            Ok(op) => op,
            Err(e) => {
                session.discard();
                session.confirmed = editor.text();
                log::warn!("{e}; dropping in-progress operation");
                self.transition(SyncState::Idle);
                return Err(e.into());
            }
        };

        let current = editor.text();
        if session.translator.snapshot() != Some(current.as_str()) {
            session.discard();
            session.confirmed = current;
            log::warn!("Translated snapshot does not match the buffer; dropping in-progress operation");
            self.transition(SyncState::Idle);
            return Err(SyncError::DesyncDetected(
                "translated snapshot does not match the buffer".into(),
            ));
        }
        self.queue_local(op, current)
    }

    /// Compose a translated batch into the pending operation.
    fn queue_local(&mut self, op: Operation, current: String) -> Result<Option<Operation>, SyncError> {
        let session = self.active_session_mut()?;
        session.confirmed = current;

        let composed = match session.pending.take() {
            Some(pending) => pending.compose(&op),
            None => Ok(op.clone()),
        };
        match composed {
            Ok(pending) => session.pending = Some(pending),
            Err(e) => {
                session.translator.flush();
                log::warn!("Cannot merge local edits: {e}");
                self.transition(SyncState::Idle);
                return Err(SyncError::DesyncDetected(e.to_string()));
            }
        }

        self.transition(SyncState::Editing);
        Ok(Some(op))
    }

    /// Animation-frame tick: hand the accumulated operation over and
    /// release the echo guard.
    pub fn on_frame(&mut self) -> Option<(Uuid, Operation)> {
        self.echo_guard = None;
        let session = self.active_session_mut().ok()?;
        session.translator.flush();
        let doc_id = session.doc_id;
        let pending = session.pending.take();
        self.transition(SyncState::Idle);

        pending
            .filter(|op| !op.is_noop())
            .map(|op| (doc_id, op))
    }

    /// Take the pending operation without waiting for the frame tick.
    pub fn take_pending(&mut self) -> Option<(Uuid, Operation)> {
        let session = self.active_session_mut().ok()?;
        session.translator.flush();
        let doc_id = session.doc_id;
        let pending = session.pending.take();
        if self.state == SyncState::Editing {
            self.transition(SyncState::Idle);
        }
        pending
            .filter(|op| !op.is_noop())
            .map(|op| (doc_id, op))
    }

    /// Apply a remote operation to `doc_id`.
    ///
    /// For the active document the steps are applied to the editor
    /// buffer; the operation must match the buffer's length, otherwise it
    /// is rejected and the buffer is left untouched. Local edits still
    /// pending are returned first: hand them to the transport before
    /// anything else, since the buffer is about to move under them.
    pub fn apply_remote_operation<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        doc_id: Uuid,
        op: &Operation,
    ) -> Result<Option<(Uuid, Operation)>, SyncError> {
        if let Err(e) = op.validate() {
            log::warn!("Rejecting malformed remote operation: {e}");
            return Err(SyncError::RemoteOperationRejected(e.to_string()));
        }

        if self.active != Some(doc_id) {
            let session = self
                .sessions
                .get_mut(&doc_id)
                .ok_or(SyncError::UnknownDocument(doc_id))?;
            let next = op.apply(&session.confirmed).map_err(|e| {
                log::warn!("Rejecting remote operation for inactive document {doc_id}: {e}");
                SyncError::RemoteOperationRejected(e.to_string())
            })?;
            session.confirmed = next;
            return Ok(None);
        }

        let actual = editor.char_count();
        if op.base_len() != actual {
            log::warn!(
                "Rejecting remote operation: expects {} chars, buffer has {actual}",
                op.base_len()
            );
            return Err(SyncError::RemoteOperationRejected(format!(
                "operation expects {} chars, buffer has {actual}",
                op.base_len()
            )));
        }

        let flushed = self.take_pending();

        self.transition(SyncState::Receiving);
        apply_steps(editor, op);
        let applied = editor.text();

        let session = self.active_session_mut()?;
        session.translator.flush();
        session.confirmed = applied.clone();
        self.echo_guard = Some(applied);
        self.transition(SyncState::Idle);

        Ok(flushed)
    }
}

/// Apply `op` to the buffer through positional edits.
///
/// Positions are computed once against the pre-apply lines and the edits
/// run bottom-to-top, so no edit shifts the position of one still to come.
fn apply_steps<E: EditorBuffer + ?Sized>(editor: &mut E, op: &Operation) {
    let lines = editor.lines_content();
    let mut cursor = 0usize;
    let mut edits: Vec<(TextRange, &str)> = Vec::new();

    for step in op.steps() {
        match step {
            Step::Retain(n) => cursor += n,
            Step::Insert(text) => {
                let at = offset_to_position(&lines, cursor);
                edits.push((TextRange::caret(at), text.as_str()));
            }
            Step::Delete(n) => {
                cursor += n;
                edits.push((TextRange::from_offsets(&lines, cursor - n, cursor), ""));
            }
        }
    }

    for (range, text) in edits.into_iter().rev() {
        editor.apply_text_edit(range, text);
    }
}
