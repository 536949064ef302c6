//! Host-facing collaboration session.
//!
//! [`CollabSession`] ties the live sync controller and the selection
//! synchronizer to a [`Transport`]. The host forwards editor
//! notifications, inbound messages and timer ticks; the session decides
//! what goes out.
//!
//! ```text
//!   editor ──ContentChanged──► LiveSyncController ──on_frame──► Transport
//!   editor ──SelectionChanged► SelectionSynchronizer ─────────► Transport
//!   peers  ──Operation───────► LiveSyncController ──edits─────► editor
//!   peers  ──Selection───────► SelectionSynchronizer ─decor.──► editor
//! ```

use std::time::Instant;

use uuid::Uuid;

use crate::config::SyncConfig;
use crate::editor::{EditorBuffer, EditorEvent, EditorSelection, TextChange};
use crate::live::{LiveSyncController, SyncError};
use crate::operation::Operation;
use crate::protocol::{InboundEvent, Transport};
use crate::selection::{RemoteSelectionUpdate, SelectionSynchronizer, SelectionTrigger};

pub struct CollabSession<T: Transport> {
    config: SyncConfig,
    live: LiveSyncController,
    selection: SelectionSynchronizer,
    transport: T,
    /// When off, edits are still tracked but nothing is sent.
    collaborating: bool,
}

impl<T: Transport> CollabSession<T> {
    pub fn new(config: SyncConfig, transport: T) -> Self {
        Self {
            live: LiveSyncController::new(),
            selection: SelectionSynchronizer::new(config.clone()),
            config,
            transport,
            collaborating: true,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn live(&self) -> &LiveSyncController {
        &self.live
    }

    pub fn selection(&self) -> &SelectionSynchronizer {
        &self.selection
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_collaborating(&self) -> bool {
        self.collaborating
    }

    pub fn set_collaborating(&mut self, collaborating: bool) {
        if !collaborating {
            self.selection.cancel_pending();
        }
        self.collaborating = collaborating;
    }

    /// True while remote edits are being written into the buffer.
    pub fn is_receiving(&self) -> bool {
        self.live.is_receiving()
    }

    pub fn active_document(&self) -> Option<Uuid> {
        self.live.active_document()
    }

    // ── Documents ───────────────────────────────────────────────────

    pub fn open_document(&mut self, doc_id: Uuid, text: impl Into<String>) {
        self.live.open_document(doc_id, text);
    }

    /// Show `doc_id` in the editor.
    ///
    /// A document already open keeps its own text (remote operations may
    /// have advanced it while it was hidden); `initial_text` is used for a
    /// document seen for the first time.
    pub fn switch_document<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        doc_id: Uuid,
        initial_text: &str,
    ) -> Result<(), SyncError> {
        let previous = self.live.active_document();
        self.leave_active(editor, previous)?;

        let text = self
            .live
            .document_text(doc_id)
            .unwrap_or(initial_text)
            .to_string();
        self.live.switch_document(doc_id, text.as_str());
        editor.set_model(&text);
        Ok(())
    }

    pub fn close_document<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        doc_id: Uuid,
    ) -> Result<(), SyncError> {
        if self.live.active_document() == Some(doc_id) {
            self.leave_active(editor, Some(doc_id))?;
        }
        self.live.close_document(doc_id);
        Ok(())
    }

    /// Drop per-document presence state before the editor stops showing
    /// `doc_id`.
    fn leave_active<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        doc_id: Option<Uuid>,
    ) -> Result<(), SyncError> {
        self.selection.cancel_pending();
        self.selection.clear_remote_selections(editor);
        if let (Some(doc_id), true) = (doc_id, self.collaborating) {
            self.transport.send_selection(doc_id, None)?;
        }
        Ok(())
    }

    // ── Local → peers ───────────────────────────────────────────────

    /// Translate an editor change list. The operation is queued and sent
    /// on the next [`on_frame`](Self::on_frame).
    pub fn translate_changes<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &E,
        changes: &[TextChange],
    ) -> Result<Option<Operation>, SyncError> {
        self.live.on_content_changed(editor, changes)
    }

    pub fn on_selection_changed<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &E,
        selections: &[EditorSelection],
        trigger: SelectionTrigger,
        now: Instant,
    ) -> Result<(), SyncError> {
        let Some(doc_id) = self.live.active_document() else {
            return Ok(());
        };
        if !self.collaborating {
            return Ok(());
        }
        let lines = editor.lines_content();
        if let Some(payload) = self.selection.on_selection_changed(&lines, selections, trigger, now) {
            self.transport.send_selection(doc_id, Some(&payload))?;
        }
        Ok(())
    }

    /// Forward one editor notification.
    pub fn handle_editor_event<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &E,
        event: &EditorEvent,
        now: Instant,
    ) -> Result<(), SyncError> {
        match event {
            EditorEvent::ContentChanged(changes) => self.translate_changes(editor, changes).map(|_| ()),
            EditorEvent::SelectionChanged { selections, trigger } => {
                self.on_selection_changed(editor, selections, *trigger, now)
            }
        }
    }

    /// Animation-frame tick. Sends the operation accumulated since the
    /// last tick, if any.
    pub fn on_frame(&mut self) -> Result<Option<Operation>, SyncError> {
        let Some((doc_id, op)) = self.live.on_frame() else {
            return Ok(None);
        };
        if !self.collaborating {
            log::debug!("Not collaborating; dropping {}→{} operation", op.base_len(), op.target_len());
            return Ok(None);
        }
        self.transport.send_operation(doc_id, &op)?;
        Ok(Some(op))
    }

    /// Timer tick. Sends a debounced selection whose deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Result<(), SyncError> {
        let Some(payload) = self.selection.poll(now) else {
            return Ok(());
        };
        if let (Some(doc_id), true) = (self.live.active_document(), self.collaborating) {
            self.transport.send_selection(doc_id, Some(&payload))?;
        }
        Ok(())
    }

    /// Earliest instant [`poll`](Self::poll) has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.selection.next_deadline()
    }

    // ── Peers → local ───────────────────────────────────────────────

    /// Apply an operation received from a peer.
    ///
    /// Unsent local edits go out first; on rejection the buffer is left
    /// untouched and the error is returned for the host to report.
    pub fn apply_remote_operation<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        doc_id: Uuid,
        op: &Operation,
    ) -> Result<(), SyncError> {
        let flushed = self.live.apply_remote_operation(editor, doc_id, op)?;
        if let Some((local_doc, local)) = flushed {
            if self.collaborating {
                self.transport.send_operation(local_doc, &local)?;
            }
        }
        Ok(())
    }

    /// Render selection updates received from peers. Updates for a
    /// document that is not on screen are ignored.
    pub fn update_remote_selections<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        doc_id: Uuid,
        updates: &[RemoteSelectionUpdate],
    ) {
        if self.live.active_document() != Some(doc_id) {
            log::debug!("Ignoring {} selection update(s) for hidden document {doc_id}", updates.len());
            return;
        }
        self.selection.update_remote_selections(editor, updates);
    }

    /// Forward one inbound message.
    pub fn handle_inbound<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        event: &InboundEvent,
    ) -> Result<(), SyncError> {
        match event {
            InboundEvent::Operation { doc_id, op } => self.apply_remote_operation(editor, *doc_id, op),
            InboundEvent::Selection { doc_id, updates } => {
                self.update_remote_selections(editor, *doc_id, updates);
                Ok(())
            }
        }
    }

    /// Stylesheet for every remote user seen so far.
    pub fn stylesheet(&self) -> String {
        self.selection.stylesheet()
    }
}
