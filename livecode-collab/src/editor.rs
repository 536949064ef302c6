//! Editor widget interface.
//!
//! The collaboration core never owns the document text. It reads and
//! mutates it through [`EditorBuffer`], which a host implements on top of
//! its real editor widget. Change and selection notifications flow the
//! other way as [`EditorEvent`]s that the host forwards to the session.
//!
//! [`MemoryEditor`] is a headless implementation backed by a rope, used
//! for server-side replay, tests and benchmarks.

use std::collections::{HashMap, VecDeque};

use ropey::Rope;
use uuid::Uuid;

use crate::offset::{Position, TextRange};
use crate::selection::SelectionTrigger;

/// One change as reported by the editor: the pre-edit `range`
/// (`range_length` characters) was replaced by `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub range: TextRange,
    pub range_length: usize,
    pub text: String,
}

impl TextChange {
    pub fn new(range: TextRange, range_length: usize, text: impl Into<String>) -> Self {
        Self {
            range,
            range_length,
            text: text.into(),
        }
    }
}

/// A selection in editor coordinates. `anchor == head` is a bare caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorSelection {
    /// Where the selection started.
    pub anchor: Position,
    /// Where the caret is.
    pub head: Position,
}

impl EditorSelection {
    pub fn caret(pos: Position) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }
}

/// Handle to a decoration owned by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecorationId(pub u64);

/// A decoration to attach to a text range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationSpec {
    pub range: TextRange,
    pub class_name: String,
    /// Shown when hovering the decoration.
    pub hover_message: Option<String>,
}

/// Notification emitted by the editor widget.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// One edit transaction, changes in editor reporting order.
    ContentChanged(Vec<TextChange>),
    SelectionChanged {
        selections: Vec<EditorSelection>,
        trigger: SelectionTrigger,
    },
}

/// The subset of an editor widget the collaboration core needs.
pub trait EditorBuffer {
    /// Full text of the current document.
    fn text(&self) -> String;

    /// Text split into lines without line breaks.
    fn lines_content(&self) -> Vec<String>;

    /// Number of characters in the document.
    fn char_count(&self) -> usize {
        self.text().chars().count()
    }

    fn cursor_position(&self) -> Position;

    fn set_cursor_position(&mut self, pos: Position);

    /// Replace `range` with `text`. Emits a change notification like any
    /// other edit.
    fn apply_text_edit(&mut self, range: TextRange, text: &str);

    /// Swap the whole content without emitting a change, as a widget does
    /// when a different model is attached.
    fn set_model(&mut self, text: &str);

    /// Atomically remove `old` decorations and add `new` ones for `owner`.
    /// Returns the ids of the new decorations, in order.
    fn replace_decorations(
        &mut self,
        owner: Uuid,
        old: &[DecorationId],
        new: Vec<DecorationSpec>,
    ) -> Vec<DecorationId>;
}

// ───────────────────────────────────────────────────────────────────
// Headless editor
// ───────────────────────────────────────────────────────────────────

/// In-memory editor buffer.
///
/// Every mutation queues an [`EditorEvent`], mirroring how a real widget
/// fires its change listeners; drain them with
/// [`MemoryEditor::drain_events`].
#[derive(Debug, Clone)]
pub struct MemoryEditor {
    rope: Rope,
    cursor: Position,
    selections: Vec<EditorSelection>,
    decorations: HashMap<DecorationId, (Uuid, DecorationSpec)>,
    next_decoration: u64,
    events: VecDeque<EditorEvent>,
}

impl MemoryEditor {
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            cursor: Position::START,
            selections: vec![EditorSelection::caret(Position::START)],
            decorations: HashMap::new(),
            next_decoration: 1,
            events: VecDeque::new(),
        }
    }

    fn char_index(&self, pos: Position) -> usize {
        let last_line = self.rope.len_lines().saturating_sub(1);
        let line = pos.line.saturating_sub(1).min(last_line);
        let index = self.rope.line_to_char(line) + pos.column.saturating_sub(1);
        index.min(self.rope.len_chars())
    }

    fn position_of(&self, index: usize) -> Position {
        let index = index.min(self.rope.len_chars());
        let line = self.rope.char_to_line(index);
        Position::new(line + 1, index - self.rope.line_to_char(line) + 1)
    }

    /// Apply one user transaction made of several edits, all expressed in
    /// pre-edit coordinates. Changes are reported bottom-to-top, the way
    /// multi-cursor editors report them.
    pub fn edit(&mut self, edits: &[(TextRange, &str)]) {
        let mut resolved: Vec<(usize, usize, TextChange)> = edits
            .iter()
            .map(|(range, text)| {
                let start = self.char_index(range.start);
                let end = self.char_index(range.end).max(start);
                (start, end, TextChange::new(*range, end - start, *text))
            })
            .collect();
        resolved.sort_by(|a, b| b.0.cmp(&a.0));

        for (start, end, change) in &resolved {
            self.rope.remove(*start..*end);
            self.rope.insert(*start, &change.text);
        }

        if let Some((start, _, change)) = resolved.last() {
            self.cursor = self.position_of(start + change.text.chars().count());
        }
        let changes = resolved.into_iter().map(|(_, _, change)| change).collect();
        self.events.push_back(EditorEvent::ContentChanged(changes));
    }

    /// Replace the characters in `start..start + deleted` with `text`.
    pub fn replace_at(&mut self, start: usize, deleted: usize, text: &str) {
        let range = TextRange::new(self.position_of(start), self.position_of(start + deleted));
        self.edit(&[(range, text)]);
    }

    /// Insert `text` at `offset` as a keystroke would.
    pub fn type_at(&mut self, offset: usize, text: &str) {
        self.replace_at(offset, 0, text);
    }

    /// Move the selections and queue a selection notification.
    pub fn set_selections(&mut self, selections: Vec<EditorSelection>, trigger: SelectionTrigger) {
        if let Some(primary) = selections.first() {
            self.cursor = primary.head;
        }
        self.selections = selections.clone();
        self.events
            .push_back(EditorEvent::SelectionChanged { selections, trigger });
    }

    pub fn selections(&self) -> &[EditorSelection] {
        &self.selections
    }

    /// Take every queued notification, oldest first.
    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.events.drain(..).collect()
    }

    /// Decorations currently owned by `owner`.
    pub fn decorations_for(&self, owner: Uuid) -> Vec<&DecorationSpec> {
        let mut owned: Vec<(&DecorationId, &DecorationSpec)> = self
            .decorations
            .iter()
            .filter(|(_, (o, _))| *o == owner)
            .map(|(id, (_, spec))| (id, spec))
            .collect();
        owned.sort_by_key(|(id, _)| **id);
        owned.into_iter().map(|(_, spec)| spec).collect()
    }

    pub fn decoration_count(&self) -> usize {
        self.decorations.len()
    }
}

impl EditorBuffer for MemoryEditor {
    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn lines_content(&self) -> Vec<String> {
        self.rope
            .lines()
            .map(|line| {
                let mut s = line.to_string();
                if s.ends_with('\n') {
                    s.pop();
                }
                s
            })
            .collect()
    }

    fn char_count(&self) -> usize {
        self.rope.len_chars()
    }

    fn cursor_position(&self) -> Position {
        self.cursor
    }

    fn set_cursor_position(&mut self, pos: Position) {
        self.cursor = pos;
    }

    fn apply_text_edit(&mut self, range: TextRange, text: &str) {
        self.edit(&[(range, text)]);
    }

    fn set_model(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.cursor = Position::START;
        self.selections = vec![EditorSelection::caret(Position::START)];
    }

    fn replace_decorations(
        &mut self,
        owner: Uuid,
        old: &[DecorationId],
        new: Vec<DecorationSpec>,
    ) -> Vec<DecorationId> {
        for id in old {
            if matches!(self.decorations.get(id), Some((o, _)) if *o == owner) {
                self.decorations.remove(id);
            }
        }
        new.into_iter()
            .map(|spec| {
                let id = DecorationId(self.next_decoration);
                self.next_decoration += 1;
                self.decorations.insert(id, (owner, spec));
                id
            })
            .collect()
    }
}
