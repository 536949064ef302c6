//! Selection synchronization.
//!
//! Local cursors and selections leave as character offsets; remote ones
//! come back as offsets and are rendered as editor decorations, four
//! roles per user:
//!
//! ```text
//!   primary cursor   │      primary range   ░░░░░
//!   secondary cursor ╎      secondary range ▒▒▒▒▒
//! ```
//!
//! Outgoing updates caused by a discrete action (click, keyboard
//! navigation, API call) are sent at once; updates caused by typing are
//! debounced so a burst of keystrokes produces one message.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::editor::{DecorationId, DecorationSpec, EditorBuffer, EditorSelection};
use crate::offset::{offset_to_position, position_to_offset, TextRange};
use crate::schedule::{Deferred, TaskToken};

/// What caused a selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionTrigger {
    Mouse,
    Keyboard,
    /// Set programmatically by the host.
    Api,
    /// Side effect of typing or pasting.
    ContentChange,
}

impl SelectionTrigger {
    /// Discrete triggers are broadcast immediately.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Mouse | Self::Keyboard | Self::Api)
    }
}

// ───────────────────────────────────────────────────────────────────
// Wire payload
// ───────────────────────────────────────────────────────────────────

/// Half-open character range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One cursor: where the caret is and what it highlights, if anything.
/// `selection: None` is a collapsed cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionData {
    pub selection: Option<OffsetRange>,
    pub cursor_offset: usize,
}

impl SelectionData {
    pub fn caret(offset: usize) -> Self {
        Self {
            selection: None,
            cursor_offset: offset,
        }
    }

    /// Offsets of an editor selection over `lines`.
    pub fn from_editor<S: AsRef<str>>(lines: &[S], sel: &EditorSelection) -> Self {
        let anchor = position_to_offset(lines, sel.anchor.line, sel.anchor.column);
        let head = position_to_offset(lines, sel.head.line, sel.head.column);
        Self {
            selection: (anchor != head).then(|| OffsetRange::new(anchor, head)),
            cursor_offset: head,
        }
    }
}

/// Everything one user broadcasts about their cursors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPayload {
    pub primary: SelectionData,
    pub secondary: Vec<SelectionData>,
}

impl SelectionPayload {
    /// Build from editor selections; the first one is primary.
    pub fn from_selections<S: AsRef<str>>(lines: &[S], selections: &[EditorSelection]) -> Option<Self> {
        let (primary, rest) = selections.split_first()?;
        Some(Self {
            primary: SelectionData::from_editor(lines, primary),
            secondary: rest
                .iter()
                .map(|sel| SelectionData::from_editor(lines, sel))
                .collect(),
        })
    }
}

// ───────────────────────────────────────────────────────────────────
// Colors & styles
// ───────────────────────────────────────────────────────────────────

/// RGB color of a remote user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl UserColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Stable, vivid color derived from a user id.
    pub fn from_uuid(id: Uuid) -> Self {
        let hue = ((id.as_u128() % 360) as f32) / 360.0;
        let (r, g, b) = hsl_to_rgb(hue, 0.7, 0.6);
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(channel(r), channel(g), channel(b))
    }

    /// `rrggbb`, lowercase.
    pub fn hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn css(&self, alpha: Option<f32>) -> String {
        match alpha {
            Some(a) => format!("rgba({}, {}, {}, {a})", self.r, self.g, self.b),
            None => format!("rgb({}, {}, {})", self.r, self.g, self.b),
        }
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

/// Class names and CSS rules for one remote user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationStyle {
    pub primary_cursor: String,
    pub primary_range: String,
    pub secondary_cursor: String,
    pub secondary_range: String,
    /// Display name baked into the cursor label rule.
    label: String,
    css: String,
}

impl DecorationStyle {
    fn new(config: &SyncConfig, user_id: Uuid, color: UserColor, display_name: &str) -> Self {
        let mut id = user_id.simple().to_string();
        id.truncate(8);
        let key = format!("{id}-{}", color.hex());
        let class = |role: &str| format!("{}-{role}-{key}", config.class_prefix);

        let primary_cursor = class("cursor");
        let primary_range = class("selection");
        let secondary_cursor = class("cursor-secondary");
        let secondary_range = class("selection-secondary");

        let mut css = String::new();
        let _ = writeln!(
            css,
            ".{primary_cursor} {{ border-left: 2px solid {}; }}",
            color.css(None)
        );
        let _ = writeln!(
            css,
            ".{primary_cursor}::after {{ content: \"{}\"; position: absolute; \
             background: {}; color: #fff; font-size: 11px; padding: 0 4px; \
             white-space: nowrap; animation: {}-label-fade {} ease-out {} forwards; }}",
            css_escape(display_name),
            color.css(None),
            config.class_prefix,
            css_secs(config.label_fade),
            css_secs(config.label_hold),
        );
        let _ = writeln!(
            css,
            ".{primary_cursor}:hover::after {{ animation: none; opacity: 1; \
             transition: opacity {}; }}",
            css_secs(config.label_fade),
        );
        let _ = writeln!(
            css,
            ".{primary_range} {{ background-color: {}; }}",
            color.css(Some(0.3))
        );
        let _ = writeln!(
            css,
            ".{secondary_cursor} {{ border-left: 2px solid {}; }}",
            color.css(Some(0.6))
        );
        let _ = writeln!(
            css,
            ".{secondary_range} {{ background-color: {}; }}",
            color.css(Some(0.15))
        );

        Self {
            primary_cursor,
            primary_range,
            secondary_cursor,
            secondary_range,
            label: display_name.to_string(),
            css,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn class_names(&self) -> [&str; 4] {
        [
            &self.primary_cursor,
            &self.primary_range,
            &self.secondary_cursor,
            &self.secondary_range,
        ]
    }
}

fn css_secs(d: Duration) -> String {
    format!("{}s", d.as_secs_f64())
}

fn css_escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' | '\\' => vec!['\\', c],
            '\n' => vec![' '],
            c => vec![c],
        })
        .collect()
}

// ───────────────────────────────────────────────────────────────────
// Remote state
// ───────────────────────────────────────────────────────────────────

/// Incoming selection update for one user. `selection: None` means the
/// user left or deselected; their decorations are removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSelectionUpdate {
    pub user_id: Uuid,
    pub color: UserColor,
    pub display_name: String,
    pub selection: Option<SelectionPayload>,
}

/// What is currently rendered for a remote user.
#[derive(Debug, Clone)]
pub struct RemoteSelection {
    pub user_id: Uuid,
    pub color: UserColor,
    pub display_name: String,
    pub payload: SelectionPayload,
    decorations: Vec<DecorationId>,
}

impl RemoteSelection {
    pub fn decorations(&self) -> &[DecorationId] {
        &self.decorations
    }
}

/// Outgoing debounce and incoming decoration state.
#[derive(Debug)]
pub struct SelectionSynchronizer {
    config: SyncConfig,
    debounce: Deferred,
    /// Latest payload waiting on the debounce, tagged with its run.
    queued: Option<(TaskToken, SelectionPayload)>,
    remotes: HashMap<Uuid, RemoteSelection>,
    styles: HashMap<(Uuid, UserColor), DecorationStyle>,
}

impl SelectionSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            debounce: Deferred::new(),
            queued: None,
            remotes: HashMap::new(),
            styles: HashMap::new(),
        }
    }

    // ── Outgoing ────────────────────────────────────────────────────

    /// Handle a local selection change. Returns a payload to send now,
    /// or `None` if the send was deferred.
    pub fn on_selection_changed<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        selections: &[EditorSelection],
        trigger: SelectionTrigger,
        now: Instant,
    ) -> Option<SelectionPayload> {
        let payload = SelectionPayload::from_selections(lines, selections)?;

        if trigger.is_discrete() {
            if self.debounce.cancel() {
                log::debug!("Discrete {trigger:?} selection supersedes debounced send");
            }
            self.queued = None;
            Some(payload)
        } else {
            let token = self.debounce.schedule(now, self.config.selection_debounce);
            self.queued = Some((token, payload));
            None
        }
    }

    /// Release the debounced payload once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<SelectionPayload> {
        let fired = self.debounce.fire_if_due(now)?;
        match self.queued.take() {
            Some((token, payload)) if token == fired => Some(payload),
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Drop any debounced send. Returns whether one was pending.
    pub fn cancel_pending(&mut self) -> bool {
        self.queued = None;
        self.debounce.cancel()
    }

    // ── Incoming ────────────────────────────────────────────────────

    /// Render a batch of remote selection updates.
    pub fn update_remote_selections<E: EditorBuffer + ?Sized>(
        &mut self,
        editor: &mut E,
        updates: &[RemoteSelectionUpdate],
    ) {
        if updates.is_empty() {
            return;
        }
        let lines = editor.lines_content();

        for update in updates {
            let Some(payload) = &update.selection else {
                if let Some(record) = self.remotes.remove(&update.user_id) {
                    editor.replace_decorations(update.user_id, &record.decorations, Vec::new());
                    log::debug!("Removed selection of {}", update.user_id);
                }
                continue;
            };

            let style = Self::style_for(&mut self.styles, &self.config, update);
            let specs = decoration_specs(&lines, payload, style, &update.display_name);

            let old = self
                .remotes
                .get(&update.user_id)
                .map(|r| r.decorations.clone())
                .unwrap_or_default();
            let decorations = editor.replace_decorations(update.user_id, &old, specs);

            self.remotes.insert(
                update.user_id,
                RemoteSelection {
                    user_id: update.user_id,
                    color: update.color,
                    display_name: update.display_name.clone(),
                    payload: payload.clone(),
                    decorations,
                },
            );
        }
    }

    /// Remove every remote decoration, e.g. before the editor shows
    /// another document.
    pub fn clear_remote_selections<E: EditorBuffer + ?Sized>(&mut self, editor: &mut E) {
        for (user_id, record) in self.remotes.drain() {
            editor.replace_decorations(user_id, &record.decorations, Vec::new());
        }
    }

    fn style_for<'a>(
        styles: &'a mut HashMap<(Uuid, UserColor), DecorationStyle>,
        config: &SyncConfig,
        update: &RemoteSelectionUpdate,
    ) -> &'a DecorationStyle {
        let style = styles
            .entry((update.user_id, update.color))
            .or_insert_with(|| {
                DecorationStyle::new(config, update.user_id, update.color, &update.display_name)
            });
        // Renamed user: same classes, new label rule.
        if style.label != update.display_name {
            *style = DecorationStyle::new(config, update.user_id, update.color, &update.display_name);
        }
        style
    }

    pub fn remote_selection(&self, user_id: Uuid) -> Option<&RemoteSelection> {
        self.remotes.get(&user_id)
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    pub fn style(&self, user_id: Uuid, color: UserColor) -> Option<&DecorationStyle> {
        self.styles.get(&(user_id, color))
    }

    /// Every generated rule, plus the shared label animation.
    pub fn stylesheet(&self) -> String {
        let mut sheet = format!(
            "@keyframes {}-label-fade {{ from {{ opacity: 1; }} to {{ opacity: 0; }} }}\n",
            self.config.class_prefix
        );
        let mut styles: Vec<&DecorationStyle> = self.styles.values().collect();
        styles.sort_by(|a, b| a.primary_cursor.cmp(&b.primary_cursor));
        for style in styles {
            sheet.push_str(&style.css);
        }
        sheet
    }
}

fn decoration_specs<S: AsRef<str>>(
    lines: &[S],
    payload: &SelectionPayload,
    style: &DecorationStyle,
    display_name: &str,
) -> Vec<DecorationSpec> {
    let mut specs = Vec::with_capacity(2 + payload.secondary.len() * 2);
    let mut push = |data: &SelectionData, cursor: &str, range: &str, hover: Option<String>| {
        if let Some(sel) = data.selection.filter(|s| !s.is_empty()) {
            specs.push(DecorationSpec {
                range: TextRange::from_offsets(lines, sel.start, sel.end),
                class_name: range.to_string(),
                hover_message: None,
            });
        }
        specs.push(DecorationSpec {
            range: TextRange::caret(offset_to_position(lines, data.cursor_offset)),
            class_name: cursor.to_string(),
            hover_message: hover,
        });
    };

    push(
        &payload.primary,
        &style.primary_cursor,
        &style.primary_range,
        Some(display_name.to_string()),
    );
    for data in &payload.secondary {
        push(data, &style.secondary_cursor, &style.secondary_range, None);
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::MemoryEditor;
    use crate::offset::Position;

    fn sync() -> SelectionSynchronizer {
        SelectionSynchronizer::new(SyncConfig::default())
    }

    fn caret_at(line: usize, column: usize) -> Vec<EditorSelection> {
        vec![EditorSelection::caret(Position::new(line, column))]
    }

    fn update(user_id: Uuid, selection: Option<SelectionPayload>) -> RemoteSelectionUpdate {
        RemoteSelectionUpdate {
            user_id,
            color: UserColor::from_uuid(user_id),
            display_name: "Ada".into(),
            selection,
        }
    }

    fn ranged(start: usize, end: usize) -> SelectionPayload {
        SelectionPayload {
            primary: SelectionData {
                selection: Some(OffsetRange::new(start, end)),
                cursor_offset: end,
            },
            secondary: Vec::new(),
        }
    }

    // ── Outgoing ────────────────────────────────────────────────────

    #[test]
    fn test_payload_offsets() {
        let lines = ["abc", "def"];
        let sel = vec![
            // Selected backwards: head before anchor.
            EditorSelection::new(Position::new(2, 3), Position::new(1, 2)),
            EditorSelection::caret(Position::new(2, 1)),
        ];
        let payload = SelectionPayload::from_selections(&lines, &sel).unwrap();

        assert_eq!(payload.primary.cursor_offset, 1);
        assert_eq!(payload.primary.selection, Some(OffsetRange { start: 1, end: 6 }));
        assert_eq!(payload.secondary, vec![SelectionData::caret(4)]);
        assert!(SelectionPayload::from_selections(&lines, &[]).is_none());
    }

    #[test]
    fn test_discrete_trigger_sends_immediately() {
        let mut sync = sync();
        let now = Instant::now();
        for trigger in [SelectionTrigger::Mouse, SelectionTrigger::Keyboard, SelectionTrigger::Api] {
            assert!(sync
                .on_selection_changed(&["hello"], &caret_at(1, 3), trigger, now)
                .is_some());
        }
        assert!(sync.next_deadline().is_none());
    }

    #[test]
    fn test_typing_is_debounced() {
        let mut sync = sync();
        let t0 = Instant::now();
        let trigger = SelectionTrigger::ContentChange;

        assert!(sync.on_selection_changed(&["h"], &caret_at(1, 2), trigger, t0).is_none());
        let t1 = t0 + Duration::from_millis(200);
        assert!(sync.on_selection_changed(&["he"], &caret_at(1, 3), trigger, t1).is_none());

        // The second keystroke pushed the deadline out.
        assert!(sync.poll(t0 + Duration::from_millis(500)).is_none());
        let sent = sync.poll(t1 + Duration::from_millis(500)).unwrap();
        assert_eq!(sent.primary, SelectionData::caret(2));
        assert!(sync.poll(t1 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_discrete_cancels_pending_debounce() {
        let mut sync = sync();
        let t0 = Instant::now();
        sync.on_selection_changed(&["hello"], &caret_at(1, 2), SelectionTrigger::ContentChange, t0);
        assert!(sync.next_deadline().is_some());

        let sent = sync
            .on_selection_changed(&["hello"], &caret_at(1, 5), SelectionTrigger::Mouse, t0)
            .unwrap();
        assert_eq!(sent.primary.cursor_offset, 4);
        assert!(sync.poll(t0 + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_cancel_pending() {
        let mut sync = sync();
        let t0 = Instant::now();
        sync.on_selection_changed(&["x"], &caret_at(1, 1), SelectionTrigger::ContentChange, t0);
        assert!(sync.cancel_pending());
        assert!(sync.poll(t0 + Duration::from_secs(1)).is_none());
        assert!(!sync.cancel_pending());
    }

    // ── Incoming ────────────────────────────────────────────────────

    #[test]
    fn test_remote_selection_decorations() {
        let mut editor = MemoryEditor::new("hello\nworld");
        let mut sync = sync();
        let user = Uuid::new_v4();

        sync.update_remote_selections(&mut editor, &[update(user, Some(ranged(2, 8)))]);
        let specs = editor.decorations_for(user);
        assert_eq!(specs.len(), 2);

        let style = sync.style(user, UserColor::from_uuid(user)).unwrap().clone();
        let range = specs.iter().find(|s| s.class_name == style.primary_range).unwrap();
        assert_eq!(range.range.start, Position::new(1, 3));
        assert_eq!(range.range.end, Position::new(2, 3));
        let cursor = specs.iter().find(|s| s.class_name == style.primary_cursor).unwrap();
        assert_eq!(cursor.range, TextRange::caret(Position::new(2, 3)));
        assert_eq!(cursor.hover_message.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_update_replaces_instead_of_accumulating() {
        let mut editor = MemoryEditor::new("hello world");
        let mut sync = sync();
        let user = Uuid::new_v4();

        for end in 1..6 {
            sync.update_remote_selections(&mut editor, &[update(user, Some(ranged(0, end)))]);
        }
        assert_eq!(editor.decoration_count(), 2);
        assert_eq!(sync.remote_selection(user).unwrap().decorations().len(), 2);

        let mut multi = ranged(0, 1);
        multi.secondary = vec![SelectionData::caret(3), SelectionData {
            selection: Some(OffsetRange::new(6, 9)),
            cursor_offset: 9,
        }];
        sync.update_remote_selections(&mut editor, &[update(user, Some(multi))]);
        assert_eq!(editor.decoration_count(), 5);
    }

    #[test]
    fn test_null_payload_removes_all_decorations() {
        let mut editor = MemoryEditor::new("hello");
        let mut sync = sync();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut payload = ranged(0, 2);
        payload.secondary = vec![SelectionData {
            selection: Some(OffsetRange::new(3, 4)),
            cursor_offset: 4,
        }];
        sync.update_remote_selections(
            &mut editor,
            &[update(alice, Some(payload)), update(bob, Some(ranged(1, 1)))],
        );
        assert_eq!(editor.decorations_for(alice).len(), 4);

        sync.update_remote_selections(&mut editor, &[update(alice, None)]);
        assert!(editor.decorations_for(alice).is_empty());
        assert!(sync.remote_selection(alice).is_none());
        // Bob is unaffected.
        assert_eq!(editor.decorations_for(bob).len(), 1);
        assert_eq!(sync.remote_count(), 1);
    }

    #[test]
    fn test_clear_remote_selections() {
        let mut editor = MemoryEditor::new("hello");
        let mut sync = sync();
        sync.update_remote_selections(
            &mut editor,
            &[update(Uuid::new_v4(), Some(ranged(0, 1))), update(Uuid::new_v4(), Some(ranged(2, 3)))],
        );
        sync.clear_remote_selections(&mut editor);
        assert_eq!(editor.decoration_count(), 0);
        assert_eq!(sync.remote_count(), 0);
    }

    #[test]
    fn test_offsets_past_end_clamp() {
        let mut editor = MemoryEditor::new("ab");
        let mut sync = sync();
        let user = Uuid::new_v4();
        sync.update_remote_selections(&mut editor, &[update(user, Some(ranged(1, 50)))]);

        let style = sync.style(user, UserColor::from_uuid(user)).unwrap().clone();
        let specs = editor.decorations_for(user);
        let cursor = specs.iter().find(|s| s.class_name == style.primary_cursor).unwrap();
        assert_eq!(cursor.range.start, Position::new(1, 3));
    }

    // ── Styles ──────────────────────────────────────────────────────

    #[test]
    fn test_styles_are_cached_and_distinct() {
        let mut editor = MemoryEditor::new("text");
        let mut sync = sync();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        sync.update_remote_selections(&mut editor, &[update(alice, Some(ranged(0, 1)))]);
        let first = sync.style(alice, UserColor::from_uuid(alice)).unwrap().clone();
        sync.update_remote_selections(&mut editor, &[update(alice, Some(ranged(1, 2)))]);
        assert_eq!(sync.style(alice, UserColor::from_uuid(alice)), Some(&first));

        sync.update_remote_selections(&mut editor, &[update(bob, Some(ranged(0, 1)))]);
        let second = sync.style(bob, UserColor::from_uuid(bob)).unwrap();
        assert_ne!(first.primary_cursor, second.primary_cursor);

        let names = first.class_names();
        assert!(names.iter().all(|n| n.starts_with("livecode-")));
        let mut unique = names.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_rename_updates_label() {
        let mut editor = MemoryEditor::new("text");
        let mut sync = sync();
        let user = Uuid::new_v4();
        let color = UserColor::from_uuid(user);

        sync.update_remote_selections(&mut editor, &[update(user, Some(ranged(0, 1)))]);
        let before = sync.style(user, color).unwrap().clone();
        assert!(before.css().contains("\"Ada\""));

        let renamed = RemoteSelectionUpdate {
            display_name: "Grace".into(),
            ..update(user, Some(ranged(0, 1)))
        };
        sync.update_remote_selections(&mut editor, &[renamed]);

        let after = sync.style(user, color).unwrap();
        assert_eq!(after.label(), "Grace");
        assert_eq!(after.class_names(), before.class_names());
        assert!(after.css().contains("\"Grace\""));
        assert!(!sync.stylesheet().contains("\"Ada\""));
    }

    #[test]
    fn test_stylesheet_label_timing() {
        let mut editor = MemoryEditor::new("text");
        let mut sync = sync();
        let user = Uuid::new_v4();
        let mut u = update(user, Some(ranged(0, 1)));
        u.display_name = "Grace \"G\"".into();
        sync.update_remote_selections(&mut editor, &[u]);

        let sheet = sync.stylesheet();
        assert!(sheet.starts_with("@keyframes livecode-label-fade"));
        assert!(sheet.contains("0.3s ease-out 1s forwards"));
        assert!(sheet.contains(":hover::after"));
        assert!(sheet.contains(r#"content: "Grace \"G\"""#));
    }

    #[test]
    fn test_user_color_is_stable() {
        let id = Uuid::new_v4();
        assert_eq!(UserColor::from_uuid(id), UserColor::from_uuid(id));
        assert_eq!(UserColor::new(255, 136, 0).hex(), "ff8800");
    }
}
