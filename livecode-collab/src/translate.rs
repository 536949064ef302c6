//! Editor change lists → one [`Operation`].
//!
//! The editor reports an edit transaction as a list of
//! `{range, range_length, text}` changes whose ranges are all expressed
//! against the pre-edit text. The translator folds such a list into a
//! single operation relative to a tracked snapshot, then advances the
//! snapshot so the next transaction in the same frame builds on it.
//!
//! ```text
//!  confirmed text ──(first batch)──► live snapshot ──translate──► Operation
//!                                        │                            │
//!                                        └──── op.apply(snapshot) ◄───┘
//!  flush() clears the snapshot; the next batch re-reads the confirmed text
//! ```

use crate::editor::TextChange;
use crate::offset::{char_len, position_to_offset, split_lines};
use crate::operation::{Operation, OperationError};

/// Why a change list could not be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The changes do not fit the tracked snapshot; the snapshot was
    /// dropped and must be re-read from the live buffer.
    DesyncDetected(String),
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DesyncDetected(e) => write!(f, "Desync detected: {e}"),
        }
    }
}

impl std::error::Error for TranslateError {}

impl From<OperationError> for TranslateError {
    fn from(e: OperationError) -> Self {
        TranslateError::DesyncDetected(e.to_string())
    }
}

/// Tracks the text an in-flight operation is computed against.
#[derive(Debug, Clone, Default)]
pub struct ChangeTranslator {
    live_operation_code: Option<String>,
}

impl ChangeTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the next batch will be computed against, if any.
    pub fn snapshot(&self) -> Option<&str> {
        self.live_operation_code.as_deref()
    }

    /// Forget the snapshot (after a flush, a remote apply or a switch).
    pub fn flush(&mut self) {
        self.live_operation_code = None;
    }

    /// Translate one edit transaction.
    ///
    /// `confirmed` is the last confirmed document text; it seeds the
    /// snapshot when no batch is in flight. On success the snapshot
    /// advances to the operation's output.
    pub fn translate_changes(
        &mut self,
        changes: &[TextChange],
        confirmed: &str,
    ) -> Result<Operation, TranslateError> {
        let base = match self.live_operation_code.take() {
            Some(code) => code,
            None => confirmed.to_string(),
        };

        let op = build_operation(&base, changes)?;
        let next = op.apply(&base)?;
        self.live_operation_code = Some(next);
        Ok(op)
    }
}

/// Fold `changes` into one operation over `base`.
fn build_operation(base: &str, changes: &[TextChange]) -> Result<Operation, TranslateError> {
    let lines = split_lines(base);
    let base_len = char_len(base);

    // Editors report transactions bottom-to-top; walk them top-to-bottom
    // so every step lands after the previous one.
    let mut ordered: Vec<(usize, &TextChange)> = changes
        .iter()
        .rev()
        .map(|change| {
            let start = position_to_offset(&lines, change.range.start.line, change.range.start.column);
            (start, change)
        })
        .collect();
    ordered.sort_by_key(|(start, _)| *start);

    let mut op = Operation::new();
    // Net characters inserted minus deleted so far in this batch.
    let mut delta: isize = 0;

    for (start, change) in ordered {
        let target_start = start as isize + delta;
        let retain = target_start - op.target_len() as isize;
        if retain < 0 {
            return Err(TranslateError::DesyncDetected(format!(
                "change at offset {start} overlaps the previous change"
            )));
        }
        if retain > 0 {
            op.retain(retain as usize);
        }
        if change.range_length > 0 {
            op.delete(change.range_length);
            delta -= change.range_length as isize;
        }
        if !change.text.is_empty() {
            op.insert(&change.text);
            delta += char_len(&change.text) as isize;
        }
    }

    if op.base_len() > base_len {
        return Err(TranslateError::DesyncDetected(format!(
            "changes consume {} chars of a {base_len}-char snapshot",
            op.base_len()
        )));
    }
    op.retain(base_len - op.base_len());

    Ok(op)
}
