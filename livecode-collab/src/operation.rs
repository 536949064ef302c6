//! Operational-transform text operations.
//!
//! An [`Operation`] is a run-length list of [`Step`]s that walks a base
//! string from left to right:
//!
//! ```text
//!  base:    h  e  l  l  o
//!           │  └──┴──┘  │
//!  steps:  R1    D3  I"i" R1
//!           │          │  │
//!  target:  h          i  o
//! ```
//!
//! Operations keep two invariants: the `Retain` + `Delete` counts sum to
//! `base_len`, and `target_len = base_len - deleted + inserted`. All
//! counts are in characters (Unicode scalar values).
//!
//! Builders merge adjacent steps of the same kind and place an insert
//! before a trailing delete at the same position, so two operations with
//! the same effect built the same way compare equal.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::offset::char_len;

/// One step of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Keep the next `n` characters of the base.
    Retain(usize),
    /// Insert literal text at the current position.
    Insert(String),
    /// Drop the next `n` characters of the base.
    Delete(usize),
}

impl Step {
    pub fn is_retain(&self) -> bool {
        matches!(self, Step::Retain(_))
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Step::Insert(_))
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Step::Delete(_))
    }

    /// Number of characters this step covers (base for retain/delete,
    /// inserted text for insert).
    pub fn len(&self) -> usize {
        match self {
            Step::Retain(n) | Step::Delete(n) => *n,
            Step::Insert(text) => char_len(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors raised by operation algebra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The operation was applied to a string of the wrong length.
    LengthMismatch { expected: usize, actual: usize },
    /// Two operations cannot be composed or transformed together.
    IncompatibleLengths { left: usize, right: usize },
    /// Declared lengths disagree with the steps, or a step is empty.
    Malformed(String),
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => {
                write!(f, "Length mismatch: operation expects {expected} chars, got {actual}")
            }
            Self::IncompatibleLengths { left, right } => {
                write!(f, "Incompatible operations: {left} vs {right} chars")
            }
            Self::Malformed(e) => write!(f, "Malformed operation: {e}"),
        }
    }
}

impl std::error::Error for OperationError {}

/// A text operation over a base string of `base_len` characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    steps: Vec<Step>,
    base_len: usize,
    target_len: usize,
}

impl Operation {
    /// Empty operation with `base_len = target_len = 0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an operation by feeding `steps` through the builders.
    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let mut op = Self::new();
        for step in steps {
            match step {
                Step::Retain(n) => op.retain(n),
                Step::Insert(text) => op.insert(&text),
                Step::Delete(n) => op.delete(n),
            };
        }
        op
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn base_len(&self) -> usize {
        self.base_len
    }

    pub fn target_len(&self) -> usize {
        self.target_len
    }

    /// True when applying the operation leaves every string unchanged.
    pub fn is_noop(&self) -> bool {
        match self.steps.as_slice() {
            [] => true,
            [Step::Retain(_)] => true,
            _ => false,
        }
    }

    /// Skip over `n` characters.
    pub fn retain(&mut self, n: usize) -> &mut Self {
        if n == 0 {
            return self;
        }
        self.base_len += n;
        self.target_len += n;
        if let Some(Step::Retain(last)) = self.steps.last_mut() {
            *last += n;
        } else {
            self.steps.push(Step::Retain(n));
        }
        self
    }

    /// Insert `text` at the current position. Empty text is a no-op.
    pub fn insert(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        self.target_len += char_len(text);

        match self.steps.as_mut_slice() {
            [.., Step::Insert(last)] | [.., Step::Insert(last), Step::Delete(_)] => {
                last.push_str(text);
                return self;
            }
            _ => {}
        }

        let step = Step::Insert(text.to_string());
        if let Some(Step::Delete(_)) = self.steps.last() {
            let at = self.steps.len() - 1;
            self.steps.insert(at, step);
        } else {
            self.steps.push(step);
        }
        self
    }

    /// Delete the next `n` characters.
    pub fn delete(&mut self, n: usize) -> &mut Self {
        if n == 0 {
            return self;
        }
        self.base_len += n;
        if let Some(Step::Delete(last)) = self.steps.last_mut() {
            *last += n;
        } else {
            self.steps.push(Step::Delete(n));
        }
        self
    }

    /// Check the declared lengths against the steps.
    ///
    /// Operations built through the builders always pass; this guards
    /// operations that arrive deserialized from the network.
    pub fn validate(&self) -> Result<(), OperationError> {
        let mut base = 0usize;
        let mut target = 0usize;
        for step in &self.steps {
            if step.is_empty() {
                return Err(OperationError::Malformed(format!("empty step {step:?}")));
            }
            let (next_base, next_target) = match step {
                Step::Retain(n) => (base.checked_add(*n), target.checked_add(*n)),
                Step::Insert(text) => (Some(base), target.checked_add(char_len(text))),
                Step::Delete(n) => (base.checked_add(*n), Some(target)),
            };
            match (next_base, next_target) {
                (Some(b), Some(t)) => {
                    base = b;
                    target = t;
                }
                _ => {
                    return Err(OperationError::Malformed(format!(
                        "step lengths overflow at {step:?}"
                    )))
                }
            }
        }
        if base != self.base_len || target != self.target_len {
            return Err(OperationError::Malformed(format!(
                "declared {}→{} but steps describe {base}→{target}",
                self.base_len, self.target_len
            )));
        }
        Ok(())
    }

    /// Apply the operation to `input`.
    ///
    /// Fails with [`OperationError::LengthMismatch`] unless `input` is
    /// exactly `base_len` characters long. Pure: the same input always
    /// yields the same output.
    pub fn apply(&self, input: &str) -> Result<String, OperationError> {
        let actual = char_len(input);
        if actual != self.base_len {
            return Err(OperationError::LengthMismatch {
                expected: self.base_len,
                actual,
            });
        }

        let mut chars = input.chars();
        let mut out = String::with_capacity(input.len());
        for step in &self.steps {
            match step {
                Step::Retain(n) => out.extend(chars.by_ref().take(*n)),
                Step::Insert(text) => out.push_str(text),
                Step::Delete(n) => {
                    chars.by_ref().take(*n).for_each(drop);
                }
            }
        }
        Ok(out)
    }

    /// Build the operation that undoes `self` when applied to its output.
    ///
    /// `base` is the string `self` was applied to.
    pub fn invert(&self, base: &str) -> Result<Operation, OperationError> {
        let actual = char_len(base);
        if actual != self.base_len {
            return Err(OperationError::LengthMismatch {
                expected: self.base_len,
                actual,
            });
        }

        let mut inverse = Operation::new();
        let mut chars = base.chars();
        for step in &self.steps {
            match step {
                Step::Retain(n) => {
                    inverse.retain(*n);
                    chars.by_ref().take(*n).for_each(drop);
                }
                Step::Insert(text) => {
                    inverse.delete(char_len(text));
                }
                Step::Delete(n) => {
                    let removed: String = chars.by_ref().take(*n).collect();
                    inverse.insert(&removed);
                }
            }
        }
        Ok(inverse)
    }

    /// Merge `self` followed by `next` into one operation.
    ///
    /// `self.compose(next)?.apply(s) == next.apply(&self.apply(s)?)`.
    pub fn compose(&self, next: &Operation) -> Result<Operation, OperationError> {
        if self.target_len != next.base_len {
            return Err(OperationError::IncompatibleLengths {
                left: self.target_len,
                right: next.base_len,
            });
        }

        let mut composed = Operation::new();
        let mut a_iter = self.steps.iter().cloned();
        let mut b_iter = next.steps.iter().cloned();
        let mut a = a_iter.next();
        let mut b = b_iter.next();

        loop {
            match (a.take(), b.take()) {
                (None, None) => break,
                // Deleted by the first operation: never seen by the second.
                (Some(Step::Delete(n)), rest) => {
                    composed.delete(n);
                    a = a_iter.next();
                    b = rest;
                }
                // Inserted by the second operation: independent of the first.
                (rest, Some(Step::Insert(text))) => {
                    composed.insert(&text);
                    a = rest;
                    b = b_iter.next();
                }
                (None, _) | (_, None) => {
                    return Err(OperationError::IncompatibleLengths {
                        left: self.target_len,
                        right: next.base_len,
                    });
                }
                (Some(Step::Retain(x)), Some(Step::Retain(y))) => {
                    let (n, a_rest, b_rest) = split_counts(x, y);
                    composed.retain(n);
                    a = a_rest.map(Step::Retain).or_else(|| a_iter.next());
                    b = b_rest.map(Step::Retain).or_else(|| b_iter.next());
                }
                (Some(Step::Retain(x)), Some(Step::Delete(y))) => {
                    let (n, a_rest, b_rest) = split_counts(x, y);
                    composed.delete(n);
                    a = a_rest.map(Step::Retain).or_else(|| a_iter.next());
                    b = b_rest.map(Step::Delete).or_else(|| b_iter.next());
                }
                (Some(Step::Insert(text)), Some(Step::Retain(y))) => {
                    let (head, tail) = split_chars(&text, y);
                    let consumed = char_len(head);
                    composed.insert(head);
                    a = non_empty_insert(tail).or_else(|| a_iter.next());
                    b = (y > consumed)
                        .then(|| Step::Retain(y - consumed))
                        .or_else(|| b_iter.next());
                }
                // Inserted then deleted: cancels out.
                (Some(Step::Insert(text)), Some(Step::Delete(y))) => {
                    let (head, tail) = split_chars(&text, y);
                    let consumed = char_len(head);
                    a = non_empty_insert(tail).or_else(|| a_iter.next());
                    b = (y > consumed)
                        .then(|| Step::Delete(y - consumed))
                        .or_else(|| b_iter.next());
                }
            }
        }

        Ok(composed)
    }

    /// Transform two concurrent operations over the same base.
    ///
    /// Returns `(a', b')` such that applying `a` then `b'` yields the same
    /// string as applying `b` then `a'`. When both insert at the same
    /// position, `a`'s text ends up first.
    pub fn transform(a: &Operation, b: &Operation) -> Result<(Operation, Operation), OperationError> {
        if a.base_len != b.base_len {
            return Err(OperationError::IncompatibleLengths {
                left: a.base_len,
                right: b.base_len,
            });
        }

        let mut a_prime = Operation::new();
        let mut b_prime = Operation::new();
        let mut a_iter = a.steps.iter().cloned();
        let mut b_iter = b.steps.iter().cloned();
        let mut x = a_iter.next();
        let mut y = b_iter.next();

        loop {
            match (x.take(), y.take()) {
                (None, None) => break,
                (Some(Step::Insert(text)), rest) => {
                    a_prime.insert(&text);
                    b_prime.retain(char_len(&text));
                    x = a_iter.next();
                    y = rest;
                }
                (rest, Some(Step::Insert(text))) => {
                    a_prime.retain(char_len(&text));
                    b_prime.insert(&text);
                    x = rest;
                    y = b_iter.next();
                }
                (None, _) | (_, None) => {
                    return Err(OperationError::IncompatibleLengths {
                        left: a.base_len,
                        right: b.base_len,
                    });
                }
                (Some(Step::Retain(m)), Some(Step::Retain(n))) => {
                    let (k, x_rest, y_rest) = split_counts(m, n);
                    a_prime.retain(k);
                    b_prime.retain(k);
                    x = x_rest.map(Step::Retain).or_else(|| a_iter.next());
                    y = y_rest.map(Step::Retain).or_else(|| b_iter.next());
                }
                // Both deleted the same run: nothing left to do on either side.
                (Some(Step::Delete(m)), Some(Step::Delete(n))) => {
                    let (_, x_rest, y_rest) = split_counts(m, n);
                    x = x_rest.map(Step::Delete).or_else(|| a_iter.next());
                    y = y_rest.map(Step::Delete).or_else(|| b_iter.next());
                }
                (Some(Step::Delete(m)), Some(Step::Retain(n))) => {
                    let (k, x_rest, y_rest) = split_counts(m, n);
                    a_prime.delete(k);
                    x = x_rest.map(Step::Delete).or_else(|| a_iter.next());
                    y = y_rest.map(Step::Retain).or_else(|| b_iter.next());
                }
                (Some(Step::Retain(m)), Some(Step::Delete(n))) => {
                    let (k, x_rest, y_rest) = split_counts(m, n);
                    b_prime.delete(k);
                    x = x_rest.map(Step::Retain).or_else(|| a_iter.next());
                    y = y_rest.map(Step::Delete).or_else(|| b_iter.next());
                }
            }
        }

        Ok((a_prime, b_prime))
    }
}

/// Consume `min(x, y)` from two counts, returning what is left of each.
fn split_counts(x: usize, y: usize) -> (usize, Option<usize>, Option<usize>) {
    match x.cmp(&y) {
        Ordering::Less => (x, None, Some(y - x)),
        Ordering::Greater => (y, Some(x - y), None),
        Ordering::Equal => (x, None, None),
    }
}

/// Split `text` after `n` characters.
fn split_chars(text: &str, n: usize) -> (&str, &str) {
    let at = text
        .char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(at)
}

fn non_empty_insert(text: &str) -> Option<Step> {
    (!text.is_empty()).then(|| Step::Insert(text.to_string()))
}
