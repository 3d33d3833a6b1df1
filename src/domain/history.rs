//! Linear undo/redo over immutable snapshots.
//!
//! ```text
//! push(s2)              past: [s0, s1]      present: s2   future: []
//! undo()                past: [s0]          present: s1   future: [s2]
//! push(s3)  new branch  past: [s0, s1]      present: s3   future: []
//! ```
//!
//! While a transaction is open, `push` only advances `present`; the state
//! captured by `begin_transaction` becomes a single history entry on commit,
//! or is restored on rollback.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Retention settings for a [`History`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of undo entries kept; `None` keeps everything.
    pub max_depth: Option<usize>,
}

impl HistoryConfig {
    pub fn bounded(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
        }
    }

    pub fn unlimited() -> Self {
        Self { max_depth: None }
    }
}

/// Undo/redo store generic over the snapshot type.
///
/// # Invariants
///
/// 1. `future` is empty after every `push` outside a transaction and after
///    every commit.
/// 2. `past.len() <= max_depth` when a bound is configured.
/// 3. A rolled back transaction leaves `present`, `past` and `future`
///    exactly as they were before `begin_transaction`.
pub struct History<T> {
    present: T,
    /// Oldest first
    past: Vec<T>,
    /// Nearest future first
    future: VecDeque<T>,
    /// State captured by `begin_transaction`
    pending: Option<T>,
    config: HistoryConfig,
}

impl<T> fmt::Debug for History<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("undo_depth", &self.past.len())
            .field("redo_depth", &self.future.len())
            .field("in_transaction", &self.pending.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Clone> History<T> {
    pub fn new(initial: T) -> Self {
        Self::with_config(initial, HistoryConfig::default())
    }

    pub fn with_config(initial: T, config: HistoryConfig) -> Self {
        Self {
            present: initial,
            past: Vec::new(),
            future: VecDeque::new(),
            pending: None,
            config,
        }
    }

    pub fn current(&self) -> &T {
        &self.present
    }

    /// Record `next` as the new present state.
    pub fn push(&mut self, next: T) {
        if self.pending.is_some() {
            self.present = next;
            return;
        }
        let previous = std::mem::replace(&mut self.present, next);
        self.past.push(previous);
        self.future.clear();
        self.enforce_depth();
    }

    /// Open a transaction; a no-op while one is already open.
    pub fn begin_transaction(&mut self) {
        if self.pending.is_some() {
            return;
        }
        trace!("begin transaction");
        self.pending = Some(self.present.clone());
    }

    /// Record the pre-transaction state as one history entry.
    pub fn commit_transaction(&mut self) {
        let Some(base) = self.pending.take() else {
            return;
        };
        trace!("commit transaction");
        self.past.push(base);
        self.future.clear();
        self.enforce_depth();
    }

    /// Discard everything pushed since `begin_transaction`.
    pub fn rollback_transaction(&mut self) {
        let Some(base) = self.pending.take() else {
            return;
        };
        trace!("rollback transaction");
        self.present = base;
    }

    /// Step back one entry. Refused while a transaction is open.
    pub fn undo(&mut self) -> Option<&T> {
        if self.pending.is_some() {
            return None;
        }
        let previous = self.past.pop()?;
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        Some(&self.present)
    }

    /// Step forward one entry. Refused while a transaction is open.
    pub fn redo(&mut self) -> Option<&T> {
        if self.pending.is_some() {
            return None;
        }
        let next = self.future.pop_front()?;
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        Some(&self.present)
    }

    pub fn can_undo(&self) -> bool {
        self.pending.is_none() && !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.pending.is_none() && !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Entries available for undo, oldest first.
    pub fn past(&self) -> &[T] {
        &self.past
    }

    /// Entries available for redo, nearest first.
    pub fn future(&self) -> impl Iterator<Item = &T> {
        self.future.iter()
    }

    fn enforce_depth(&mut self) {
        if let Some(max) = self.config.max_depth {
            if self.past.len() > max {
                let excess = self.past.len() - max;
                self.past.drain(..excess);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(values: &[i32]) -> History<i32> {
        let mut history = History::new(values[0]);
        for v in &values[1..] {
            history.push(*v);
        }
        history
    }

    #[test]
    fn given_new_store_then_nothing_to_undo_or_redo() {
        let mut history = History::new(0);
        assert_eq!(*history.current(), 0);
        assert!(!history.can_undo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert_eq!(*history.current(), 0);
    }

    #[test]
    fn given_pushes_when_undoing_then_steps_back_in_order() {
        let mut history = store(&[1, 2, 3]);
        assert_eq!(history.undo(), Some(&2));
        assert_eq!(history.undo(), Some(&1));
        assert_eq!(history.undo(), None);
        assert_eq!(*history.current(), 1);
        assert_eq!(history.redo_depth(), 2);
    }

    #[test]
    fn given_undo_when_redoing_then_restores_pushed_state() {
        let mut history = store(&[1, 2, 3]);
        history.undo();
        history.undo();
        assert_eq!(history.redo(), Some(&2));
        assert_eq!(history.redo(), Some(&3));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn given_undo_when_pushing_then_redo_is_cleared() {
        let mut history = store(&[1, 2, 3]);
        history.undo();
        history.push(9);
        assert!(!history.can_redo());
        assert_eq!(history.past(), &[1, 2]);
        assert_eq!(*history.current(), 9);
    }

    #[test]
    fn given_transaction_when_committed_then_single_entry_recorded() {
        let mut history = store(&[1]);
        history.begin_transaction();
        history.push(2);
        history.push(3);
        assert_eq!(history.undo_depth(), 0);
        history.commit_transaction();
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(*history.current(), 3);
        assert_eq!(history.undo(), Some(&1));
    }

    #[test]
    fn given_transaction_when_rolled_back_then_state_restored() {
        let mut history = store(&[1, 2, 3]);
        history.undo();
        let past_before = history.past().to_vec();
        let future_before: Vec<_> = history.future().copied().collect();

        history.begin_transaction();
        history.push(7);
        history.push(8);
        history.rollback_transaction();

        assert_eq!(*history.current(), 2);
        assert_eq!(history.past(), past_before.as_slice());
        assert_eq!(history.future().copied().collect::<Vec<_>>(), future_before);
        assert!(!history.in_transaction());
    }

    #[test]
    fn given_open_transaction_when_beginning_again_then_base_kept() {
        let mut history = store(&[1]);
        history.begin_transaction();
        history.push(2);
        history.begin_transaction();
        history.push(3);
        history.rollback_transaction();
        assert_eq!(*history.current(), 1);
    }

    #[test]
    fn given_no_transaction_when_committing_or_rolling_back_then_noop() {
        let mut history = store(&[1, 2]);
        history.commit_transaction();
        history.rollback_transaction();
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(*history.current(), 2);
    }

    #[test]
    fn given_open_transaction_when_undoing_then_refused() {
        let mut history = store(&[1, 2]);
        history.begin_transaction();
        history.push(3);
        assert!(history.undo().is_none());
        assert!(!history.can_undo());
        history.commit_transaction();
        assert_eq!(history.undo(), Some(&2));
    }

    #[test]
    fn given_depth_limit_when_pushing_then_oldest_evicted() {
        let mut history = History::with_config(0, HistoryConfig::bounded(2));
        for v in 1..=5 {
            history.push(v);
        }
        assert_eq!(history.past(), &[3, 4]);
        assert_eq!(history.undo(), Some(&4));
        assert_eq!(history.undo(), Some(&3));
        assert!(history.undo().is_none());
    }

    #[test]
    fn given_depth_limit_when_committing_then_bound_holds() {
        let mut history = History::with_config(0, HistoryConfig::bounded(1));
        history.push(1);
        history.begin_transaction();
        history.push(2);
        history.commit_transaction();
        assert_eq!(history.past(), &[1]);
    }

    #[test]
    fn given_store_when_debug_formatted_then_shows_depths() {
        let history = store(&[1, 2]);
        let s = format!("{history:?}");
        assert!(s.contains("undo_depth"));
    }
}
