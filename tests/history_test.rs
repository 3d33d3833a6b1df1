//! Integration tests for the generic history store.

use rstest::rstest;

use folddoc::domain::{History, HistoryConfig};

fn pushed(values: &[&'static str]) -> History<&'static str> {
    let mut history = History::new(values[0]);
    for v in &values[1..] {
        history.push(*v);
    }
    history
}

#[test]
fn given_pushes_when_undoing_then_states_come_back_in_reverse() {
    let mut history = pushed(&["a", "b", "c"]);

    assert_eq!(history.undo(), Some(&"b"));
    assert_eq!(history.undo(), Some(&"a"));
    assert_eq!(history.undo(), None);
    assert_eq!(*history.current(), "a");
    assert_eq!(history.redo_depth(), 2);
}

#[test]
fn given_undo_when_new_push_then_future_discarded() {
    let mut history = pushed(&["a", "b", "c"]);
    history.undo();

    history.push("d");

    assert!(!history.can_redo());
    assert_eq!(history.past(), &["a", "b"]);
    assert_eq!(history.redo(), None);
    assert_eq!(*history.current(), "d");
}

#[test]
fn given_transaction_when_committed_then_intermediate_states_collapse() {
    let mut history = pushed(&["a"]);

    history.begin_transaction();
    history.push("b");
    history.push("c");
    assert_eq!(*history.current(), "c", "present advances inside a transaction");
    assert_eq!(history.undo_depth(), 0);
    history.commit_transaction();

    assert_eq!(history.undo_depth(), 1);
    assert_eq!(history.undo(), Some(&"a"));
    assert_eq!(history.redo(), Some(&"c"));
}

#[test]
fn given_transaction_when_rolled_back_then_base_restored_and_nothing_recorded() {
    let mut history = pushed(&["a", "b"]);
    history.undo();

    history.begin_transaction();
    history.push("x");
    history.rollback_transaction();

    assert_eq!(*history.current(), "a");
    assert_eq!(history.undo_depth(), 0);
    assert_eq!(history.redo_depth(), 1, "rollback keeps the redo branch");
    assert!(!history.in_transaction());
}

#[test]
fn given_open_transaction_when_undoing_then_refused() {
    let mut history = pushed(&["a", "b"]);
    history.begin_transaction();
    history.push("c");

    assert_eq!(history.undo(), None);
    assert!(!history.can_undo());
    assert_eq!(*history.current(), "c");
}

#[rstest]
#[case::no_transaction(false)]
#[case::second_begin(true)]
fn given_commit_or_rollback_without_open_transaction_then_noop(#[case] begin_twice: bool) {
    let mut history = pushed(&["a", "b"]);
    if begin_twice {
        history.begin_transaction();
        history.begin_transaction();
        history.push("c");
        history.commit_transaction();
    }
    let depth = history.undo_depth();

    history.commit_transaction();
    history.rollback_transaction();

    assert_eq!(history.undo_depth(), depth);
}

#[rstest]
#[case(1, 1)]
#[case(2, 2)]
#[case(10, 4)]
fn given_max_depth_when_pushing_then_oldest_entries_dropped(
    #[case] max_depth: usize,
    #[case] expected: usize,
) {
    let mut history = History::with_config(0, HistoryConfig::bounded(max_depth));
    for v in 1..=4 {
        history.push(v);
    }

    assert_eq!(history.undo_depth(), expected);
    assert_eq!(history.past().last(), Some(&3));
}
