//! Integration tests for edit scripts run through DocumentService.

use std::path::PathBuf;
use std::sync::Arc;

use rstest::rstest;
use tempfile::TempDir;

use folddoc::application::services::DocumentService;
use folddoc::application::ApplicationError;
use folddoc::config::Settings;
use folddoc::domain::{DomainError, FieldValue, PathKey};
use folddoc::infrastructure::traits::RealFileSystem;
use folddoc::util::testing;

fn service() -> DocumentService {
    testing::init_test_setup();
    DocumentService::new(Arc::new(Settings::default()), Arc::new(RealFileSystem))
}

fn create_script(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("edit.fold");
    std::fs::write(&path, content).expect("write script");
    path
}

const LIST_SCRIPT: &str = r#"
# build a list with one item
add list as L
add list-item into L as I1
add text into I1 as T1 with {"text": "hi"}
"#;

#[test]
fn given_script_file_when_running_then_tree_and_labels_returned() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = create_script(&temp, LIST_SCRIPT);

    // Act
    let outcome = service().run_file(&path).unwrap();

    // Assert
    let doc = &outcome.document;
    assert_eq!(
        doc.to_tree().unwrap().shape(),
        "fragment{list{list-item{text{}}}}"
    );
    let text = outcome.labels["T1"];
    assert_eq!(
        doc.get_node(text).and_then(|n| n.field("text")),
        Some(&FieldValue::from("hi"))
    );
    assert_eq!(doc.history().undo_depth(), 3);
}

#[test]
fn given_transaction_block_when_running_then_single_undo_step() {
    let source = format!("{LIST_SCRIPT}\nbegin\nset T1 text \"a\"\nset T1 text \"b\"\nremove I1\ncommit\nundo\n");
    let outcome = service().run_source(&source).unwrap();

    let doc = &outcome.document;
    assert_eq!(
        doc.get_node(outcome.labels["T1"]).and_then(|n| n.field("text")),
        Some(&FieldValue::from("hi"))
    );
    assert!(doc.can_redo());
}

#[test]
fn given_patch_commands_when_running_then_nested_values_updated() {
    let source = r#"
add card as C with {"style": {"color": "red"}}
patch C style {"margin": 2}
patch-path C style.padding.0 4
"#;
    let outcome = service().run_source(source).unwrap();

    let node = outcome.document.get_node(outcome.labels["C"]).unwrap();
    let style = node.field("style").unwrap();
    assert_eq!(style.get_path(&[PathKey::from("color")]), Some(&FieldValue::from("red")));
    assert_eq!(style.get_path(&[PathKey::from("margin")]), Some(&FieldValue::from(2)));
    assert_eq!(
        style.get_path(&[PathKey::from("padding"), PathKey::Index(0)]),
        Some(&FieldValue::from(4))
    );
}

#[test]
fn given_move_and_select_when_running_then_applied() {
    let source = format!("{LIST_SCRIPT}\nadd list-item into L at 0 as I0\nmove T1 into I0\nselect T1\n");
    let outcome = service().run_source(&source).unwrap();

    let doc = &outcome.document;
    let (i0, t1) = (outcome.labels["I0"], outcome.labels["T1"]);
    assert_eq!(doc.get_node(t1).unwrap().parent, Some(i0));
    assert_eq!(doc.selection(), Some(t1));
    assert_eq!(
        doc.to_tree().unwrap().shape(),
        "fragment{list{list-item{text{}},list-item{}}}"
    );
}

#[rstest]
#[case::containment("add list as L\nadd text into L", 2)]
#[case::move_root("add box as B\nmove root into B", 2)]
#[case::cycle("add box as A\nadd box into A as B\nmove A into B", 3)]
fn given_rejected_edit_when_running_then_edit_error_with_line(
    #[case] source: &str,
    #[case] line: usize,
) {
    let err = service().run_source(source).unwrap_err();

    assert!(matches!(err, ApplicationError::Edit { .. }), "{err:?}");
    assert_eq!(err.line(), Some(line));
}

#[test]
fn given_cyclic_move_when_running_then_cyclic_move_rejected() {
    let err = service()
        .run_source("add box as A\nadd box into A as B\nmove A into B")
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Edit {
            source: DomainError::CyclicMoveRejected { .. },
            ..
        }
    ));
}

#[rstest]
#[case::unknown_verb("explode root")]
#[case::bad_json("set root title {")]
#[case::fields_not_object("add box with [1, 2]")]
#[case::unclosed("begin\nadd box")]
#[case::stray_commit("add box\ncommit")]
fn given_malformed_script_when_running_then_script_error(#[case] source: &str) {
    let err = service().run_source(source).unwrap_err();

    assert!(matches!(err, ApplicationError::Script { .. }), "{err:?}");
}

#[test]
fn given_unknown_label_when_running_then_unknown_label_error() {
    let err = service().run_source("remove Nope").unwrap_err();

    assert!(matches!(err, ApplicationError::UnknownLabel { line: 1, ref label } if label == "Nope"));
}

#[test]
fn given_foreign_node_id_when_running_then_node_not_found() {
    let first = service().run_source("add box as A").unwrap();

    // ids are per document, so a fresh document does not know it
    let err = service()
        .run_source(&format!("remove {}", first.labels["A"]))
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Edit {
            source: DomainError::NodeNotFound(_),
            ..
        }
    ));
}
