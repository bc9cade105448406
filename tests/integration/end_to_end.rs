#![allow(missing_docs)]

use std::path::Path;

use sombra_batch::storage::counts::CountsStore;
use sombra_batch::storage::index::{InternalIndexState, NativeIndexProvider, NativeLabelScanStore};
use sombra_batch::storage::{BatchInserter, InserterOptions, PropValue};
use sombra_batch::types::{BatchError, LabelId, NodeId, Result, TypeId};
use tempfile::TempDir;

fn open(path: &Path) -> Result<BatchInserter> {
    BatchInserter::open_with(path, InserterOptions::default().batch_size(3))
}

#[test]
fn people_who_know_each_other_survive_a_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = open(dir.path())?;
    let alice = inserter.create_node(&[("name", PropValue::from("Alice"))], &["Person"])?;
    let bob = inserter.create_node(&[("name", PropValue::from("Bob"))], &["Person"])?;
    let knows = inserter.create_relationship(alice, bob, "KNOWS", &[])?;
    let rule = inserter.create_deferred_schema_index("Person").on("name").create()?;
    inserter.shutdown()?;

    let mut reopened = open(dir.path())?;
    assert_eq!(reopened.get_node_labels(alice)?, vec!["Person"]);
    assert_eq!(reopened.get_node_labels(bob)?, vec!["Person"]);
    assert_eq!(reopened.get_node_properties(alice)?["name"], PropValue::from("Alice"));
    assert_eq!(reopened.get_node_properties(bob)?["name"], PropValue::from("Bob"));
    assert_eq!(reopened.get_relationship_ids(alice)?, vec![knows]);
    assert_eq!(reopened.get_relationship_ids(bob)?, vec![knows]);
    let rel = reopened.get_relationship_by_id(knows)?;
    assert_eq!((rel.start, rel.end, rel.rel_type.as_str()), (alice, bob, "KNOWS"));
    assert_eq!(reopened.index_rules().len(), 1);
    reopened.shutdown()?;

    let reader = NativeIndexProvider::new(dir.path()).reader(rule)?;
    assert_eq!(reader.state(), InternalIndexState::Online);
    assert_eq!(reader.entry_count(), 2);
    assert_eq!(reader.lookup(&[PropValue::from("Alice")])?, vec![alice]);
    assert_eq!(reader.lookup(&[PropValue::from("Bob")])?, vec![bob]);
    assert!(reader.lookup(&[PropValue::from("Carol")])?.is_empty());
    Ok(())
}

#[test]
fn duplicate_emails_fail_the_close() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = open(dir.path())?;
    inserter
        .create_deferred_constraint("Person")
        .assert_property_is_unique("email")
        .create()?;
    inserter.create_node(&[("email", PropValue::from("x@y.com"))], &["Person"])?;
    inserter.create_node(&[("email", PropValue::from("x@y.com"))], &["Person"])?;
    let index = inserter.index_rules()[0].id;

    let err = inserter.shutdown().unwrap_err();
    assert!(matches!(err, BatchError::IndexEntryConflict { .. }), "{err}");
    assert!(err.to_string().contains(":Person(email)"));

    let reader = NativeIndexProvider::new(dir.path()).reader(index)?;
    assert_eq!(reader.state(), InternalIndexState::Failed);
    assert_eq!(reader.entry_count(), 0);
    assert!(reader.failure().is_some());
    Ok(())
}

#[test]
fn close_rebuilds_counts_and_label_scan() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = open(dir.path())?;
    let a = inserter.create_node(&[], &["Person"])?;
    let b = inserter.create_node(&[], &["Person", "Admin"])?;
    let c = inserter.create_node(&[], &[])?;
    inserter.create_relationship(a, b, "KNOWS", &[])?;
    inserter.create_relationship(b, c, "OWNS", &[])?;
    inserter.create_relationship(a, c, "OWNS", &[])?;
    inserter.shutdown()?;

    let counts = CountsStore::open(dir.path())?;
    assert_eq!(counts.node_count(None), 3);
    assert_eq!(counts.node_count(Some(LabelId(0))), 2);
    assert_eq!(counts.node_count(Some(LabelId(1))), 1);
    assert_eq!(counts.relationship_count(None), 3);
    assert_eq!(counts.relationship_count(Some(TypeId(1))), 2);

    let labels = NativeLabelScanStore::new(dir.path()).reader()?;
    assert_eq!(labels.nodes_with_label(LabelId(0)), vec![a, b]);
    assert_eq!(labels.nodes_with_label(LabelId(1)), vec![b]);
    Ok(())
}

#[test]
fn caller_chosen_ids_persist_and_bump_the_sequence() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = open(dir.path())?;
    inserter.create_node_with_id(NodeId(10), &[("k", PropValue::Int(1))], &["Thing"])?;
    inserter.shutdown()?;

    let mut reopened = open(dir.path())?;
    assert!(reopened.node_exists(NodeId(10))?);
    assert!(!reopened.node_exists(NodeId(3))?);
    assert_eq!(reopened.node_high_id(), 11);
    assert_eq!(reopened.create_node(&[], &[])?, NodeId(11));
    reopened.shutdown()
}
