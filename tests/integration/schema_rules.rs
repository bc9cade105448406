#![allow(missing_docs)]

use sombra_batch::storage::index::{InternalIndexState, NativeIndexProvider};
use sombra_batch::storage::schema::SchemaRule;
use sombra_batch::storage::{BatchInserter, PropValue};
use sombra_batch::types::{BatchError, Result};
use tempfile::TempDir;

#[test]
fn rules_are_durable_and_still_conflict_after_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = BatchInserter::open(dir.path())?;
    inserter.create_deferred_schema_index("Person").on("name").create()?;
    let unique = inserter
        .create_deferred_constraint("Person")
        .assert_property_is_unique("email")
        .create()?;
    inserter.create_relationship_existence_constraint("KNOWS", "since")?;
    inserter.shutdown()?;

    let mut reopened = BatchInserter::open(dir.path())?;
    assert_eq!(reopened.index_rules().len(), 2);
    let backing = reopened
        .index_rules()
        .into_iter()
        .find(|rule| rule.unique)
        .map(|rule| rule.owning_constraint);
    assert_eq!(backing, Some(Some(unique)));

    let err = reopened
        .create_deferred_schema_index("Person")
        .on("name")
        .create()
        .unwrap_err();
    assert!(matches!(err, BatchError::SchemaConflict(_)));
    let err = reopened
        .create_deferred_schema_index("Person")
        .on("email")
        .create()
        .unwrap_err();
    assert!(err.is_recoverable());
    assert!(reopened
        .create_relationship_existence_constraint("KNOWS", "since")
        .is_err());

    reopened
        .create_deferred_constraint("Person")
        .assert_property_exists("name")
        .create()?;
    assert_eq!(reopened.constraint_rules().len(), 3);
    reopened.shutdown()
}

#[test]
fn composite_index_only_holds_nodes_with_every_key() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = BatchInserter::open(dir.path())?;
    let rule = inserter
        .create_deferred_schema_index("City")
        .on("country")
        .on("name")
        .create()?;
    let malmo = inserter.create_node(
        &[("country", PropValue::from("SE")), ("name", PropValue::from("Malmö"))],
        &["City"],
    )?;
    inserter.create_node(&[("country", PropValue::from("SE"))], &["City"])?;
    inserter.create_node(
        &[("country", PropValue::from("SE")), ("name", PropValue::from("Lund"))],
        &["Town"],
    )?;
    inserter.shutdown()?;

    let reader = NativeIndexProvider::new(dir.path()).reader(rule)?;
    assert_eq!(reader.entry_count(), 1);
    assert_eq!(
        reader.lookup(&[PropValue::from("SE"), PropValue::from("Malmö")])?,
        vec![malmo]
    );
    Ok(())
}

#[test]
fn failed_indexes_are_skipped_by_later_sessions() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = BatchInserter::open(dir.path())?;
    inserter
        .create_deferred_constraint("User")
        .assert_property_is_unique("login")
        .create()?;
    inserter.create_node(&[("login", PropValue::from("root"))], &["User"])?;
    inserter.create_node(&[("login", PropValue::from("root"))], &["User"])?;
    let index = inserter.index_rules()[0].id;
    assert!(inserter.shutdown().is_err());

    let mut next = BatchInserter::open(dir.path())?;
    next.create_node(&[("login", PropValue::from("admin"))], &["User"])?;
    next.shutdown()?;

    let reader = NativeIndexProvider::new(dir.path()).reader(index)?;
    assert_eq!(reader.state(), InternalIndexState::Failed);
    Ok(())
}

#[test]
fn plain_indexes_are_repopulated_by_later_sessions() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = BatchInserter::open(dir.path())?;
    let rule = inserter.create_deferred_schema_index("Tag").on("v").create()?;
    let first = inserter.create_node(&[("v", PropValue::Int(1))], &["Tag"])?;
    inserter.shutdown()?;

    let mut next = BatchInserter::open(dir.path())?;
    let second = next.create_node(&[("v", PropValue::Int(1))], &["Tag"])?;
    next.shutdown()?;

    let reader = NativeIndexProvider::new(dir.path()).reader(rule)?;
    assert_eq!(reader.state(), InternalIndexState::Online);
    assert_eq!(reader.lookup(&[PropValue::Int(1)])?, vec![first, second]);
    Ok(())
}

#[test]
fn every_rule_kind_is_listed() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = BatchInserter::open(dir.path())?;
    inserter.create_deferred_schema_index("A").on("x").create()?;
    inserter
        .create_deferred_constraint("B")
        .assert_property_is_unique("y")
        .create()?;
    inserter
        .create_deferred_constraint("C")
        .assert_property_exists("z")
        .create()?;
    inserter.create_relationship_existence_constraint("R", "w")?;

    let kinds: Vec<&str> = inserter
        .constraint_rules()
        .iter()
        .map(SchemaRule::kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            "uniqueness constraint",
            "node existence constraint",
            "relationship existence constraint"
        ]
    );
    assert!(matches!(
        inserter.drop_index("A", &["x"]),
        Err(BatchError::Unsupported(_))
    ));
    inserter.shutdown()
}
