#![allow(missing_docs)]

use std::fs;

use sombra_batch::primitives::lock::STORE_LOCK_FILE;
use sombra_batch::storage::catalog::{TokenKind, TokenTable};
use sombra_batch::storage::stores::Stores;
use sombra_batch::storage::{BatchInserter, InserterOptions, PropValue};
use sombra_batch::types::{BatchError, Result};
use tempfile::TempDir;

fn seed(dir: &std::path::Path) -> Result<()> {
    let mut inserter = BatchInserter::open(dir)?;
    inserter.create_node(&[("name", PropValue::from("Alice"))], &["Person"])?;
    inserter.shutdown()
}

#[test]
fn flipped_payload_byte_is_reported_as_corruption() -> Result<()> {
    let dir = TempDir::new()?;
    seed(dir.path())?;
    let path = dir.path().join("nodes.db");
    let mut bytes = fs::read(&path)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes)?;

    match BatchInserter::open(dir.path()) {
        Err(BatchError::Corruption(msg)) => assert!(msg.contains("checksum"), "{msg}"),
        Err(other) => panic!("expected corruption, got {other}"),
        Ok(_) => panic!("expected corruption, store opened"),
    }
    Ok(())
}

#[test]
fn foreign_file_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    seed(dir.path())?;
    fs::write(dir.path().join("relationships.db"), b"not a store file at all")?;
    assert!(matches!(
        BatchInserter::open(dir.path()),
        Err(BatchError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn the_store_lock_is_released_on_shutdown() -> Result<()> {
    let dir = TempDir::new()?;
    let mut first = BatchInserter::open(dir.path())?;
    assert!(dir.path().join(STORE_LOCK_FILE).exists());
    assert!(matches!(
        BatchInserter::open(dir.path()),
        Err(BatchError::StoreLocked(_))
    ));
    first.shutdown()?;
    assert!(matches!(first.shutdown(), Err(BatchError::AlreadyShutDown)));
    assert!(matches!(
        first.create_node(&[], &[]),
        Err(BatchError::ShutDown)
    ));

    let mut second = BatchInserter::open(dir.path())?;
    second.shutdown()
}

#[test]
fn token_names_are_written_once() -> Result<()> {
    let dir = TempDir::new()?;
    let mut inserter = BatchInserter::open(dir.path())?;
    let first = inserter.get_or_create_property_key_id("name")?;
    let second = inserter.get_or_create_property_key_id("name")?;
    assert_eq!(first, second);
    inserter.create_node(&[("name", PropValue::from("x"))], &[])?;
    inserter.shutdown()?;

    let stores = Stores::open(dir.path(), &InserterOptions::default())?;
    assert_eq!(stores.tokens.property_keys.records.len(), 1);
    let tokens = TokenTable::open(&stores.tokens)?;
    assert_eq!(tokens.len(TokenKind::PropertyKey), 1);
    assert_eq!(tokens.name_of(TokenKind::PropertyKey, first.0)?, "name");
    Ok(())
}

#[test]
fn configuration_file_options_are_applied() -> Result<()> {
    let dir = TempDir::new()?;
    let options = InserterOptions::from_toml_str(
        "batch_size = 2\nmax_node_id = 5\nstring_block_size = 16\n",
    )?;
    let mut inserter = BatchInserter::open_with(dir.path(), options)?;
    let long = "a string that spills over several sixteen byte blocks";
    let node = inserter.create_node(&[("text", PropValue::from(long))], &[])?;
    assert!(matches!(
        inserter.create_node_with_id(sombra_batch::NodeId(6), &[], &[]),
        Err(BatchError::InvalidId { kind: "node", id: 6 })
    ));
    inserter.shutdown()?;

    let reopened = BatchInserter::open_with(
        dir.path(),
        InserterOptions::default().string_block_size(16),
    )?;
    assert_eq!(reopened.get_node_properties(node)?["text"], PropValue::from(long));
    Ok(())
}

#[test]
fn store_upgrades_are_refused() {
    let err = InserterOptions::from_toml_str("allow_store_upgrade = true").unwrap_err();
    assert!(matches!(err, BatchError::Config(_)));
}
