#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use sombra_batch::storage::{BatchInserter, InserterOptions, PropValue};
use sombra_batch::types::BatchError;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Set(String, PropValue),
    Remove(String),
    Replace(BTreeMap<String, PropValue>),
}

fn arb_value() -> impl Strategy<Value = PropValue> {
    prop_oneof![
        any::<i64>().prop_map(PropValue::Int),
        any::<bool>().prop_map(PropValue::Bool),
        any::<f64>()
            .prop_filter("NaN never compares equal", |f| !f.is_nan())
            .prop_map(PropValue::Float),
        "[a-z]{0,64}".prop_map(PropValue::Str),
        proptest::collection::vec(any::<i64>(), 0..12).prop_map(PropValue::IntArray),
    ]
}

fn arb_key() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(String::from)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (arb_key(), arb_value()).prop_map(|(k, v)| Op::Set(k, v)),
        2 => arb_key().prop_map(Op::Remove),
        1 => proptest::collection::btree_map(arb_key(), arb_value(), 0..4).prop_map(Op::Replace),
    ]
}

fn as_refs(map: &BTreeMap<String, PropValue>) -> Vec<(&str, PropValue)> {
    map.iter().map(|(k, v)| (k.as_str(), v.clone())).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn property_reads_follow_the_net_effect(
        initial in proptest::collection::btree_map(arb_key(), arb_value(), 0..4),
        ops in proptest::collection::vec(arb_op(), 1..24),
        batch_size in 1usize..6,
    ) {
        let dir = TempDir::new().expect("tempdir");
        let mut inserter = BatchInserter::open_with(
            dir.path(),
            InserterOptions::default().batch_size(batch_size),
        ).expect("open");
        let node = inserter.create_node(&as_refs(&initial), &[]).expect("create");
        let mut model = initial;

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    inserter.set_node_property(node, &key, value.clone()).expect("set");
                    model.insert(key, value);
                }
                Op::Remove(key) => {
                    let removed = inserter.remove_node_property(node, &key);
                    if model.remove(&key).is_some() {
                        prop_assert!(removed.is_ok());
                    } else {
                        let is_not_found = matches!(removed, Err(BatchError::NotFound { .. }));
                        prop_assert!(is_not_found);
                    }
                }
                Op::Replace(map) => {
                    inserter.set_node_properties(node, &as_refs(&map)).expect("replace");
                    model = map;
                }
            }
            prop_assert_eq!(&inserter.get_node_properties(node).expect("read"), &model);
        }

        inserter.force_flush_changes().expect("flush");
        prop_assert_eq!(&inserter.get_node_properties(node).expect("read"), &model);
        inserter.shutdown().expect("shutdown");

        let reopened = BatchInserter::open(dir.path()).expect("reopen");
        prop_assert_eq!(&reopened.get_node_properties(node).expect("read"), &model);
    }

    #[test]
    fn label_reads_are_the_deduplicated_union(
        batches in proptest::collection::vec(
            proptest::collection::vec("[A-H]", 0..5),
            1..8,
        ),
    ) {
        let dir = TempDir::new().expect("tempdir");
        let mut inserter = BatchInserter::open(dir.path()).expect("open");
        let node = inserter.create_node(&[], &[]).expect("create");
        let mut expected = BTreeSet::new();
        for batch in &batches {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            inserter.set_node_labels(node, &refs).expect("labels");
            expected.extend(batch.iter().cloned());
        }

        let labels = inserter.get_node_labels(node).expect("read");
        prop_assert_eq!(labels.len(), expected.len());
        prop_assert_eq!(labels.into_iter().collect::<BTreeSet<_>>(), expected.clone());
        for label in &expected {
            prop_assert!(inserter.node_has_label(node, label).expect("has"));
        }
        inserter.shutdown().expect("shutdown");
    }
}
