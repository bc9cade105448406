#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn write_csv(dir: &Path) -> (PathBuf, PathBuf) {
    let nodes = dir.join("nodes.csv");
    let rels = dir.join("relationships.csv");
    fs::write(
        &nodes,
        "id,labels,name,email\n\
         a,Person,Alice,alice@example.com\n\
         b,Person|Admin,Bob,bob@example.com\n\
         c,City,Malmö,\n",
    )
    .expect("write nodes");
    fs::write(
        &rels,
        "src,dst,type,since\na,b,KNOWS,2001\nb,c,LIVES_IN,\n",
    )
    .expect("write relationships");
    (nodes, rels)
}

#[test]
fn import_then_stats_as_json() {
    let dir = TempDir::new().expect("tempdir");
    let (nodes, rels) = write_csv(dir.path());
    let store = dir.path().join("graph");

    let output = cargo_bin_cmd!("sombra-batch")
        .args(["--format", "json", "import"])
        .arg(&store)
        .arg("--nodes")
        .arg(&nodes)
        .arg("--relationships")
        .arg(&rels)
        .args(["--index", "Person:name", "--unique", "Person:email", "--batch-size", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(summary["nodes_imported"], 3);
    assert_eq!(summary["relationships_imported"], 2);
    assert_eq!(summary["schema_rules"], 2);

    let output = cargo_bin_cmd!("sombra-batch")
        .args(["--format", "json", "stats"])
        .arg(&store)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stats: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(stats["nodes"], 3);
    assert_eq!(stats["relationships"], 2);
    assert_eq!(stats["labels"][0]["name"], "Person");
    assert_eq!(stats["labels"][0]["count"], 2);
    assert_eq!(stats["relationship_types"][1]["name"], "LIVES_IN");
    assert_eq!(stats["schema_rules"].as_array().map(Vec::len), Some(3));
}

#[test]
fn duplicate_unique_values_fail_the_import() {
    let dir = TempDir::new().expect("tempdir");
    let nodes = dir.path().join("nodes.csv");
    fs::write(&nodes, "id,labels,email\na,User,x@y.com\nb,User,x@y.com\n").expect("write");

    let output = cargo_bin_cmd!("sombra-batch")
        .arg("import")
        .arg(dir.path().join("graph"))
        .arg("--nodes")
        .arg(&nodes)
        .args(["--unique", "User:email"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("index entry conflict on :User(email)"), "{stderr}");
}

#[test]
fn malformed_schema_argument_is_a_usage_error() {
    let dir = TempDir::new().expect("tempdir");
    let (nodes, _) = write_csv(dir.path());
    cargo_bin_cmd!("sombra-batch")
        .arg("import")
        .arg(dir.path().join("graph"))
        .arg("--nodes")
        .arg(&nodes)
        .args(["--index", "Person"])
        .assert()
        .failure();
}

#[test]
fn stats_on_a_missing_store_fails() {
    let dir = TempDir::new().expect("tempdir");
    cargo_bin_cmd!("sombra-batch")
        .arg("stats")
        .arg(dir.path().join("nowhere"))
        .assert()
        .failure();
}
