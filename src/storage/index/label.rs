use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::store::{read_store_file, write_store_file};
use crate::types::{LabelId, NodeId, Result};

use super::types::NodeLabelUpdate;
use super::{LabelScanStore, LabelScanWriter};

/// File name of the label scan store inside a store directory.
pub const LABEL_SCAN_FILE: &str = "labelscan.db";

#[derive(Default, Serialize, Deserialize)]
struct LabelScanImage {
    labels: BTreeMap<LabelId, BTreeSet<u64>>,
}

fn load(path: &Path) -> Result<LabelScanImage> {
    Ok(read_store_file(path)?.unwrap_or_default())
}

/// Label scan store kept in `<store>/labelscan.db`.
pub struct NativeLabelScanStore {
    path: PathBuf,
}

impl NativeLabelScanStore {
    /// Label scan store of the store directory `store_dir`.
    pub fn new(store_dir: &Path) -> Self {
        Self {
            path: store_dir.join(LABEL_SCAN_FILE),
        }
    }

    /// Snapshot reader of the persisted store.
    pub fn reader(&self) -> Result<LabelScanReader> {
        Ok(LabelScanReader {
            image: load(&self.path)?,
        })
    }
}

impl LabelScanStore for NativeLabelScanStore {
    fn new_writer(&self) -> Result<Box<dyn LabelScanWriter>> {
        Ok(Box::new(NativeLabelScanWriter {
            path: self.path.clone(),
            image: load(&self.path)?,
            written: 0,
        }))
    }
}

struct NativeLabelScanWriter {
    path: PathBuf,
    image: LabelScanImage,
    written: u64,
}

impl LabelScanWriter for NativeLabelScanWriter {
    fn write(&mut self, update: NodeLabelUpdate) -> Result<()> {
        let node = update.node.0;
        for label in &update.labels_before {
            if update.labels_after.binary_search(label).is_err() {
                if let Some(nodes) = self.image.labels.get_mut(label) {
                    nodes.remove(&node);
                }
            }
        }
        for label in &update.labels_after {
            self.image.labels.entry(*label).or_default().insert(node);
        }
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.image.labels.retain(|_, nodes| !nodes.is_empty());
        write_store_file(&self.path, &self.image)?;
        debug!(updates = self.written, labels = self.image.labels.len(), "labelscan.close");
        Ok(())
    }
}

/// Read access to the label scan store.
pub struct LabelScanReader {
    image: LabelScanImage,
}

impl LabelScanReader {
    /// Nodes carrying `label`, ascending.
    pub fn nodes_with_label(&self, label: LabelId) -> Vec<NodeId> {
        self.image
            .labels
            .get(&label)
            .map(|nodes| nodes.iter().copied().map(NodeId).collect())
            .unwrap_or_default()
    }

    /// Labels with at least one node.
    pub fn labels(&self) -> Vec<LabelId> {
        self.image.labels.keys().copied().collect()
    }
}
