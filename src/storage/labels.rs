//! Label sets of node records: inline when small, dynamic chain otherwise.

use smallvec::SmallVec;

use crate::primitives::store::DynamicStore;
use crate::types::{BatchError, LabelId, Result};

use super::props::{read_var_u64, write_var_u64};
use super::record::{LabelField, NodeRecord};

/// Every label of `node`, sorted and duplicate free.
pub fn read_all(node: &NodeRecord, store: &DynamicStore) -> Result<Vec<LabelId>> {
    match &node.labels {
        LabelField::Inline(ids) => Ok(ids.to_vec()),
        LabelField::Dynamic { first } => decode(&store.read_chain(*first)?),
    }
}

/// Whether `node` carries `label`.
pub fn contains(node: &NodeRecord, label: LabelId, store: &DynamicStore) -> Result<bool> {
    match &node.labels {
        LabelField::Inline(ids) => Ok(ids.binary_search(&label).is_ok()),
        LabelField::Dynamic { .. } => Ok(read_all(node, store)?.binary_search(&label).is_ok()),
    }
}

/// Adds `labels` to the node's set, returning whether the set changed.
///
/// The merged set is kept inline up to `inline_capacity` labels and moves to
/// a fresh dynamic chain beyond that; any previous chain is freed first.
pub fn merge(
    node: &mut NodeRecord,
    labels: &[LabelId],
    store: &mut DynamicStore,
    inline_capacity: usize,
) -> Result<bool> {
    let current = read_all(node, store)?;
    let mut merged = current.clone();
    merged.extend_from_slice(labels);
    merged.sort_unstable();
    merged.dedup();
    if merged == current {
        return Ok(false);
    }
    if let LabelField::Dynamic { first } = node.labels {
        store.free_chain(first)?;
    }
    node.labels = if merged.len() <= inline_capacity {
        LabelField::Inline(SmallVec::from_vec(merged))
    } else {
        let mut bytes = Vec::with_capacity(merged.len() * 2 + 1);
        write_var_u64(merged.len() as u64, &mut bytes);
        for label in &merged {
            write_var_u64(u64::from(label.0), &mut bytes);
        }
        LabelField::Dynamic {
            first: store.allocate_chain(&bytes)?,
        }
    };
    Ok(true)
}

fn decode(bytes: &[u8]) -> Result<Vec<LabelId>> {
    let mut cursor = 0usize;
    let len = read_var_u64(bytes, &mut cursor)? as usize;
    if len > bytes.len() {
        return Err(BatchError::corruption("label set length exceeds payload"));
    }
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let raw = read_var_u64(bytes, &mut cursor)?;
        let id = u32::try_from(raw)
            .map_err(|_| BatchError::corruption(format!("label id {raw} out of range")))?;
        out.push(LabelId(id));
    }
    if out.windows(2).any(|w| w[0] >= w[1]) {
        return Err(BatchError::corruption("label set not sorted"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::store::Record;
    use tempfile::tempdir;

    fn labels(ids: &[u32]) -> Vec<LabelId> {
        ids.iter().copied().map(LabelId).collect()
    }

    #[test]
    fn merge_is_a_sorted_union() -> Result<()> {
        let dir = tempdir()?;
        let mut store = DynamicStore::open(dir.path(), "node_labels.db", 8)?;
        let mut node = NodeRecord::unused(0);
        assert!(merge(&mut node, &labels(&[3, 1, 3]), &mut store, 4)?);
        assert!(!merge(&mut node, &labels(&[1]), &mut store, 4)?);
        assert_eq!(read_all(&node, &store)?, labels(&[1, 3]));
        assert!(contains(&node, LabelId(3), &store)?);
        assert!(!contains(&node, LabelId(2), &store)?);
        Ok(())
    }

    #[test]
    fn large_sets_spill_to_a_dynamic_chain() -> Result<()> {
        let dir = tempdir()?;
        let mut store = DynamicStore::open(dir.path(), "node_labels.db", 2)?;
        let mut node = NodeRecord::unused(0);
        merge(&mut node, &labels(&[0, 1]), &mut store, 2)?;
        assert!(matches!(node.labels, LabelField::Inline(_)));
        merge(&mut node, &labels(&[300, 2]), &mut store, 2)?;
        assert!(matches!(node.labels, LabelField::Dynamic { .. }));
        assert_eq!(read_all(&node, &store)?, labels(&[0, 1, 2, 300]));
        let blocks = store.len();

        merge(&mut node, &labels(&[5]), &mut store, 2)?;
        assert_eq!(read_all(&node, &store)?, labels(&[0, 1, 2, 5, 300]));
        assert!(contains(&node, LabelId(300), &store)?);
        assert!(store.len() >= blocks);
        Ok(())
    }

    #[test]
    fn replaced_chain_is_freed() -> Result<()> {
        let dir = tempdir()?;
        let mut store = DynamicStore::open(dir.path(), "node_labels.db", 64)?;
        let mut node = NodeRecord::unused(0);
        merge(&mut node, &labels(&[1, 2, 3]), &mut store, 1)?;
        assert_eq!(store.len(), 1);
        merge(&mut node, &labels(&[4]), &mut store, 1)?;
        assert_eq!(store.len(), 1);
        Ok(())
    }
}
