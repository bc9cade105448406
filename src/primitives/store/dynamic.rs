//! Overflow stores holding byte payloads as chains of fixed-size blocks.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Record, RecordStore};
use crate::types::{BatchError, Result};

/// One block of a dynamic chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRecord {
    /// Block id.
    pub id: u64,
    /// Whether the block is live.
    pub in_use: bool,
    /// Payload bytes, at most the store's block size.
    pub data: Vec<u8>,
    /// Next block of the chain.
    pub next: Option<u64>,
}

impl Record for DynamicRecord {
    const KIND: &'static str = "dynamic";

    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    fn unused(id: u64) -> Self {
        DynamicRecord {
            id,
            in_use: false,
            data: Vec::new(),
            next: None,
        }
    }
}

/// Store of dynamic records with a fixed payload size per block.
pub struct DynamicStore {
    blocks: RecordStore<DynamicRecord>,
    block_size: usize,
}

impl DynamicStore {
    /// Opens (or starts) the dynamic store `file_name` in `dir`.
    pub fn open(dir: &Path, file_name: &'static str, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(BatchError::Config(format!(
                "{file_name}: block size must be positive"
            )));
        }
        Ok(Self {
            blocks: RecordStore::open(dir, file_name, u64::MAX - 1)?,
            block_size,
        })
    }

    /// Persists the store.
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.blocks.save(dir)
    }

    /// Payload bytes per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block is live.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Splits `bytes` into blocks and writes them, returning the first id.
    ///
    /// An empty payload still occupies one (empty) block so that every
    /// pointer resolves.
    pub fn allocate_chain(&mut self, bytes: &[u8]) -> Result<u64> {
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![&[][..]]
        } else {
            bytes.chunks(self.block_size).collect()
        };
        let mut ids = Vec::with_capacity(chunks.len());
        for _ in 0..chunks.len() {
            ids.push(self.blocks.next_id()?);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            self.blocks.update_record(DynamicRecord {
                id: ids[i],
                in_use: true,
                data: chunk.to_vec(),
                next: ids.get(i + 1).copied(),
            })?;
        }
        Ok(ids[0])
    }

    /// Reassembles the payload of the chain starting at `first`.
    pub fn read_chain(&self, first: u64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for block in self.walk(first)? {
            out.extend_from_slice(&block.data);
        }
        Ok(out)
    }

    /// Marks every block of the chain not in use.
    pub fn free_chain(&mut self, first: u64) -> Result<usize> {
        let blocks = self.walk(first)?;
        let freed = blocks.len();
        for block in blocks {
            self.blocks.update_record(DynamicRecord::unused(block.id))?;
        }
        Ok(freed)
    }

    fn walk(&self, first: u64) -> Result<Vec<DynamicRecord>> {
        let mut blocks = Vec::new();
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            if blocks.len() > self.blocks.len() {
                return Err(BatchError::corruption(format!(
                    "dynamic chain starting at {first} loops"
                )));
            }
            let block = self.blocks.get_record(id).map_err(|_| {
                BatchError::corruption(format!(
                    "dynamic chain starting at {first} references missing block {id}"
                ))
            })?;
            cursor = block.next;
            blocks.push(block);
        }
        Ok(blocks)
    }

    #[cfg(test)]
    pub(crate) fn overwrite_block(&mut self, record: DynamicRecord) -> Result<()> {
        self.blocks.update_record(record)
    }
}
