#![forbid(unsafe_code)]

//! Fixed-kind record stores with a monotonically growing id sequence.
//!
//! A [`RecordStore`] keeps the in-use records of one kind keyed by id and
//! persists them to a single store file on [`RecordStore::save`]. Ids are
//! handed out from `high_id` upwards and never recycled within a session.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{BatchError, Result};

mod dynamic;
mod file;

pub use dynamic::{DynamicRecord, DynamicStore};
pub use file::{read_store_file, write_store_file, STORE_FILE_HDR_LEN, STORE_FILE_VERSION};

/// Behaviour shared by every durable record kind.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Short name used in errors and logs.
    const KIND: &'static str;

    /// Record id.
    fn id(&self) -> u64;
    /// Whether the record is live.
    fn in_use(&self) -> bool;
    /// Flips the live flag.
    fn set_in_use(&mut self, in_use: bool);
    /// A blank, not-in-use record for `id`.
    fn unused(id: u64) -> Self;
}

#[derive(Serialize, Deserialize)]
struct StoreImage<R> {
    high_id: u64,
    records: Vec<R>,
}

/// One record store file.
pub struct RecordStore<R: Record> {
    file_name: &'static str,
    records: BTreeMap<u64, R>,
    high_id: u64,
    max_id: u64,
}

impl<R: Record> RecordStore<R> {
    /// Creates an empty store whose ids may not exceed `max_id`.
    pub fn new(file_name: &'static str, max_id: u64) -> Self {
        Self {
            file_name,
            records: BTreeMap::new(),
            high_id: 0,
            max_id,
        }
    }

    /// Loads the store file from `dir`, or starts empty when none exists.
    pub fn open(dir: &Path, file_name: &'static str, max_id: u64) -> Result<Self> {
        let mut store = Self::new(file_name, max_id);
        if let Some(image) = read_store_file::<StoreImage<R>>(&dir.join(file_name))? {
            for record in image.records {
                if !record.in_use() {
                    return Err(BatchError::corruption(format!(
                        "{file_name}: unused {} record {} persisted",
                        R::KIND,
                        record.id()
                    )));
                }
                if record.id() >= image.high_id {
                    return Err(BatchError::corruption(format!(
                        "{file_name}: {} record {} beyond high id {}",
                        R::KIND,
                        record.id(),
                        image.high_id
                    )));
                }
                store.records.insert(record.id(), record);
            }
            store.high_id = image.high_id;
        }
        Ok(store)
    }

    /// Writes every in-use record to the store file in `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let image = StoreImage {
            high_id: self.high_id,
            records: self.records.values().cloned().collect(),
        };
        write_store_file(&dir.join(self.file_name), &image)
    }

    /// Allocates the next id in the sequence.
    pub fn next_id(&mut self) -> Result<u64> {
        if self.high_id > self.max_id {
            return Err(BatchError::IdSpaceExhausted(R::KIND));
        }
        let id = self.high_id;
        self.high_id += 1;
        Ok(id)
    }

    /// One past the highest id ever handed out or written.
    pub fn high_id(&self) -> u64 {
        self.high_id
    }

    /// Highest id this store accepts.
    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    /// Moves the sequence past `id` so it is never allocated again.
    pub fn set_highest_possible_id_in_use(&mut self, id: u64) {
        if id >= self.high_id {
            self.high_id = id + 1;
        }
    }

    /// Whether a live record is stored under `id`.
    pub fn is_in_use(&self, id: u64) -> bool {
        self.records.contains_key(&id)
    }

    /// Reads a live record, failing with `NotFound` otherwise.
    pub fn get_record(&self, id: u64) -> Result<R> {
        self.records
            .get(&id)
            .cloned()
            .ok_or(BatchError::NotFound { kind: R::KIND, id })
    }

    /// Reads a record, yielding a blank unused one for absent ids.
    pub fn get_or_unused(&self, id: u64) -> R {
        self.records.get(&id).cloned().unwrap_or_else(|| R::unused(id))
    }

    /// Writes a record; a not-in-use record deletes the stored one.
    pub fn update_record(&mut self, record: R) -> Result<()> {
        let id = record.id();
        if id > self.max_id {
            return Err(BatchError::InvalidId { kind: R::KIND, id });
        }
        self.set_highest_possible_id_in_use(id);
        if record.in_use() {
            self.records.insert(id, record);
        } else {
            self.records.remove(&id);
        }
        Ok(())
    }

    /// Live records in ascending id order.
    pub fn iter_in_use(&self) -> impl Iterator<Item = &R> + '_ {
        self.records.values()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no live record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
