//! Decides when staged records are made durable.

use tracing::trace;

use crate::types::Result;

use super::staged::{CommitStats, RecordSet};
use super::stores::Stores;

/// Commit policy of a session.
pub trait FlushStrategy {
    /// Counts one mutation unit and commits when the policy says so.
    fn flush(&mut self, records: &mut RecordSet, stores: &mut Stores) -> Result<Option<CommitStats>>;

    /// Commits unconditionally.
    fn force_flush(&mut self, records: &mut RecordSet, stores: &mut Stores) -> Result<CommitStats>;

    /// Mutation units since the last commit.
    fn pending(&self) -> usize;
}

/// Commits once every `batch_size` mutation units.
#[derive(Debug)]
pub struct BatchedFlushStrategy {
    batch_size: usize,
    attempts: usize,
}

impl BatchedFlushStrategy {
    /// Strategy committing every `batch_size` units; zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            attempts: 0,
        }
    }
}

impl FlushStrategy for BatchedFlushStrategy {
    fn flush(&mut self, records: &mut RecordSet, stores: &mut Stores) -> Result<Option<CommitStats>> {
        self.attempts += 1;
        trace!(attempts = self.attempts, batch_size = self.batch_size, "flush.attempt");
        if self.attempts >= self.batch_size {
            return self.force_flush(records, stores).map(Some);
        }
        Ok(None)
    }

    fn force_flush(&mut self, records: &mut RecordSet, stores: &mut Stores) -> Result<CommitStats> {
        let stats = records.commit(stores)?;
        self.attempts = 0;
        Ok(stats)
    }

    fn pending(&self) -> usize {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::options::InserterOptions;
    use tempfile::tempdir;

    #[test]
    fn commits_on_the_batch_boundary() -> Result<()> {
        let dir = tempdir()?;
        let mut stores = Stores::open(dir.path(), &InserterOptions::default())?;
        let mut records = RecordSet::default();
        let mut strategy = BatchedFlushStrategy::new(3);

        for round in 0..3u64 {
            let id = stores.nodes.next_id()?;
            records.nodes.create(id, &stores.nodes)?;
            let committed = strategy.flush(&mut records, &mut stores)?;
            if round < 2 {
                assert!(committed.is_none());
                assert!(!stores.nodes.is_in_use(id));
            } else {
                assert_eq!(committed.map(|s| s.nodes), Some(3));
            }
        }
        assert_eq!(strategy.pending(), 0);
        assert_eq!(stores.nodes.len(), 3);
        Ok(())
    }

    #[test]
    fn force_flush_resets_the_counter() -> Result<()> {
        let dir = tempdir()?;
        let mut stores = Stores::open(dir.path(), &InserterOptions::default())?;
        let mut records = RecordSet::default();
        let mut strategy = BatchedFlushStrategy::new(10);
        strategy.flush(&mut records, &mut stores)?;
        assert_eq!(strategy.pending(), 1);
        let stats = strategy.force_flush(&mut records, &mut stores)?;
        assert_eq!(stats.total(), 0);
        assert_eq!(strategy.pending(), 0);
        Ok(())
    }
}
