//! Long-term memory: the fact store, the edit instructions the model emits,
//! and the compactor that keeps the store under its size ceiling.

pub mod compactor;
pub mod instruction;
pub mod store;
pub mod types;

use anyhow::Result;

use self::compactor::{CompactionReport, Compactor};
use self::store::MemoryStore;
use self::types::{MemoryUpdate, UpdateSummary};

/// A fact store paired with the compactor that polices its size.
pub struct Memory {
    pub store: MemoryStore,
    compactor: Compactor,
}

impl Memory {
    pub fn new(store: MemoryStore, compactor: Compactor) -> Self {
        Self { store, compactor }
    }

    /// Apply `update`, then compact if the store grew past its high-water mark.
    pub async fn apply(&mut self, update: &MemoryUpdate) -> Result<UpdateSummary> {
        let summary = self.store.apply(update)?;
        if summary.changed() {
            self.compactor.enforce(&mut self.store).await?;
        }
        Ok(summary)
    }

    /// Run a compaction pass now, whatever the store size.
    pub async fn compact_now(&mut self) -> Result<CompactionReport> {
        self.compactor.compact_now(&mut self.store).await
    }
}
