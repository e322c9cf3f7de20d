//! Withdrawal storage port and its in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::WithdrawalError;
use super::record::Withdrawal;

/// Authoritative store for withdrawal records, keyed by id.
///
/// Writes go through `update_if`, a compare-and-swap on `version`, so the
/// read-evaluate-write of a record's global state is atomic per id.
#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Insert a fresh record; fails with `AlreadyExists` if the id is taken
    async fn insert_new(&self, withdrawal: Withdrawal) -> Result<(), WithdrawalError>;

    async fn get(&self, id: &str) -> Result<Option<Withdrawal>, WithdrawalError>;

    /// Replace the record if its stored version still equals `expected_version`.
    ///
    /// Returns `false` when another writer got there first. On success the
    /// stored version is `expected_version + 1`.
    async fn update_if(
        &self,
        expected_version: u64,
        withdrawal: Withdrawal,
    ) -> Result<bool, WithdrawalError>;

    async fn all(&self) -> Result<Vec<Withdrawal>, WithdrawalError>;
}

pub type WithdrawalStoreBox = Arc<dyn WithdrawalStore>;

/// Thread-safe in-memory store.
///
/// `DashMap` shards lock per key, so writers to different ids never contend.
#[derive(Default, Clone)]
pub struct InMemoryWithdrawalStore {
    records: Arc<DashMap<String, Withdrawal>>,
}

impl InMemoryWithdrawalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl WithdrawalStore for InMemoryWithdrawalStore {
    async fn insert_new(&self, withdrawal: Withdrawal) -> Result<(), WithdrawalError> {
        match self.records.entry(withdrawal.id().to_string()) {
            Entry::Occupied(entry) => Err(WithdrawalError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(withdrawal);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Withdrawal>, WithdrawalError> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn update_if(
        &self,
        expected_version: u64,
        mut withdrawal: Withdrawal,
    ) -> Result<bool, WithdrawalError> {
        let Some(mut current) = self.records.get_mut(withdrawal.id()) else {
            return Err(WithdrawalError::NotFound(withdrawal.id().to_string()));
        };
        if current.version != expected_version {
            return Ok(false);
        }
        withdrawal.version = expected_version + 1;
        *current = withdrawal;
        Ok(true)
    }

    async fn all(&self) -> Result<Vec<Withdrawal>, WithdrawalError> {
        let mut all: Vec<Withdrawal> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(all)
    }
}
