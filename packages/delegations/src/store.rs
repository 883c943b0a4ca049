use cosmwasm_std::{StdResult, Storage};
use cw_storage_plus::Map;
use serde::de::DeserializeOwned;
use serde::Serialize;

use babylon_apis::{IntermediateDelegation, LocalRecord, PendingDelegation};

/// Intermediate delegations, keyed by the owner's x-only public key
pub const INTERMEDIATE_DELEGATIONS: Map<&str, Vec<IntermediateDelegation>> =
    Map::new("intermediate_delegations");
/// Pending stakes, keyed by the owner's x-only public key
pub const PENDING_DELEGATIONS: Map<&str, Vec<PendingDelegation>> = Map::new("pending_delegations");

/// LocalDelegationStore is the owner-scoped cache of local delegation records, newest
/// first. At most one record per staking tx hash is kept.
/// Without an owner every operation is a no-op.
pub struct LocalDelegationStore<T: 'static> {
    records: Map<&'static str, Vec<T>>,
    owner: Option<String>,
}

impl<T> LocalDelegationStore<T>
where
    T: LocalRecord + Serialize + DeserializeOwned + Clone,
{
    pub const fn new(records: Map<&'static str, Vec<T>>) -> Self {
        LocalDelegationStore {
            records,
            owner: None,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn set_owner(&mut self, owner: Option<String>) {
        self.owner = owner;
    }

    pub fn list(&self, storage: &dyn Storage) -> StdResult<Vec<T>> {
        match &self.owner {
            Some(owner) => Ok(self
                .records
                .may_load(storage, owner.as_str())?
                .unwrap_or_default()),
            None => Ok(vec![]),
        }
    }

    /// append adds a record in front, replacing any record with the same staking tx hash
    pub fn append(&self, storage: &mut dyn Storage, record: T) -> StdResult<()> {
        if self.owner.is_none() {
            return Ok(());
        }
        let mut records = self.list(storage)?;
        records.retain(|r| r.staking_tx_hash_hex() != record.staking_tx_hash_hex());
        records.insert(0, record);
        self.replace(storage, records)
    }

    /// prune removes the records matching `should_remove`, returning whether anything was
    /// removed. Storage is only written to when something was.
    pub fn prune<F>(&self, storage: &mut dyn Storage, should_remove: F) -> StdResult<bool>
    where
        F: Fn(&T) -> bool,
    {
        let records = self.list(storage)?;
        let before = records.len();
        let kept: Vec<T> = records.into_iter().filter(|r| !should_remove(r)).collect();
        if kept.len() == before {
            return Ok(false);
        }
        self.replace(storage, kept)?;
        Ok(true)
    }

    /// replace overwrites the owner's records
    pub fn replace(&self, storage: &mut dyn Storage, records: Vec<T>) -> StdResult<()> {
        let Some(owner) = &self.owner else {
            return Ok(());
        };
        if records.is_empty() {
            self.records.remove(storage, owner.as_str());
            Ok(())
        } else {
            self.records.save(storage, owner.as_str(), &records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babylon_apis::IntermediateState;
    use cosmwasm_std::MemoryStorage;

    fn record(id: &str, state: IntermediateState) -> IntermediateDelegation {
        IntermediateDelegation {
            staking_tx_hash_hex: id.to_string(),
            staker_pk_hex: "owner".to_string(),
            finality_provider_pk_hex: "fp".to_string(),
            staking_value: 1_000,
            staking_tx_hex: "02".to_string(),
            timelock: 150,
            state,
        }
    }

    fn store(owner: &str) -> LocalDelegationStore<IntermediateDelegation> {
        let mut store = LocalDelegationStore::new(INTERMEDIATE_DELEGATIONS);
        store.set_owner(Some(owner.to_string()));
        store
    }

    #[test]
    fn append_lists_newest_first_and_replaces_same_id() {
        let mut storage = MemoryStorage::new();
        let store = store("alice");

        store
            .append(&mut storage, record("a", IntermediateState::IntermediateUnbonding))
            .unwrap();
        store
            .append(&mut storage, record("b", IntermediateState::IntermediateUnbonding))
            .unwrap();
        store
            .append(&mut storage, record("a", IntermediateState::IntermediateWithdrawal))
            .unwrap();

        let records = store.list(&storage).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].staking_tx_hash_hex, "a");
        assert_eq!(records[0].state, IntermediateState::IntermediateWithdrawal);
        assert_eq!(records[1].staking_tx_hash_hex, "b");
    }

    #[test]
    fn records_are_scoped_by_owner() {
        let mut storage = MemoryStorage::new();
        store("alice")
            .append(&mut storage, record("a", IntermediateState::IntermediateUnbonding))
            .unwrap();

        assert!(store("bob").list(&storage).unwrap().is_empty());
        assert_eq!(store("alice").list(&storage).unwrap().len(), 1);
    }

    #[test]
    fn no_owner_is_a_no_op() {
        let mut storage = MemoryStorage::new();
        let store = LocalDelegationStore::new(INTERMEDIATE_DELEGATIONS);

        store
            .append(&mut storage, record("a", IntermediateState::IntermediateUnbonding))
            .unwrap();
        assert!(store.list(&storage).unwrap().is_empty());
        assert!(!store.prune(&mut storage, |_| true).unwrap());
        assert!(storage.range(None, None, cosmwasm_std::Order::Ascending).next().is_none());
    }

    #[test]
    fn prune_reports_changes() {
        let mut storage = MemoryStorage::new();
        let store = store("alice");
        store
            .append(&mut storage, record("a", IntermediateState::IntermediateUnbonding))
            .unwrap();
        store
            .append(&mut storage, record("b", IntermediateState::IntermediateUnbonding))
            .unwrap();

        assert!(!store
            .prune(&mut storage, |r| r.staking_tx_hash_hex == "c")
            .unwrap());
        assert!(store
            .prune(&mut storage, |r| r.staking_tx_hash_hex == "a")
            .unwrap());
        let ids: Vec<String> = store
            .list(&storage)
            .unwrap()
            .into_iter()
            .map(|r| r.staking_tx_hash_hex)
            .collect();
        assert_eq!(ids, vec!["b".to_string()]);

        assert!(store.prune(&mut storage, |_| true).unwrap());
        assert!(store.list(&storage).unwrap().is_empty());
    }
}
