//! Merges the delegations reported by the staking API with the records cached locally.
//! The API is authoritative: local records only fill in what it does not know about yet.
use std::collections::{HashMap, HashSet};

use babylon_apis::{
    Delegation, DelegationState, IntermediateDelegation, IntermediateState, LocalRecord,
    PendingDelegation,
};

/// Where a visible row comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrigin {
    Pending,
    Intermediate,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayState {
    /// A staking tx broadcast locally, not indexed by the API yet
    Pending,
    /// An unbonding or withdrawal the API does not know about yet
    Intermediate(IntermediateState),
    Remote(DelegationState),
}

/// DelegationRow is one entry of the merged delegations view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegationRow {
    pub staking_tx_hash_hex: String,
    pub finality_provider_pk_hex: String,
    pub staking_value: u64,
    pub timelock: u16,
    pub state: DisplayState,
    /// pending_action is the local action taken on a delegation the API still reports in
    /// its previous state
    pub pending_action: Option<IntermediateState>,
    pub origin: RowOrigin,
}

impl DelegationRow {
    fn from_remote(delegation: &Delegation, pending_action: Option<IntermediateState>) -> Self {
        DelegationRow {
            staking_tx_hash_hex: delegation.staking_tx_hash_hex.clone(),
            finality_provider_pk_hex: delegation.finality_provider_pk_hex.clone(),
            staking_value: delegation.staking_value,
            timelock: delegation.staking_tx.timelock,
            state: DisplayState::Remote(delegation.state),
            pending_action,
            origin: RowOrigin::Remote,
        }
    }

    fn from_intermediate(record: &IntermediateDelegation) -> Self {
        DelegationRow {
            staking_tx_hash_hex: record.staking_tx_hash_hex.clone(),
            finality_provider_pk_hex: record.finality_provider_pk_hex.clone(),
            staking_value: record.staking_value,
            timelock: record.timelock,
            state: DisplayState::Intermediate(record.state),
            pending_action: None,
            origin: RowOrigin::Intermediate,
        }
    }

    fn from_pending(record: &PendingDelegation) -> Self {
        DelegationRow {
            staking_tx_hash_hex: record.staking_tx_hash_hex.clone(),
            finality_provider_pk_hex: record.finality_provider_pk_hex.clone(),
            staking_value: record.staking_value,
            timelock: record.timelock,
            state: DisplayState::Pending,
            pending_action: None,
            origin: RowOrigin::Pending,
        }
    }
}

/// Keeps the first record of every staking tx hash
fn dedup_by_id<T: LocalRecord + Clone>(records: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.staking_tx_hash_hex().to_string()))
        .cloned()
        .collect()
}

fn remote_ids(remote: &[Delegation]) -> HashSet<&str> {
    remote
        .iter()
        .map(|delegation| delegation.staking_tx_hash_hex.as_str())
        .collect()
}

/// Ids reported in a state superseding the local action by at least one API entry
fn superseded_ids(remote: &[Delegation]) -> HashSet<&str> {
    remote
        .iter()
        .filter(|delegation| delegation.state.supersedes_intermediate())
        .map(|delegation| delegation.staking_tx_hash_hex.as_str())
        .collect()
}

/// Whether two record lists hold the same set of staking tx hashes
fn same_ids<T: LocalRecord>(a: &[T], b: &[T]) -> bool {
    let mut a_ids: Vec<&str> = a.iter().map(|r| r.staking_tx_hash_hex()).collect();
    let mut b_ids: Vec<&str> = b.iter().map(|r| r.staking_tx_hash_hex()).collect();
    a_ids.sort_unstable();
    b_ids.sort_unstable();
    a_ids == b_ids
}

/// prune_intermediate drops the intermediate records the API has caught up with, i.e. whose
/// delegation is reported as unbonding requested or withdrawn.
/// Only the newest record of a staking tx hash is kept.
pub fn prune_intermediate(
    intermediates: &[IntermediateDelegation],
    remote: &[Delegation],
) -> Vec<IntermediateDelegation> {
    let superseded = superseded_ids(remote);
    dedup_by_id(intermediates)
        .into_iter()
        .filter(|record| !superseded.contains(record.staking_tx_hash_hex.as_str()))
        .collect()
}

/// PendingDiff is the outcome of pruning the pending stakes
#[derive(Clone, Debug, PartialEq)]
pub struct PendingDiff {
    /// changed is set when the pruned set differs from the cached one, so it needs to be
    /// persisted
    pub changed: bool,
    pub delegations: Vec<PendingDelegation>,
}

/// prune_pending drops the pending stakes the API reports, in any state
pub fn prune_pending(pending: &[PendingDelegation], remote: &[Delegation]) -> PendingDiff {
    let known = remote_ids(remote);
    let valid: Vec<PendingDelegation> = dedup_by_id(pending)
        .into_iter()
        .filter(|record| !known.contains(record.staking_tx_hash_hex.as_str()))
        .collect();

    if same_ids(&valid, pending) {
        PendingDiff {
            changed: false,
            delegations: pending.to_vec(),
        }
    } else {
        PendingDiff {
            changed: true,
            delegations: valid,
        }
    }
}

/// merge_for_display builds the visible collection: pending stakes first, then intermediate
/// records the API does not report, then the API delegations in server order.
/// Every staking tx hash appears at most once.
pub fn merge_for_display(
    remote: &[Delegation],
    intermediates: &[IntermediateDelegation],
    pending: &[PendingDelegation],
) -> Vec<DelegationRow> {
    let known = remote_ids(remote);
    let mut badges: HashMap<&str, IntermediateState> = HashMap::new();
    for record in intermediates {
        badges
            .entry(record.staking_tx_hash_hex.as_str())
            .or_insert(record.state);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut rows = Vec::with_capacity(pending.len() + intermediates.len() + remote.len());

    for record in pending {
        let id = record.staking_tx_hash_hex.as_str();
        if !known.contains(id) && seen.insert(id) {
            rows.push(DelegationRow::from_pending(record));
        }
    }
    for record in intermediates {
        let id = record.staking_tx_hash_hex.as_str();
        if !known.contains(id) && seen.insert(id) {
            rows.push(DelegationRow::from_intermediate(record));
        }
    }
    for delegation in remote {
        let id = delegation.staking_tx_hash_hex.as_str();
        if seen.insert(id) {
            rows.push(DelegationRow::from_remote(
                delegation,
                badges.get(id).copied(),
            ));
        }
    }
    rows
}

/// Reconciled is the outcome of a reconciliation pass
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub intermediates: Vec<IntermediateDelegation>,
    pub intermediates_changed: bool,
    pub pending: Vec<PendingDelegation>,
    pub pending_changed: bool,
    pub rows: Vec<DelegationRow>,
}

/// reconcile prunes both local caches against the API delegations and merges the result
/// into the visible collection. Reconciling its own output changes nothing.
pub fn reconcile(
    remote: &[Delegation],
    intermediates: &[IntermediateDelegation],
    pending: &[PendingDelegation],
) -> Reconciled {
    let pruned_intermediates = prune_intermediate(intermediates, remote);
    let intermediates_changed = pruned_intermediates != intermediates;
    let pending = prune_pending(pending, remote);
    let rows = merge_for_display(remote, &pruned_intermediates, &pending.delegations);

    Reconciled {
        intermediates: pruned_intermediates,
        intermediates_changed,
        pending: pending.delegations,
        pending_changed: pending.changed,
        rows,
    }
}
