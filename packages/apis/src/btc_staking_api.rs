/// Delegation records of the staking API
/// The remote types follow the JSON served by the staking API, the local records are the
/// owner-scoped entries kept by the delegation engine until the API catches up with them
use std::fmt;

use cosmwasm_schema::cw_serde;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use babylon_bitcoin::{tx_from_hex, Transaction};

use crate::error::StakingApiError;

/// Hash size in bytes
pub const HASH_SIZE: usize = 32;

/// DelegationState is the lifecycle state of a delegation as reported by the staking API
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DelegationState {
    Active,
    UnbondingRequested,
    Unbonding,
    Unbonded,
    Withdrawn,
    Pending,
    Overflow,
    Expired,
}

impl DelegationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationState::Active => "active",
            DelegationState::UnbondingRequested => "unbonding_requested",
            DelegationState::Unbonding => "unbonding",
            DelegationState::Unbonded => "unbonded",
            DelegationState::Withdrawn => "withdrawn",
            DelegationState::Pending => "pending",
            DelegationState::Overflow => "overflow",
            DelegationState::Expired => "expired",
        }
    }

    /// supersedes_intermediate returns whether the API has caught up with a local
    /// intermediate record, so the record is no longer needed
    pub fn supersedes_intermediate(&self) -> bool {
        matches!(
            self,
            DelegationState::UnbondingRequested | DelegationState::Withdrawn
        )
    }
}

impl fmt::Display for DelegationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct StakingTx {
    /// tx_hex is the consensus-encoded staking tx in hex
    pub tx_hex: String,
    /// output_index is the index of the staking output
    pub output_index: u32,
    pub start_timestamp: String,
    /// start_height is the BTC height the staking tx was included at
    pub start_height: u64,
    /// timelock is the staking time in BTC blocks
    pub timelock: u16,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct UnbondingTx {
    pub tx_hex: String,
    pub output_index: u32,
}

/// Delegation is a BTC delegation as served by the staking API.
/// Its identity is the staking tx hash.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Delegation {
    pub staking_tx_hash_hex: String,
    /// staker_pk_hex is the x-only BTC PK of the staker in hex
    pub staker_pk_hex: String,
    /// finality_provider_pk_hex is the x-only BTC PK of the finality provider in hex
    pub finality_provider_pk_hex: String,
    pub state: DelegationState,
    /// staking_value is the staked amount in satoshis
    pub staking_value: u64,
    pub staking_tx: StakingTx,
    /// unbonding_tx is set once the delegation has been unbonded on demand
    pub unbonding_tx: Option<UnbondingTx>,
    #[serde(default)]
    pub is_overflow: bool,
}

impl Delegation {
    pub fn is_active(&self) -> bool {
        self.state == DelegationState::Active
    }

    /// decoded_staking_tx decodes the staking tx carried by the delegation
    pub fn decoded_staking_tx(&self) -> Result<Transaction, StakingApiError> {
        tx_from_hex(&self.staking_tx.tx_hex)
            .map_err(|e| StakingApiError::InvalidBtcTx(e.to_string()))
    }

    /// decoded_unbonding_tx decodes the unbonding tx, if the delegation has one
    pub fn decoded_unbonding_tx(&self) -> Result<Option<(Transaction, u32)>, StakingApiError> {
        self.unbonding_tx
            .as_ref()
            .map(|unbonding| {
                tx_from_hex(&unbonding.tx_hex)
                    .map(|tx| (tx, unbonding.output_index))
                    .map_err(|e| StakingApiError::InvalidBtcTx(e.to_string()))
            })
            .transpose()
    }
}

/// DelegationsPage is one page of an owner's delegations.
/// An empty `next_key` marks the last page.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct DelegationsPage {
    pub delegations: Vec<Delegation>,
    #[serde(default)]
    pub next_key: String,
}

/// IntermediateState is the state a delegation is assumed to be in right after a local
/// action was accepted, until the API reports it
#[cw_serde]
#[derive(Copy, Eq, Hash)]
pub enum IntermediateState {
    IntermediateUnbonding,
    IntermediateWithdrawal,
}

impl IntermediateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntermediateState::IntermediateUnbonding => "intermediate_unbonding",
            IntermediateState::IntermediateWithdrawal => "intermediate_withdrawal",
        }
    }
}

impl fmt::Display for IntermediateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IntermediateDelegation is a locally cached, speculative record of an unbonding or
/// withdrawal that was submitted but not yet observed through the API
#[cw_serde]
pub struct IntermediateDelegation {
    /// staking_tx_hash_hex identifies the delegation the action was taken on
    pub staking_tx_hash_hex: String,
    /// staker_pk_hex is the owner of the record
    pub staker_pk_hex: String,
    pub finality_provider_pk_hex: String,
    pub staking_value: u64,
    pub staking_tx_hex: String,
    pub timelock: u16,
    pub state: IntermediateState,
}

impl IntermediateDelegation {
    pub fn from_delegation(delegation: &Delegation, state: IntermediateState) -> Self {
        IntermediateDelegation {
            staking_tx_hash_hex: delegation.staking_tx_hash_hex.clone(),
            staker_pk_hex: delegation.staker_pk_hex.clone(),
            finality_provider_pk_hex: delegation.finality_provider_pk_hex.clone(),
            staking_value: delegation.staking_value,
            staking_tx_hex: delegation.staking_tx.tx_hex.clone(),
            timelock: delegation.staking_tx.timelock,
            state,
        }
    }
}

/// PendingDelegation is a freshly broadcast staking delegation the API has not indexed yet
#[cw_serde]
pub struct PendingDelegation {
    pub staking_tx_hash_hex: String,
    pub staker_pk_hex: String,
    pub finality_provider_pk_hex: String,
    pub staking_value: u64,
    pub staking_tx_hex: String,
    pub timelock: u16,
    /// start_timestamp is the local time the staking tx was broadcast at
    pub start_timestamp: String,
}

/// LocalRecord is implemented by the records of the owner-scoped local stores
pub trait LocalRecord {
    fn staking_tx_hash_hex(&self) -> &str;
}

impl LocalRecord for IntermediateDelegation {
    fn staking_tx_hash_hex(&self) -> &str {
        &self.staking_tx_hash_hex
    }
}

impl LocalRecord for PendingDelegation {
    fn staking_tx_hash_hex(&self) -> &str {
        &self.staking_tx_hash_hex
    }
}
