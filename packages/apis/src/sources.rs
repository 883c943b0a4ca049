//! Remote collaborators of the delegation engine.
//! Transports live outside of this workspace; the engine only sees these traits.
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::btc_staking_api::DelegationsPage;
use crate::error::{BroadcastError, SignerError, SourceError};
use crate::params::ProtocolParams;

/// Signer signs an unsigned psbt and returns the finalized, signed tx
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, unsigned_psbt_hex: &str) -> Result<String, SignerError>;
}

/// Broadcaster pushes a signed tx to the Bitcoin network, returning its txid
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn push(&self, signed_tx_hex: &str) -> Result<String, BroadcastError>;
}

#[async_trait]
pub trait ParamsSource: Send + Sync {
    async fn fetch_versions(&self) -> Result<Vec<ProtocolParams>, SourceError>;
}

#[async_trait]
pub trait ChainTipSource: Send + Sync {
    /// tip_height returns the height of the current BTC tip
    async fn tip_height(&self) -> Result<u64, SourceError>;
}

#[async_trait]
pub trait DelegationSource: Send + Sync {
    /// fetch_page returns one page of the owner's delegations, starting at `page_key`
    async fn fetch_page(
        &self,
        owner_pk_hex: &str,
        page_key: Option<&str>,
    ) -> Result<DelegationsPage, SourceError>;
}

#[async_trait]
pub trait EligibilitySource: Send + Sync {
    async fn fetch_eligible(&self, staking_tx_hash_hex: &str) -> Result<bool, SourceError>;
}

/// UnbondingRequest is the payload of an on-demand unbonding submission
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct UnbondingRequest {
    pub staker_signed_signature_hex: String,
    pub staking_tx_hash_hex: String,
    pub unbonding_tx_hash_hex: String,
    pub unbonding_tx_hex: String,
}

/// UnbondingSubmission hands the staker-signed unbonding tx over to the covenant
/// committee, which co-signs and broadcasts it
#[async_trait]
pub trait UnbondingSubmission: Send + Sync {
    async fn submit(&self, request: &UnbondingRequest) -> Result<(), SourceError>;
}
