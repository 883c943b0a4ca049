use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::StakingApiError;

/// Length in bytes of the protocol tag
pub const TAG_LEN: usize = 4;

/// ProtocolParams is one version of the global staking parameters.
/// A version becomes active at its activation height and stays active until the next
/// version activates.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ProtocolParams {
    pub version: u32,
    pub activation_height: u64,
    /// staking_cap_sat is the maximum active TVL, in satoshis
    pub staking_cap_sat: u64,
    /// tag is the protocol magic bytes, either hex encoded or as ASCII characters
    pub tag: String,
    /// covenant_pks are the x-only covenant committee keys in hex
    pub covenant_pks: Vec<String>,
    pub covenant_quorum: u32,
    /// unbonding_time is the unbonding time-lock in BTC blocks
    pub unbonding_time: u32,
    pub unbonding_fee_sat: u64,
    pub max_staking_amount_sat: u64,
    pub min_staking_amount_sat: u64,
    pub max_staking_time: u32,
    pub min_staking_time: u32,
    pub confirmation_depth: u64,
}

impl ProtocolParams {
    /// tag_bytes decodes the tag, given as 8 hex characters or as 4 ASCII characters
    pub fn tag_bytes(&self) -> Result<Vec<u8>, StakingApiError> {
        if self.tag.len() == TAG_LEN && self.tag.is_ascii() {
            return Ok(self.tag.as_bytes().to_vec());
        }
        let tag = hex::decode(&self.tag)?;
        if tag.len() != TAG_LEN {
            return Err(StakingApiError::InvalidTagLength(TAG_LEN, tag.len()));
        }
        Ok(tag)
    }

    pub fn covenant_keys(&self) -> Result<Vec<Vec<u8>>, StakingApiError> {
        self.covenant_pks
            .iter()
            .map(|pk| hex::decode(pk).map_err(|_| StakingApiError::InvalidCovenantPk(pk.clone())))
            .collect()
    }

    /// unbonding_time_u16 returns the unbonding time as used in scripts
    pub fn unbonding_time_u16(&self) -> Result<u16, StakingApiError> {
        u16::try_from(self.unbonding_time).map_err(|_| {
            StakingApiError::ErrInvalidUnbondingTime(self.unbonding_time, u16::MAX as u32)
        })
    }
}

/// ParamsWithContext is the params version active at a height, together with what
/// comes next
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParamsWithContext {
    pub current_version: Option<ProtocolParams>,
    pub next_version: Option<ProtocolParams>,
    /// is_approaching_next_version is set when the next version activates within its
    /// confirmation depth from the height
    pub is_approaching_next_version: bool,
    pub first_activation_height: u64,
}

/// current_params_version selects the params version active at `height`, i.e. the one
/// with the highest activation height not above `height`.
/// Versions may be given in any order.
pub fn current_params_version(height: u64, versions: &[ProtocolParams]) -> ParamsWithContext {
    let mut sorted: Vec<&ProtocolParams> = versions.iter().collect();
    sorted.sort_by_key(|params| params.activation_height);

    let first_activation_height = sorted
        .first()
        .map(|params| params.activation_height)
        .unwrap_or_default();

    let active = sorted
        .iter()
        .rposition(|params| params.activation_height <= height);
    let Some(idx) = active else {
        return ParamsWithContext {
            first_activation_height,
            ..Default::default()
        };
    };

    let next_version = sorted.get(idx + 1).map(|params| (*params).clone());
    let is_approaching_next_version = next_version.as_ref().is_some_and(|next| {
        height.saturating_add(next.confirmation_depth) >= next.activation_height
    });

    ParamsWithContext {
        current_version: Some(sorted[idx].clone()),
        next_version,
        is_approaching_next_version,
        first_activation_height,
    }
}

/// is_over_the_cap returns whether the active TVL reached the staking cap of `params`
pub fn is_over_the_cap(params: &ProtocolParams, active_tvl_sat: u64) -> bool {
    params.staking_cap_sat <= active_tvl_sat
}
