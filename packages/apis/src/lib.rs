pub mod btc_staking_api;
pub mod error;
pub mod params;
pub mod sources;
mod validate;
pub mod wallet;

pub use btc_staking_api::{
    Delegation, DelegationState, DelegationsPage, IntermediateDelegation, IntermediateState,
    LocalRecord, PendingDelegation, StakingTx, UnbondingTx,
};
pub use params::{current_params_version, is_over_the_cap, ParamsWithContext, ProtocolParams};
pub use validate::Validate;

pub type Bytes = Vec<u8>;
