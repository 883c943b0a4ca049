pub mod error;
pub mod scripts_utils;
pub mod sig_verify;
pub mod staking_scripts;
pub mod transactions;

pub use staking_scripts::{StakingScriptData, StakingScripts};
pub use transactions::{build_unbonding_tx, build_withdrawal_tx, WithdrawalSource};

pub type Result<T> = std::result::Result<T, error::Error>;
