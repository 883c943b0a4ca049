use hex::FromHexError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StakingApiError {
    #[error("{0}")]
    HexError(#[from] FromHexError),
    #[error("Staking tx hash hex string is not {0} chars long")]
    InvalidStakingTxHash(usize),
    #[error("Invalid Btc tx: {0}")]
    InvalidBtcTx(String),
    #[error("Empty Btc public key")]
    EmptyBtcPk,
    #[error("Empty finality provider public key")]
    EmptyFinalityProviderPk,
    #[error("Empty Staking tx")]
    EmptyStakingTx,
    #[error("Empty Unbonding tx")]
    EmptyUnbondingTx,
    #[error("Staking timelock must be larger than 0")]
    ZeroTimelock,
    #[error("Invalid unbonding time blocks: {0}, max: {1}")]
    ErrInvalidUnbondingTime(u32, u32),
    #[error("Empty covenant public key list")]
    EmptyCovenantPks,
    #[error("Invalid covenant public key: {0}")]
    InvalidCovenantPk(String),
    #[error("Invalid covenant quorum {quorum} for {keys} covenant keys")]
    InvalidCovenantQuorum { quorum: u32, keys: usize },
    #[error("Invalid staking time range: min {min} > max {max}")]
    InvalidStakingTimeRange { min: u32, max: u32 },
    #[error("Invalid staking amount range: min {min} > max {max}")]
    InvalidStakingAmountRange { min: u64, max: u64 },
    #[error("Invalid tag length: expected {0} bytes, got {1}")]
    InvalidTagLength(usize, usize),
}

/// SignerError is returned by the wallet when asked to sign
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("User rejected the request")]
    UserRejected,
    #[error("Wallet is not connected")]
    WalletDisconnected,
    #[error("Wallet is not installed: {0}")]
    NotInstalled(String),
    #[error("Wallet error: {0}")]
    Other(String),
}

/// BroadcastError is returned when a signed tx cannot be pushed to the network
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("Network rejected the transaction: {0}")]
    NetworkRejected(String),
}

/// SourceError is returned by the remote data sources
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Remote source unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid response from remote source: {0}")]
    InvalidResponse(String),
    #[error("Request rejected by remote source: {0}")]
    Rejected(String),
}
