use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Bitcoin error: {0}")]
    BitcoinError(#[from] babylon_bitcoin::error::Error),
    #[error("Failed to parse public key: {0}")]
    FailedToParsePublicKey(String),
    #[error("Invalid public key length: expected 32 bytes, got {0}")]
    InvalidPublicKeyLength(usize),
    #[error("Cannot create a script without keys")]
    InsufficientMultisigKeys {},
    #[error("Duplicate key in list of keys")]
    DuplicateKeys {},
    #[error("Quorum cannot be greater than the number of keys")]
    QuorumExceedsKeyCount {},
    #[error("Quorum must be greater than 0")]
    ZeroQuorum {},
    #[error("Invalid staking time: {0}")]
    InvalidStakingTime(u16),
    #[error("Invalid unbonding time: {0}")]
    InvalidUnbondingTime(u16),
    #[error("Invalid tag length: expected {0} bytes, got {1}")]
    InvalidTagLength(usize, usize),
    #[error("Failed to build script: {0}")]
    ScriptBuildFailed(String),
    #[error("Failed to add leaf")]
    AddLeafFailed {},
    #[error("Failed to finalize taproot")]
    FinalizeTaprootFailed {},
    #[error("Script path not found in taproot tree")]
    ControlBlockNotFound {},
    #[error("Invalid output index {0}, tx has {1} outputs")]
    InvalidOutputIndex(u32, usize),
    #[error("Fee of {fee} satoshis is not lower than the spent output value of {value} satoshis")]
    InsufficientValue { value: u64, fee: u64 },
    #[error("Transaction fee must be larger than 0")]
    ZeroFee {},
    #[error("Reconstructed {0} output script does not match the transaction")]
    ScriptMismatch(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Psbt error: {0}")]
    PsbtError(String),
    #[error("Tx input count mismatch: expected {0}, got {1}")]
    TxInputCountMismatch(usize, usize),
    #[error("Transaction witness is empty")]
    EmptyWitness {},
    #[error("Failed to compute sighash: {0}")]
    SighashFailed(String),
    #[error("Invalid schnorr signature: {0}")]
    InvalidSchnorrSignature(String),
}
