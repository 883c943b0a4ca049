use std::fmt;

use cosmwasm_std::StdError;
use thiserror::Error;

use babylon_apis::error::{BroadcastError, SignerError, SourceError, StakingApiError};
use babylon_btcstaking::error::Error as StakingError;

#[derive(Error, Debug, PartialEq)]
pub enum LifecycleError {
    #[error("{0}")]
    StdError(#[from] StdError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Delegation {0} is not eligible for unbonding")]
    NotEligible(String),
    #[error("Fee of {fee} satoshis is not lower than the spent output value of {value} satoshis")]
    InsufficientValue { value: u64, fee: u64 },
    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),
    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
    #[error("Remote source error: {0}")]
    Source(#[from] SourceError),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("No wallet is connected")]
    NotConnected,
    #[error("Delegation not found: {0}")]
    DelegationNotFound(String),
    #[error("No params version is active at BTC height {0}")]
    NoActiveParams(u64),
}

impl LifecycleError {
    /// is_retryable returns whether the same request may succeed when issued again,
    /// possibly after user intervention. Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::Signer(_) | LifecycleError::Broadcast(_) | LifecycleError::Source(_)
        )
    }
}

impl From<StakingError> for LifecycleError {
    fn from(err: StakingError) -> Self {
        match err {
            StakingError::InsufficientValue { value, fee } => {
                LifecycleError::InsufficientValue { value, fee }
            }
            other => LifecycleError::InvalidInput(other.to_string()),
        }
    }
}

impl From<StakingApiError> for LifecycleError {
    fn from(err: StakingApiError) -> Self {
        LifecycleError::InvalidInput(err.to_string())
    }
}

impl From<babylon_bitcoin::error::Error> for LifecycleError {
    fn from(err: babylon_bitcoin::error::Error) -> Self {
        LifecycleError::InvalidInput(err.to_string())
    }
}

/// ActionStage is the step of an unbonding or withdrawal pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionStage {
    Lookup,
    Eligibility,
    Construction,
    Signing,
    Submission,
    Persistence,
}

impl ActionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStage::Lookup => "lookup",
            ActionStage::Eligibility => "eligibility",
            ActionStage::Construction => "construction",
            ActionStage::Signing => "signing",
            ActionStage::Submission => "submission",
            ActionStage::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ActionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ActionError is a failed user action, tagged with the stage that failed.
/// Stages after the failing one did not run.
#[derive(Error, Debug, PartialEq)]
#[error("{stage} failed: {error}")]
pub struct ActionError {
    pub stage: ActionStage,
    #[source]
    pub error: LifecycleError,
}

impl ActionError {
    pub fn new(stage: ActionStage, error: impl Into<LifecycleError>) -> Self {
        ActionError {
            stage,
            error: error.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Tags the error of a pipeline step with its stage
pub(crate) trait AtStage<T> {
    fn at(self, stage: ActionStage) -> Result<T, ActionError>;
}

impl<T, E: Into<LifecycleError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: ActionStage) -> Result<T, ActionError> {
        self.map_err(|e| ActionError::new(stage, e))
    }
}
