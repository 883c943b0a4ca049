use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),
    #[error("Failed to decode Btc tx: {0}")]
    InvalidBtcTx(String),
    #[error("Failed to parse public key: {0}")]
    FailedToParsePublicKey(String),
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
    #[error("No op_return data in this Btc tx")]
    MissingOpReturn,
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidHex(e.to_string())
    }
}
