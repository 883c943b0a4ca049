pub use bitcoin::{
    consensus::encode::Error as EncodeError,
    consensus::{deserialize, serialize},
    psbt::Psbt,
    Address, Amount, OutPoint, ScriptBuf, Transaction, TxOut, Txid, XOnlyPublicKey,
};

pub mod chain_params;
pub mod error;
pub mod op_return;

use error::Error;

pub type Result<T> = std::result::Result<T, error::Error>;

/// Length of a BIP-340 (x-only) public key
pub const X_ONLY_PK_LEN: usize = 32;
/// Length of a compressed secp256k1 public key
pub const COMPRESSED_PK_LEN: usize = 33;

/// tx_from_hex decodes a consensus-encoded transaction from its hex form
pub fn tx_from_hex(tx_hex: &str) -> Result<Transaction> {
    let bytes = hex::decode(tx_hex)?;
    deserialize(&bytes).map_err(|e| Error::InvalidBtcTx(e.to_string()))
}

pub fn tx_to_hex(tx: &Transaction) -> String {
    hex::encode(serialize(tx))
}

/// public_key_no_coord drops the parity byte of a compressed public key, returning the
/// x-only key in hex. Keys that are already x-only are returned as they are.
pub fn public_key_no_coord(pk_hex: &str) -> Result<String> {
    let bytes = hex::decode(pk_hex)?;
    match bytes.len() {
        COMPRESSED_PK_LEN => Ok(hex::encode(&bytes[1..])),
        X_ONLY_PK_LEN => Ok(hex::encode(bytes)),
        len => Err(Error::FailedToParsePublicKey(format!(
            "expected {X_ONLY_PK_LEN} or {COMPRESSED_PK_LEN} bytes, got {len}"
        ))),
    }
}

/// x_only_pk_from_hex parses a BIP-340 public key
pub fn x_only_pk_from_hex(pk_hex: &str) -> Result<XOnlyPublicKey> {
    let bytes = hex::decode(pk_hex)?;
    XOnlyPublicKey::from_slice(&bytes).map_err(|e| Error::FailedToParsePublicKey(e.to_string()))
}
