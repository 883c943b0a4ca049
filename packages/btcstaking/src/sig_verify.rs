use crate::error::Error;
use crate::Result;
use bitcoin::hashes::Hash;
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::{Script, TapSighashType, Transaction, TxOut, XOnlyPublicKey};
use k256::schnorr::Signature as SchnorrSignature;
use k256::schnorr::VerifyingKey;

const SCHNORR_SIG_LEN: usize = 64;

fn calc_sighash(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    sighash_type: TapSighashType,
) -> Result<[u8; 32]> {
    // Check for incorrect input count
    if transaction.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, transaction.input.len()));
    }

    // calculate tap leaf hash for the given path of the script
    let tap_leaf_hash = path_script.tapscript_leaf_hash();

    // calculate the sig hash of the tx with the given funding output
    let mut sighash_cache = SighashCache::new(transaction);
    let sighash = sighash_cache
        .taproot_script_spend_signature_hash(
            0,
            &Prevouts::All(&[funding_output]),
            tap_leaf_hash,
            sighash_type,
        )
        .map_err(|e| Error::SighashFailed(e.to_string()))?;

    Ok(sighash.to_raw_hash().to_byte_array())
}

/// verify_transaction_sig_with_output verifies the validity of a Schnorr signature for a given
/// transaction. A 65 bytes signature carries its sighash type in the last byte.
pub fn verify_transaction_sig_with_output(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    pub_key: &XOnlyPublicKey,
    signature: &[u8],
) -> Result<()> {
    let (sig_bytes, sighash_type) = match signature.len() {
        SCHNORR_SIG_LEN => (signature, TapSighashType::Default),
        len if len == SCHNORR_SIG_LEN + 1 => (
            &signature[..SCHNORR_SIG_LEN],
            TapSighashType::from_consensus_u8(signature[SCHNORR_SIG_LEN])
                .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))?,
        ),
        len => {
            return Err(Error::InvalidSchnorrSignature(format!(
                "unexpected signature length {len}"
            )))
        }
    };
    let signature = SchnorrSignature::try_from(sig_bytes)
        .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))?;

    // calculate the sig hash of the tx for the given spending path
    let sighash = calc_sighash(transaction, funding_output, path_script, sighash_type)?;
    // verify the signature w.r.t. the signature, the sig hash, and the public key.
    // The sig hash is signed as is, without hashing it again.
    let verifying_key = VerifyingKey::from_bytes(&pub_key.serialize())
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))?;
    verifying_key
        .verify_raw(&sighash, &signature)
        .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))
}

/// staker_signature extracts the staker's signature from a tx signed by the staker's wallet,
/// i.e. the first witness element of its only input
pub fn staker_signature(signed_tx: &Transaction) -> Result<Vec<u8>> {
    if signed_tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, signed_tx.input.len()));
    }
    signed_tx.input[0]
        .witness
        .nth(0)
        .map(|sig| sig.to_vec())
        .ok_or(Error::EmptyWitness {})
}
