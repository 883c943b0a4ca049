use crate::error::Error;
use crate::Result;
use bitcoin::blockdata::opcodes::all::*;
use bitcoin::blockdata::script::Builder;
use bitcoin::key::Secp256k1;
use bitcoin::script::PushBytesBuf;
use bitcoin::secp256k1::PublicKey;
use bitcoin::taproot::{TaprootBuilder, TaprootSpendInfo};
use bitcoin::{ScriptBuf, XOnlyPublicKey};

const UNSPENDABLE_KEY: &str = "0250929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

/// Version byte of the staking data carried by the OP_RETURN output
pub const STAKING_DATA_VERSION: u8 = 0;

pub fn unspendable_key_path_internal_pub_key() -> Result<XOnlyPublicKey> {
    let key_bytes = hex::decode(UNSPENDABLE_KEY)
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))?;

    let (pk_x, _) = PublicKey::from_slice(&key_bytes)
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))?
        .x_only_public_key();
    Ok(pk_x)
}

// sort_keys sorts public keys in lexicographical order
pub fn sort_keys(keys: &mut [XOnlyPublicKey]) {
    keys.sort_by(|a, b| {
        let a_serialized = a.serialize();
        let b_serialized = b.serialize();
        a_serialized.cmp(&b_serialized)
    });
}

/// has_duplicate_keys checks whether any key appears more than once
pub fn has_duplicate_keys(keys: &[XOnlyPublicKey]) -> bool {
    let mut sorted_keys = keys.to_vec();
    sort_keys(&mut sorted_keys);
    sorted_keys.windows(2).any(|window| window[0] == window[1])
}

/// prepare_keys_for_multisig_script prepares keys for multisig, ensuring there are no duplicates
pub fn prepare_keys_for_multisig_script(keys: &[XOnlyPublicKey]) -> Result<Vec<XOnlyPublicKey>> {
    if keys.is_empty() {
        return Err(Error::InsufficientMultisigKeys {});
    }

    let mut sorted_keys = keys.to_vec();
    sort_keys(&mut sorted_keys);

    // Check for duplicates
    for window in sorted_keys.windows(2) {
        if window[0] == window[1] {
            return Err(Error::DuplicateKeys {});
        }
    }

    Ok(sorted_keys)
}

/// assemble_multisig_script assembles a multisig script
fn assemble_multisig_script(
    pubkeys: &[XOnlyPublicKey],
    quorum: usize,
    with_verify: bool,
) -> Result<ScriptBuf> {
    let mut builder = Builder::new();
    for (i, key) in pubkeys.iter().enumerate() {
        builder = builder.push_slice(key.serialize());
        if i == 0 {
            builder = builder.push_opcode(OP_CHECKSIG);
        } else {
            builder = builder.push_opcode(OP_CHECKSIGADD);
        }
    }

    builder = builder.push_int(quorum as i64);
    if with_verify {
        builder = builder.push_opcode(OP_NUMEQUALVERIFY);
    } else {
        builder = builder.push_opcode(OP_NUMEQUAL);
    }

    Ok(builder.into_script())
}

/// build_multisig_script creates a multisig script.
/// A single key degenerates into a single key signature script.
pub fn build_multisig_script(
    keys: &[XOnlyPublicKey],
    quorum: usize,
    with_verify: bool,
) -> Result<ScriptBuf> {
    if quorum == 0 {
        return Err(Error::ZeroQuorum {});
    }
    if quorum > keys.len() {
        return Err(Error::QuorumExceedsKeyCount {});
    }
    let prepared_keys = prepare_keys_for_multisig_script(keys)?;
    if prepared_keys.len() == 1 {
        return build_single_key_sig_script(&prepared_keys[0], with_verify);
    }
    assemble_multisig_script(&prepared_keys, quorum, with_verify)
}

/// build_time_lock_script creates a timelock script
pub fn build_time_lock_script(pub_key: &XOnlyPublicKey, lock_time: u16) -> Result<ScriptBuf> {
    let builder = Builder::new()
        .push_slice(pub_key.serialize())
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_int(lock_time as i64)
        .push_opcode(OP_CSV);
    let script = builder.into_script();
    Ok(script)
}

/// build_single_key_sig_script builds a single key signature script
pub fn build_single_key_sig_script(
    pub_key: &XOnlyPublicKey,
    with_verify: bool,
) -> Result<ScriptBuf> {
    let mut builder = Builder::new().push_slice(pub_key.serialize());

    if with_verify {
        builder = builder.push_opcode(OP_CHECKSIGVERIFY);
    } else {
        builder = builder.push_opcode(OP_CHECKSIG);
    }

    Ok(builder.into_script())
}

/// staking_data_payload serialises the data committed to by the OP_RETURN output:
/// tag || version || staker_pk || fp_pk || staking_time (big endian)
pub fn staking_data_payload(
    tag: &[u8],
    staker_key: &XOnlyPublicKey,
    fp_key: &XOnlyPublicKey,
    staking_time: u16,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(tag.len() + 1 + 32 + 32 + 2);
    payload.extend_from_slice(tag);
    payload.push(STAKING_DATA_VERSION);
    payload.extend_from_slice(&staker_key.serialize());
    payload.extend_from_slice(&fp_key.serialize());
    payload.extend_from_slice(&staking_time.to_be_bytes());
    payload
}

/// build_data_embed_script builds the OP_RETURN script carrying the staking data
pub fn build_data_embed_script(
    tag: &[u8],
    staker_key: &XOnlyPublicKey,
    fp_key: &XOnlyPublicKey,
    staking_time: u16,
) -> Result<ScriptBuf> {
    let payload = staking_data_payload(tag, staker_key, fp_key, staking_time);
    let mut push_bytes = PushBytesBuf::new();
    push_bytes
        .extend_from_slice(&payload)
        .map_err(|e| Error::ScriptBuildFailed(e.to_string()))?;

    Ok(Builder::new()
        .push_opcode(OP_RETURN)
        .push_slice(push_bytes)
        .into_script())
}

/// build_taproot_tree finalises a script tree with the unspendable internal key.
/// Leaves are given as `(depth, script)` pairs in depth-first order.
pub fn build_taproot_tree(leaves: &[(u8, &ScriptBuf)]) -> Result<TaprootSpendInfo> {
    let secp = Secp256k1::verification_only();
    let unspendable_key_path_key = unspendable_key_path_internal_pub_key()?;

    let mut builder = TaprootBuilder::new();
    for (depth, script) in leaves {
        builder = builder
            .add_leaf(*depth, (*script).clone())
            .map_err(|_| Error::AddLeafFailed {})?;
    }
    builder
        .finalize(&secp, unspendable_key_path_key)
        .map_err(|_| Error::FinalizeTaprootFailed {})
}

/// taproot_output_script is the P2TR pk script committing to the given tree
pub fn taproot_output_script(spend_info: &TaprootSpendInfo) -> ScriptBuf {
    ScriptBuf::new_p2tr_tweaked(spend_info.output_key())
}

pub(crate) fn aggregate_scripts(scripts: &[ScriptBuf]) -> ScriptBuf {
    let mut final_script = Vec::new();

    for script in scripts {
        final_script.extend_from_slice(script.as_bytes());
    }

    ScriptBuf::from_bytes(final_script)
}
