use bitcoin::taproot::TaprootSpendInfo;
use bitcoin::{ScriptBuf, Transaction, XOnlyPublicKey};

use babylon_bitcoin::op_return::extract_op_return_data;

use crate::error::Error;
use crate::scripts_utils::{
    aggregate_scripts, build_data_embed_script, build_multisig_script,
    build_single_key_sig_script, build_taproot_tree, build_time_lock_script, has_duplicate_keys,
    staking_data_payload, taproot_output_script,
};
use crate::Result;

/// Length in bytes of the protocol tag (magic bytes)
pub const TAG_LEN: usize = 4;
/// Length in bytes of a BIP-340 public key
pub const PK_LEN: usize = 32;

/// parse_x_only_pk parses a 32 bytes BIP-340 public key
pub fn parse_x_only_pk(bytes: &[u8]) -> Result<XOnlyPublicKey> {
    if bytes.len() != PK_LEN {
        return Err(Error::InvalidPublicKeyLength(bytes.len()));
    }
    XOnlyPublicKey::from_slice(bytes).map_err(|e| Error::FailedToParsePublicKey(e.to_string()))
}

/// StakingScriptData holds every input the staking scripts are derived from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakingScriptData {
    pub staker_key: XOnlyPublicKey,
    pub fp_keys: Vec<XOnlyPublicKey>,
    pub covenant_keys: Vec<XOnlyPublicKey>,
    pub covenant_quorum: u32,
    pub staking_time: u16,
    pub unbonding_time: u16,
    pub tag: Vec<u8>,
}

impl StakingScriptData {
    /// Parses and validates raw script inputs
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        staker_key: &[u8],
        fp_keys: &[Vec<u8>],
        covenant_keys: &[Vec<u8>],
        covenant_quorum: u32,
        staking_time: u16,
        unbonding_time: u16,
        tag: &[u8],
    ) -> Result<Self> {
        let data = StakingScriptData {
            staker_key: parse_x_only_pk(staker_key)?,
            fp_keys: fp_keys
                .iter()
                .map(|pk| parse_x_only_pk(pk))
                .collect::<Result<Vec<_>>>()?,
            covenant_keys: covenant_keys
                .iter()
                .map(|pk| parse_x_only_pk(pk))
                .collect::<Result<Vec<_>>>()?,
            covenant_quorum,
            staking_time,
            unbonding_time,
            tag: tag.to_vec(),
        };
        data.validate()?;
        Ok(data)
    }

    /// validate checks the structural soundness of the inputs, the same checks the
    /// staking transaction was subject to when it was created
    pub fn validate(&self) -> Result<()> {
        if self.fp_keys.is_empty() || self.covenant_keys.is_empty() {
            return Err(Error::InsufficientMultisigKeys {});
        }

        let all_keys: Vec<XOnlyPublicKey> = std::iter::once(self.staker_key)
            .chain(self.fp_keys.iter().copied())
            .chain(self.covenant_keys.iter().copied())
            .collect();
        if has_duplicate_keys(&all_keys) {
            return Err(Error::DuplicateKeys {});
        }

        if self.covenant_quorum == 0 {
            return Err(Error::ZeroQuorum {});
        }
        if self.covenant_quorum as usize > self.covenant_keys.len() {
            return Err(Error::QuorumExceedsKeyCount {});
        }

        if self.staking_time == 0 {
            return Err(Error::InvalidStakingTime(self.staking_time));
        }
        if self.unbonding_time == 0 {
            return Err(Error::InvalidUnbondingTime(self.unbonding_time));
        }

        if self.tag.len() != TAG_LEN {
            return Err(Error::InvalidTagLength(TAG_LEN, self.tag.len()));
        }

        Ok(())
    }

    /// build_scripts derives every staking script path
    pub fn build_scripts(&self) -> Result<StakingScripts> {
        self.validate()?;

        let timelock_script = build_time_lock_script(&self.staker_key, self.staking_time)?;
        let unbonding_timelock_script =
            build_time_lock_script(&self.staker_key, self.unbonding_time)?;

        let covenant_multisig_script =
            build_multisig_script(&self.covenant_keys, self.covenant_quorum as usize, false)?;
        let staker_sig_script = build_single_key_sig_script(&self.staker_key, true)?;
        let fp_script = build_multisig_script(&self.fp_keys, 1, true)?;

        let unbonding_script =
            aggregate_scripts(&[staker_sig_script.clone(), covenant_multisig_script.clone()]);
        let slashing_script =
            aggregate_scripts(&[staker_sig_script, fp_script, covenant_multisig_script]);

        let data_embed_script = build_data_embed_script(
            &self.tag,
            &self.staker_key,
            &self.fp_keys[0],
            self.staking_time,
        )?;

        Ok(StakingScripts {
            timelock_script,
            unbonding_script,
            slashing_script,
            unbonding_timelock_script,
            data_embed_script,
            staking_time: self.staking_time,
            unbonding_time: self.unbonding_time,
            data_embed_payload: staking_data_payload(
                &self.tag,
                &self.staker_key,
                &self.fp_keys[0],
                self.staking_time,
            ),
        })
    }
}

/// StakingScripts holds all paths of a staking output and of its unbonding output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakingScripts {
    // <Staker_PK> OP_CHECKSIGVERIFY <Staking_Time_Blocks> OP_CHECKSEQUENCEVERIFY
    pub timelock_script: ScriptBuf,
    // <Staker_PK> OP_CHECKSIGVERIFY
    // <Covenant_PK1> OP_CHECKSIG ... <Covenant_PKN> OP_CHECKSIGADD M OP_NUMEQUAL
    pub unbonding_script: ScriptBuf,
    // <Staker_PK> OP_CHECKSIGVERIFY
    // <FP_PK> OP_CHECKSIGVERIFY
    // <Covenant_PK1> OP_CHECKSIG ... <Covenant_PKN> OP_CHECKSIGADD M OP_NUMEQUAL
    pub slashing_script: ScriptBuf,
    // <Staker_PK> OP_CHECKSIGVERIFY <Unbonding_Time_Blocks> OP_CHECKSEQUENCEVERIFY
    pub unbonding_timelock_script: ScriptBuf,
    // OP_RETURN <Tag || Version || Staker_PK || FP_PK || Staking_Time>
    pub data_embed_script: ScriptBuf,
    pub staking_time: u16,
    pub unbonding_time: u16,
    data_embed_payload: Vec<u8>,
}

impl StakingScripts {
    /// Taproot tree of the staking output: [slashing, [unbonding, timelock]]
    pub fn staking_spend_info(&self) -> Result<TaprootSpendInfo> {
        build_taproot_tree(&[
            (1, &self.slashing_script),
            (2, &self.unbonding_script),
            (2, &self.timelock_script),
        ])
    }

    /// Taproot tree of the unbonding output: [slashing, unbonding_timelock]
    pub fn unbonding_spend_info(&self) -> Result<TaprootSpendInfo> {
        build_taproot_tree(&[
            (1, &self.slashing_script),
            (1, &self.unbonding_timelock_script),
        ])
    }

    pub fn staking_output_script(&self) -> Result<ScriptBuf> {
        Ok(taproot_output_script(&self.staking_spend_info()?))
    }

    pub fn unbonding_output_script(&self) -> Result<ScriptBuf> {
        Ok(taproot_output_script(&self.unbonding_spend_info()?))
    }

    /// verify_staking_tx checks that the reconstructed scripts commit to the given staking
    /// output, and that the staking data carried by the tx, if any, matches as well
    pub fn verify_staking_tx(&self, staking_tx: &Transaction, output_index: u32) -> Result<()> {
        let output = staking_tx
            .output
            .get(output_index as usize)
            .ok_or(Error::InvalidOutputIndex(output_index, staking_tx.output.len()))?;
        if output.script_pubkey != self.staking_output_script()? {
            return Err(Error::ScriptMismatch("staking".to_string()));
        }

        if let Ok(payload) = extract_op_return_data(staking_tx) {
            if payload != self.data_embed_payload {
                return Err(Error::ScriptMismatch("data embed".to_string()));
            }
        }
        Ok(())
    }

    /// verify_unbonding_tx checks that the reconstructed scripts commit to the given
    /// unbonding output
    pub fn verify_unbonding_tx(&self, unbonding_tx: &Transaction, output_index: u32) -> Result<()> {
        let output = unbonding_tx
            .output
            .get(output_index as usize)
            .ok_or(Error::InvalidOutputIndex(output_index, unbonding_tx.output.len()))?;
        if output.script_pubkey != self.unbonding_output_script()? {
            return Err(Error::ScriptMismatch("unbonding".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn x_only(seed: u8) -> Vec<u8> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
        let (pk, _) = PublicKey::from_secret_key(&secp, &sk).x_only_public_key();
        pk.serialize().to_vec()
    }

    fn script_data(quorum: u32) -> Result<StakingScriptData> {
        StakingScriptData::new(
            &x_only(1),
            &[x_only(2)],
            &[x_only(3), x_only(4), x_only(5)],
            quorum,
            150,
            101,
            &[0x01, 0x02, 0x03, 0x04],
        )
    }

    #[test]
    fn build_scripts_is_deterministic() {
        let first = script_data(2).unwrap().build_scripts().unwrap();
        let second = script_data(2).unwrap().build_scripts().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.staking_output_script().unwrap(),
            second.staking_output_script().unwrap()
        );
    }

    #[test]
    fn scripts_share_the_staker_prefix() {
        let scripts = script_data(2).unwrap().build_scripts().unwrap();
        let staker_prefix = &scripts.timelock_script.as_bytes()[..34];
        assert!(scripts.unbonding_script.as_bytes().starts_with(staker_prefix));
        assert!(scripts.slashing_script.as_bytes().starts_with(staker_prefix));
        // slashing = staker || fp || covenants, unbonding = staker || covenants
        assert_eq!(
            scripts.slashing_script.len(),
            scripts.unbonding_script.len() + 34
        );
        assert!(scripts
            .slashing_script
            .as_bytes()
            .ends_with(&scripts.unbonding_script.as_bytes()[34..]));
        assert_ne!(
            scripts.timelock_script,
            scripts.unbonding_timelock_script
        );
    }

    #[test]
    fn quorum_above_key_count_is_rejected() {
        assert_eq!(script_data(4), Err(Error::QuorumExceedsKeyCount {}));
        assert_eq!(script_data(0), Err(Error::ZeroQuorum {}));
    }

    #[test]
    fn bad_inputs_are_rejected() {
        let short_key = vec![1u8; 31];
        assert_eq!(
            StakingScriptData::new(&short_key, &[x_only(2)], &[x_only(3)], 1, 150, 101, b"abcd"),
            Err(Error::InvalidPublicKeyLength(31))
        );
        assert_eq!(
            StakingScriptData::new(&x_only(1), &[x_only(1)], &[x_only(3)], 1, 150, 101, b"abcd"),
            Err(Error::DuplicateKeys {})
        );
        assert_eq!(
            StakingScriptData::new(&x_only(1), &[x_only(2)], &[x_only(3)], 1, 0, 101, b"abcd"),
            Err(Error::InvalidStakingTime(0))
        );
        assert_eq!(
            StakingScriptData::new(&x_only(1), &[x_only(2)], &[x_only(3)], 1, 150, 0, b"abcd"),
            Err(Error::InvalidUnbondingTime(0))
        );
        assert_eq!(
            StakingScriptData::new(&x_only(1), &[x_only(2)], &[x_only(3)], 1, 150, 101, b"abc"),
            Err(Error::InvalidTagLength(4, 3))
        );
    }

    #[test]
    fn different_timelocks_change_the_staking_output() {
        let a = script_data(2).unwrap();
        let mut b = a.clone();
        b.staking_time = 151;
        assert_ne!(
            a.build_scripts().unwrap().staking_output_script().unwrap(),
            b.build_scripts().unwrap().staking_output_script().unwrap()
        );
    }
}
