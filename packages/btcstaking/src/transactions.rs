use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::key::Secp256k1;
use bitcoin::psbt::Psbt;
use bitcoin::taproot::{LeafVersion, TaprootSpendInfo};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};

use crate::error::Error;
use crate::staking_scripts::StakingScripts;
use crate::Result;

/// WithdrawalSource is the output a withdrawal spends from
#[derive(Clone, Copy, Debug)]
pub enum WithdrawalSource<'a> {
    /// The delegation was unbonded on demand, funds sit in the unbonding output until the
    /// unbonding time-lock expires
    EarlyUnbonded {
        unbonding_tx: &'a Transaction,
        output_index: u32,
    },
    /// The staking time-lock expired, funds are spent from the staking output directly
    TimelockExpired {
        staking_tx: &'a Transaction,
        output_index: u32,
    },
}

impl<'a> WithdrawalSource<'a> {
    /// select picks the early-unbonded path iff an unbonding tx has been recorded
    pub fn select(
        staking_tx: &'a Transaction,
        staking_output_index: u32,
        unbonding: Option<(&'a Transaction, u32)>,
    ) -> Self {
        match unbonding {
            Some((unbonding_tx, output_index)) => WithdrawalSource::EarlyUnbonded {
                unbonding_tx,
                output_index,
            },
            None => WithdrawalSource::TimelockExpired {
                staking_tx,
                output_index: staking_output_index,
            },
        }
    }

    pub fn is_early_unbonded(&self) -> bool {
        matches!(self, WithdrawalSource::EarlyUnbonded { .. })
    }
}

fn spent_output(tx: &Transaction, output_index: u32) -> Result<&TxOut> {
    tx.output
        .get(output_index as usize)
        .ok_or(Error::InvalidOutputIndex(output_index, tx.output.len()))
}

fn value_after_fee(input: &TxOut, fee: u64) -> Result<Amount> {
    if fee == 0 {
        return Err(Error::ZeroFee {});
    }
    let value = input.value.to_sat();
    if fee >= value {
        return Err(Error::InsufficientValue { value, fee });
    }
    Ok(Amount::from_sat(value - fee))
}

/// Builds a single input, single output psbt spending `input_tx:output_index` through the
/// given leaf of `spend_info`
fn build_script_path_psbt(
    input_tx: &Transaction,
    output_index: u32,
    spend_info: &TaprootSpendInfo,
    leaf_script: &ScriptBuf,
    sequence: Sequence,
    output: TxOut,
) -> Result<Psbt> {
    let prev_out = spent_output(input_tx, output_index)?.clone();
    let leaf = (leaf_script.clone(), LeafVersion::TapScript);
    let control_block = spend_info
        .control_block(&leaf)
        .ok_or(Error::ControlBlockNotFound {})?;

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(input_tx.compute_txid(), output_index),
            script_sig: ScriptBuf::new(),
            sequence,
            witness: Witness::new(),
        }],
        output: vec![output],
    };

    let mut psbt = Psbt::from_unsigned_tx(tx).map_err(|e| Error::PsbtError(e.to_string()))?;
    psbt.inputs[0].witness_utxo = Some(prev_out);
    psbt.inputs[0].tap_internal_key = Some(spend_info.internal_key());
    psbt.inputs[0].tap_merkle_root = spend_info.merkle_root();
    psbt.inputs[0].tap_scripts.insert(control_block, leaf);
    Ok(psbt)
}

/// build_unbonding_tx spends the staking output through the unbonding path into the
/// unbonding output. The covenant and staker signatures are collected later on.
pub fn build_unbonding_tx(
    scripts: &StakingScripts,
    staking_tx: &Transaction,
    output_index: u32,
    unbonding_fee_sat: u64,
    network: Network,
) -> Result<Psbt> {
    let staking_out = spent_output(staking_tx, output_index)?;
    let value = value_after_fee(staking_out, unbonding_fee_sat)?;

    let unbonding_spend_info = scripts.unbonding_spend_info()?;
    let secp = Secp256k1::verification_only();
    let unbonding_address = Address::p2tr(
        &secp,
        unbonding_spend_info.internal_key(),
        unbonding_spend_info.merkle_root(),
        network,
    );

    build_script_path_psbt(
        staking_tx,
        output_index,
        &scripts.staking_spend_info()?,
        &scripts.unbonding_script,
        Sequence::MAX,
        TxOut {
            value,
            script_pubkey: unbonding_address.script_pubkey(),
        },
    )
}

/// build_withdrawal_tx spends a matured output back to the staker's address.
/// Early unbonded delegations spend the unbonding output through the unbonding time-lock
/// path, the rest spend the staking output through the staking time-lock path.
pub fn build_withdrawal_tx(
    scripts: &StakingScripts,
    source: WithdrawalSource<'_>,
    destination_address: &str,
    withdrawal_fee_sat: u64,
    network: Network,
) -> Result<Psbt> {
    let destination = Address::from_str(destination_address)
        .map_err(|e| Error::InvalidAddress(e.to_string()))?
        .require_network(network)
        .map_err(|e| Error::InvalidAddress(e.to_string()))?;

    let (input_tx, output_index, spend_info, leaf_script, lock_time) = match source {
        WithdrawalSource::EarlyUnbonded {
            unbonding_tx,
            output_index,
        } => (
            unbonding_tx,
            output_index,
            scripts.unbonding_spend_info()?,
            &scripts.unbonding_timelock_script,
            scripts.unbonding_time,
        ),
        WithdrawalSource::TimelockExpired {
            staking_tx,
            output_index,
        } => (
            staking_tx,
            output_index,
            scripts.staking_spend_info()?,
            &scripts.timelock_script,
            scripts.staking_time,
        ),
    };

    let value = value_after_fee(spent_output(input_tx, output_index)?, withdrawal_fee_sat)?;

    build_script_path_psbt(
        input_tx,
        output_index,
        &spend_info,
        leaf_script,
        Sequence::from_height(lock_time),
        TxOut {
            value,
            script_pubkey: destination.script_pubkey(),
        },
    )
}

/// spent_leaf_script returns the tapscript the first input of the psbt is set to spend
pub fn spent_leaf_script(psbt: &Psbt) -> Option<&ScriptBuf> {
    psbt.inputs
        .first()
        .and_then(|input| input.tap_scripts.values().next())
        .map(|(script, _)| script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking_scripts::StakingScriptData;
    use bitcoin::secp256k1::{PublicKey, SecretKey};

    fn x_only(seed: u8) -> Vec<u8> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
        let (pk, _) = PublicKey::from_secret_key(&secp, &sk).x_only_public_key();
        pk.serialize().to_vec()
    }

    fn scripts() -> StakingScripts {
        StakingScriptData::new(
            &x_only(1),
            &[x_only(2)],
            &[x_only(3), x_only(4), x_only(5)],
            2,
            150,
            101,
            &[0x01, 0x02, 0x03, 0x04],
        )
        .unwrap()
        .build_scripts()
        .unwrap()
    }

    fn funding_tx(script_pubkey: ScriptBuf, value: u64) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn::default()],
            output: vec![TxOut {
                value: Amount::from_sat(value),
                script_pubkey,
            }],
        }
    }

    fn staker_address(network: Network) -> String {
        let secp = Secp256k1::verification_only();
        let pk = crate::staking_scripts::parse_x_only_pk(&x_only(1)).unwrap();
        Address::p2tr(&secp, pk, None, network).to_string()
    }

    #[test]
    fn unbonding_tx_spends_staking_output_into_unbonding_output() {
        let scripts = scripts();
        let staking_tx = funding_tx(scripts.staking_output_script().unwrap(), 100_000);

        let psbt =
            build_unbonding_tx(&scripts, &staking_tx, 0, 500, Network::Regtest).unwrap();
        let tx = &psbt.unsigned_tx;

        assert_eq!(tx.input.len(), 1);
        assert_eq!(
            tx.input[0].previous_output,
            OutPoint::new(staking_tx.compute_txid(), 0)
        );
        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.output[0].value, Amount::from_sat(99_500));
        assert_eq!(
            tx.output[0].script_pubkey,
            scripts.unbonding_output_script().unwrap()
        );
        assert_eq!(spent_leaf_script(&psbt), Some(&scripts.unbonding_script));
        assert_eq!(
            psbt.inputs[0].witness_utxo.as_ref(),
            Some(&staking_tx.output[0])
        );
    }

    #[test]
    fn unbonding_fee_must_be_lower_than_the_input() {
        let scripts = scripts();
        let staking_tx = funding_tx(scripts.staking_output_script().unwrap(), 1_000);

        assert_eq!(
            build_unbonding_tx(&scripts, &staking_tx, 0, 1_000, Network::Regtest).unwrap_err(),
            Error::InsufficientValue {
                value: 1_000,
                fee: 1_000
            }
        );
        assert_eq!(
            build_unbonding_tx(&scripts, &staking_tx, 0, 0, Network::Regtest).unwrap_err(),
            Error::ZeroFee {}
        );
        assert_eq!(
            build_unbonding_tx(&scripts, &staking_tx, 1, 500, Network::Regtest).unwrap_err(),
            Error::InvalidOutputIndex(1, 1)
        );
    }

    #[test]
    fn withdrawal_after_timelock_spends_staking_timelock_path() {
        let scripts = scripts();
        let staking_tx = funding_tx(scripts.staking_output_script().unwrap(), 100_000);
        let source = WithdrawalSource::select(&staking_tx, 0, None);
        assert!(!source.is_early_unbonded());

        let psbt = build_withdrawal_tx(
            &scripts,
            source,
            &staker_address(Network::Regtest),
            500,
            Network::Regtest,
        )
        .unwrap();

        assert_eq!(spent_leaf_script(&psbt), Some(&scripts.timelock_script));
        assert_eq!(psbt.unsigned_tx.input[0].sequence, Sequence::from_height(150));
        assert_eq!(psbt.unsigned_tx.output[0].value, Amount::from_sat(99_500));
    }

    #[test]
    fn withdrawal_after_early_unbonding_spends_unbonding_timelock_path() {
        let scripts = scripts();
        let staking_tx = funding_tx(scripts.staking_output_script().unwrap(), 100_000);
        let unbonding_tx =
            build_unbonding_tx(&scripts, &staking_tx, 0, 500, Network::Regtest)
                .unwrap()
                .unsigned_tx;
        let source = WithdrawalSource::select(&staking_tx, 0, Some((&unbonding_tx, 0)));
        assert!(source.is_early_unbonded());

        let psbt = build_withdrawal_tx(
            &scripts,
            source,
            &staker_address(Network::Regtest),
            500,
            Network::Regtest,
        )
        .unwrap();

        assert_eq!(
            spent_leaf_script(&psbt),
            Some(&scripts.unbonding_timelock_script)
        );
        assert_eq!(
            psbt.unsigned_tx.input[0].previous_output,
            OutPoint::new(unbonding_tx.compute_txid(), 0)
        );
        assert_eq!(psbt.unsigned_tx.input[0].sequence, Sequence::from_height(101));
        assert_eq!(psbt.unsigned_tx.output[0].value, Amount::from_sat(99_000));
    }

    #[test]
    fn withdrawal_rejects_address_of_another_network() {
        let scripts = scripts();
        let staking_tx = funding_tx(scripts.staking_output_script().unwrap(), 100_000);
        let err = build_withdrawal_tx(
            &scripts,
            WithdrawalSource::select(&staking_tx, 0, None),
            &staker_address(Network::Bitcoin),
            500,
            Network::Regtest,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }
}
