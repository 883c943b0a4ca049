//! Deterministic fixtures and mock collaborators for the staking delegation engine tests
use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Keypair, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Network, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness};

use babylon_apis::{Delegation, DelegationState, ProtocolParams, StakingTx, UnbondingTx};
use babylon_bitcoin::{tx_to_hex, Transaction};
use babylon_btcstaking::{build_unbonding_tx, StakingScriptData, StakingScripts};

pub mod mocks;

pub const STAKER_SEED: u8 = 1;
pub const FP_SEED: u8 = 2;
pub const COVENANT_SEEDS: [u8; 3] = [3, 4, 5];

pub const STAKING_TIMELOCK: u16 = 150;
pub const UNBONDING_TIME: u32 = 101;
pub const UNBONDING_FEE_SAT: u64 = 500;
pub const STAKING_START_HEIGHT: u64 = 200;

pub fn keypair(seed: u8) -> Keypair {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
    Keypair::from_secret_key(&secp, &sk)
}

/// x_only_pk_hex returns the BIP-340 public key of the seed's key pair
pub fn x_only_pk_hex(seed: u8) -> String {
    hex::encode(keypair(seed).x_only_public_key().0.serialize())
}

/// compressed_pk_hex returns the public key of the seed's key pair as wallets report it
pub fn compressed_pk_hex(seed: u8) -> String {
    hex::encode(keypair(seed).public_key().serialize())
}

pub fn staker_pk_hex() -> String {
    x_only_pk_hex(STAKER_SEED)
}

pub fn fp_pk_hex() -> String {
    x_only_pk_hex(FP_SEED)
}

/// staker_address returns the key-path taproot address of the staker
pub fn staker_address(network: Network) -> String {
    let secp = Secp256k1::verification_only();
    let (pk, _) = keypair(STAKER_SEED).x_only_public_key();
    Address::p2tr(&secp, pk, None, network).to_string()
}

/// get_params returns the first params version, active from height 100
pub fn get_params() -> ProtocolParams {
    ProtocolParams {
        version: 0,
        activation_height: 100,
        staking_cap_sat: 1_000_000_000,
        tag: "01020304".to_string(),
        covenant_pks: COVENANT_SEEDS.iter().map(|seed| x_only_pk_hex(*seed)).collect(),
        covenant_quorum: 2,
        unbonding_time: UNBONDING_TIME,
        unbonding_fee_sat: UNBONDING_FEE_SAT,
        max_staking_amount_sat: 100_000_000,
        min_staking_amount_sat: 10_000,
        max_staking_time: 65_535,
        min_staking_time: 64,
        confirmation_depth: 6,
    }
}

/// get_params_versions returns two params versions, the second one activating at
/// height 1000 with a single covenant key
pub fn get_params_versions() -> Vec<ProtocolParams> {
    let first = get_params();
    let second = ProtocolParams {
        version: 1,
        activation_height: 1_000,
        staking_cap_sat: 2_000_000_000,
        covenant_pks: vec![x_only_pk_hex(COVENANT_SEEDS[0])],
        covenant_quorum: 1,
        ..first.clone()
    };
    vec![first, second]
}

/// staking_scripts builds the scripts of the default staker and finality provider
pub fn staking_scripts(params: &ProtocolParams, timelock: u16) -> StakingScripts {
    let covenant_keys = params.covenant_keys().unwrap();
    StakingScriptData::new(
        &hex::decode(staker_pk_hex()).unwrap(),
        &[hex::decode(fp_pk_hex()).unwrap()],
        &covenant_keys,
        params.covenant_quorum,
        timelock,
        params.unbonding_time as u16,
        &params.tag_bytes().unwrap(),
    )
    .unwrap()
    .build_scripts()
    .unwrap()
}

/// new_staking_tx returns a staking tx locking `value` into the staking output at index 0,
/// with the staking data carried at index 1. `nonce` makes the funding outpoint unique.
pub fn new_staking_tx(scripts: &StakingScripts, value: u64, nonce: u8) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array([nonce; 32]), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![
            TxOut {
                value: Amount::from_sat(value),
                script_pubkey: scripts.staking_output_script().unwrap(),
            },
            TxOut {
                value: Amount::ZERO,
                script_pubkey: scripts.data_embed_script.clone(),
            },
        ],
    }
}

/// new_delegation returns a delegation of the default staker backed by a real staking tx
/// built against `get_params()`
pub fn new_delegation(value: u64, nonce: u8, state: DelegationState) -> Delegation {
    let scripts = staking_scripts(&get_params(), STAKING_TIMELOCK);
    let staking_tx = new_staking_tx(&scripts, value, nonce);
    Delegation {
        staking_tx_hash_hex: staking_tx.compute_txid().to_string(),
        staker_pk_hex: staker_pk_hex(),
        finality_provider_pk_hex: fp_pk_hex(),
        state,
        staking_value: value,
        staking_tx: StakingTx {
            tx_hex: tx_to_hex(&staking_tx),
            output_index: 0,
            start_timestamp: "2024-04-24T10:00:00Z".to_string(),
            start_height: STAKING_START_HEIGHT,
            timelock: STAKING_TIMELOCK,
        },
        unbonding_tx: None,
        is_overflow: false,
    }
}

/// with_unbonding_tx records the unbonding tx of the delegation, as the API does once the
/// delegation has been unbonded on demand
pub fn with_unbonding_tx(mut delegation: Delegation) -> Delegation {
    let params = get_params();
    let scripts = staking_scripts(&params, delegation.staking_tx.timelock);
    let staking_tx = babylon_bitcoin::tx_from_hex(&delegation.staking_tx.tx_hex).unwrap();
    let unbonding_tx = build_unbonding_tx(
        &scripts,
        &staking_tx,
        delegation.staking_tx.output_index,
        params.unbonding_fee_sat,
        Network::Regtest,
    )
    .unwrap()
    .unsigned_tx;
    delegation.unbonding_tx = Some(UnbondingTx {
        tx_hex: tx_to_hex(&unbonding_tx),
        output_index: 0,
    });
    delegation.state = DelegationState::Unbonded;
    delegation
}

/// init_tracing routes engine logs to the test output, filtered by RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
