//! In-memory collaborators recording every call they receive
use std::collections::VecDeque;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Keypair, Message, Secp256k1};
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::taproot::TapLeafHash;
use bitcoin::{Psbt, TapSighashType, Witness};
use parking_lot::Mutex;

use babylon_apis::error::{BroadcastError, SignerError, SourceError};
use babylon_apis::sources::{
    Broadcaster, ChainTipSource, DelegationSource, EligibilitySource, ParamsSource, Signer,
    UnbondingRequest, UnbondingSubmission,
};
use babylon_apis::wallet::{AccountChangeListener, WalletProvider};
use babylon_apis::{Delegation, DelegationsPage, ProtocolParams};
use babylon_bitcoin::chain_params::Network;
use babylon_bitcoin::{tx_from_hex, tx_to_hex};

use crate::{compressed_pk_hex, keypair, staker_address, STAKER_SEED};

/// MockSigner signs the script path of the first psbt input with the staker key, producing
/// the witness `[signature, leaf script, control block]`
pub struct MockSigner {
    keypair: Keypair,
    failure: Mutex<Option<SignerError>>,
    pub signed: Mutex<Vec<String>>,
}

impl Default for MockSigner {
    fn default() -> Self {
        MockSigner {
            keypair: keypair(STAKER_SEED),
            failure: Mutex::new(None),
            signed: Mutex::new(vec![]),
        }
    }
}

impl MockSigner {
    pub fn with_seed(seed: u8) -> Self {
        MockSigner {
            keypair: keypair(seed),
            ..Default::default()
        }
    }

    /// fail_with makes every following signing request fail
    pub fn fail_with(&self, error: SignerError) {
        *self.failure.lock() = Some(error);
    }

    fn sign_psbt(&self, unsigned_psbt_hex: &str) -> Result<String, SignerError> {
        let bytes = hex::decode(unsigned_psbt_hex).map_err(|e| SignerError::Other(e.to_string()))?;
        let psbt = Psbt::deserialize(&bytes).map_err(|e| SignerError::Other(e.to_string()))?;
        let input = psbt
            .inputs
            .first()
            .ok_or_else(|| SignerError::Other("psbt has no inputs".to_string()))?;
        let prev_out = input
            .witness_utxo
            .clone()
            .ok_or_else(|| SignerError::Other("missing witness utxo".to_string()))?;
        let (control_block, (leaf_script, leaf_version)) = input
            .tap_scripts
            .iter()
            .next()
            .ok_or_else(|| SignerError::Other("missing tap script".to_string()))?;

        let mut tx = psbt.unsigned_tx.clone();
        let sighash = SighashCache::new(&tx)
            .taproot_script_spend_signature_hash(
                0,
                &Prevouts::All(&[prev_out]),
                TapLeafHash::from_script(leaf_script, *leaf_version),
                TapSighashType::Default,
            )
            .map_err(|e| SignerError::Other(e.to_string()))?;

        let secp = Secp256k1::new();
        let signature = secp.sign_schnorr_no_aux_rand(
            &Message::from_digest(sighash.to_byte_array()),
            &self.keypair,
        );
        tx.input[0].witness = Witness::from_slice(&[
            signature.serialize().to_vec(),
            leaf_script.to_bytes(),
            control_block.serialize(),
        ]);
        Ok(tx_to_hex(&tx))
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn sign(&self, unsigned_psbt_hex: &str) -> Result<String, SignerError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let signed = self.sign_psbt(unsigned_psbt_hex)?;
        self.signed.lock().push(signed.clone());
        Ok(signed)
    }
}

#[derive(Default)]
pub struct MockBroadcaster {
    failure: Mutex<Option<BroadcastError>>,
    pub pushed: Mutex<Vec<String>>,
}

impl MockBroadcaster {
    pub fn fail_with(&self, error: BroadcastError) {
        *self.failure.lock() = Some(error);
    }
}

#[async_trait]
impl Broadcaster for MockBroadcaster {
    async fn push(&self, signed_tx_hex: &str) -> Result<String, BroadcastError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let tx = tx_from_hex(signed_tx_hex)
            .map_err(|e| BroadcastError::NetworkRejected(e.to_string()))?;
        self.pushed.lock().push(signed_tx_hex.to_string());
        Ok(tx.compute_txid().to_string())
    }
}

#[derive(Default)]
pub struct MockParamsSource {
    pub versions: Mutex<Vec<ProtocolParams>>,
}

impl MockParamsSource {
    pub fn new(versions: Vec<ProtocolParams>) -> Self {
        MockParamsSource {
            versions: Mutex::new(versions),
        }
    }
}

#[async_trait]
impl ParamsSource for MockParamsSource {
    async fn fetch_versions(&self) -> Result<Vec<ProtocolParams>, SourceError> {
        Ok(self.versions.lock().clone())
    }
}

pub struct MockChainTip {
    pub height: Mutex<u64>,
}

impl MockChainTip {
    pub fn new(height: u64) -> Self {
        MockChainTip {
            height: Mutex::new(height),
        }
    }
}

#[async_trait]
impl ChainTipSource for MockChainTip {
    async fn tip_height(&self) -> Result<u64, SourceError> {
        Ok(*self.height.lock())
    }
}

/// MockDelegationSource serves fixed pages. Page `n` is addressed by the key `"n"`, and the
/// first page by no key at all.
#[derive(Default)]
pub struct MockDelegationSource {
    pages: Mutex<Vec<DelegationsPage>>,
    failure: Mutex<Option<SourceError>>,
    pub requested_keys: Mutex<Vec<Option<String>>>,
}

impl MockDelegationSource {
    pub fn new(delegations: Vec<Delegation>) -> Self {
        let source = MockDelegationSource::default();
        source.set_delegations(delegations, usize::MAX);
        source
    }

    /// set_delegations splits the delegations into pages of `page_size`
    pub fn set_delegations(&self, delegations: Vec<Delegation>, page_size: usize) {
        let mut remaining: VecDeque<Delegation> = delegations.into();
        let mut pages = vec![];
        loop {
            let take = page_size.min(remaining.len());
            let page: Vec<Delegation> = remaining.drain(..take).collect();
            let next_key = if remaining.is_empty() {
                String::new()
            } else {
                (pages.len() + 1).to_string()
            };
            pages.push(DelegationsPage {
                delegations: page,
                next_key,
            });
            if remaining.is_empty() {
                break;
            }
        }
        *self.pages.lock() = pages;
    }

    pub fn set_pages(&self, pages: Vec<DelegationsPage>) {
        *self.pages.lock() = pages;
    }

    pub fn fail_with(&self, error: SourceError) {
        *self.failure.lock() = Some(error);
    }
}

#[async_trait]
impl DelegationSource for MockDelegationSource {
    async fn fetch_page(
        &self,
        _owner_pk_hex: &str,
        page_key: Option<&str>,
    ) -> Result<DelegationsPage, SourceError> {
        self.requested_keys
            .lock()
            .push(page_key.map(|key| key.to_string()));
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let idx = match page_key {
            None => 0,
            Some(key) => key
                .parse::<usize>()
                .map_err(|e| SourceError::InvalidResponse(e.to_string()))?,
        };
        Ok(self.pages.lock().get(idx).cloned().unwrap_or_default())
    }
}

pub struct MockEligibility {
    pub eligible: Mutex<bool>,
    failure: Mutex<Option<SourceError>>,
    pub queried: Mutex<Vec<String>>,
}

impl MockEligibility {
    pub fn new(eligible: bool) -> Self {
        MockEligibility {
            eligible: Mutex::new(eligible),
            failure: Mutex::new(None),
            queried: Mutex::new(vec![]),
        }
    }

    pub fn fail_with(&self, error: SourceError) {
        *self.failure.lock() = Some(error);
    }
}

#[async_trait]
impl EligibilitySource for MockEligibility {
    async fn fetch_eligible(&self, staking_tx_hash_hex: &str) -> Result<bool, SourceError> {
        self.queried.lock().push(staking_tx_hash_hex.to_string());
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(*self.eligible.lock())
    }
}

#[derive(Default)]
pub struct MockUnbondingSubmission {
    failure: Mutex<Option<SourceError>>,
    pub submitted: Mutex<Vec<UnbondingRequest>>,
}

impl MockUnbondingSubmission {
    pub fn fail_with(&self, error: SourceError) {
        *self.failure.lock() = Some(error);
    }
}

#[async_trait]
impl UnbondingSubmission for MockUnbondingSubmission {
    async fn submit(&self, request: &UnbondingRequest) -> Result<(), SourceError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        self.submitted.lock().push(request.clone());
        Ok(())
    }
}

/// MockWallet is a connected wallet of the default staker, signing with a `MockSigner`
pub struct MockWallet {
    pub network: Network,
    pub address: String,
    pub signer: MockSigner,
    pub connected: Mutex<bool>,
    listeners: Mutex<Vec<AccountChangeListener>>,
}

impl MockWallet {
    pub fn new(network: Network) -> Self {
        MockWallet {
            network,
            address: staker_address(network.into()),
            signer: MockSigner::default(),
            connected: Mutex::new(false),
            listeners: Mutex::new(vec![]),
        }
    }

    /// switch_account notifies the account change listeners
    pub fn switch_account(&self, address: &str) {
        for listener in self.listeners.lock().iter() {
            listener(address);
        }
    }

    fn ensure_connected(&self) -> Result<(), SignerError> {
        if *self.connected.lock() {
            Ok(())
        } else {
            Err(SignerError::WalletDisconnected)
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn name(&self) -> &str {
        "Mock Wallet"
    }

    async fn connect(&self) -> Result<(), SignerError> {
        *self.connected.lock() = true;
        Ok(())
    }

    async fn address(&self) -> Result<String, SignerError> {
        self.ensure_connected()?;
        Ok(self.address.clone())
    }

    async fn public_key_hex(&self) -> Result<String, SignerError> {
        self.ensure_connected()?;
        Ok(compressed_pk_hex(STAKER_SEED))
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> Result<String, SignerError> {
        self.ensure_connected()?;
        self.signer.sign(psbt_hex).await
    }

    async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        self.ensure_connected()?;
        let digest = bitcoin::hashes::sha256::Hash::hash(message.as_bytes());
        let signature = Secp256k1::new().sign_schnorr_no_aux_rand(
            &Message::from_digest(digest.to_byte_array()),
            &keypair(STAKER_SEED),
        );
        Ok(hex::encode(signature.serialize()))
    }

    async fn network(&self) -> Result<Network, SignerError> {
        self.ensure_connected()?;
        Ok(self.network)
    }

    fn on_account_change(&self, listener: AccountChangeListener) {
        self.listeners.lock().push(listener);
    }
}
