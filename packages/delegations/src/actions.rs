use cosmwasm_std::Storage;
use tracing::{debug, error, info, warn};

use babylon_apis::error::{BroadcastError, SignerError};
use babylon_apis::btc_staking_api::HASH_SIZE;
use babylon_apis::sources::UnbondingRequest;
use babylon_apis::{
    Delegation, DelegationState, IntermediateDelegation, IntermediateState, PendingDelegation,
    Validate,
};
use babylon_bitcoin::{tx_from_hex, tx_to_hex, x_only_pk_from_hex, Transaction};
use babylon_btcstaking::sig_verify::{staker_signature, verify_transaction_sig_with_output};
use babylon_btcstaking::{build_unbonding_tx, build_withdrawal_tx, WithdrawalSource};

use crate::error::{ActionError, ActionStage, AtStage, LifecycleError};
use crate::manager::{DelegationManager, Owner};
use crate::scripts::delegation_scripts;

/// Decodes the tx returned by the signer, which must be the tx it was asked to sign
fn decode_signed_tx(
    signed_tx_hex: &str,
    unsigned_tx: &Transaction,
) -> Result<Transaction, SignerError> {
    let signed_tx = tx_from_hex(signed_tx_hex)
        .map_err(|e| SignerError::Other(format!("invalid signed tx: {e}")))?;
    if signed_tx.compute_txid() != unsigned_tx.compute_txid() {
        return Err(SignerError::Other(
            "signed tx does not match the requested tx".to_string(),
        ));
    }
    Ok(signed_tx)
}

impl<S: Storage> DelegationManager<S> {
    fn connected_owner(&self) -> Result<Owner, ActionError> {
        self.owner
            .clone()
            .ok_or(LifecycleError::NotConnected)
            .at(ActionStage::Lookup)
    }

    /// Looks up a delegation of the owner, in one of the expected states
    fn owned_delegation(
        &self,
        owner: &Owner,
        staking_tx_hash_hex: &str,
        expected: &[DelegationState],
    ) -> Result<Delegation, ActionError> {
        let delegation = self
            .remote
            .iter()
            .find(|d| d.staking_tx_hash_hex == staking_tx_hash_hex)
            .cloned()
            .ok_or_else(|| LifecycleError::DelegationNotFound(staking_tx_hash_hex.to_string()))
            .at(ActionStage::Lookup)?;
        delegation.validate().at(ActionStage::Lookup)?;

        if delegation.staker_pk_hex != owner.pk_no_coord_hex {
            return Err(ActionError::new(
                ActionStage::Lookup,
                LifecycleError::InvalidInput(format!(
                    "delegation {staking_tx_hash_hex} is not owned by the connected staker"
                )),
            ));
        }
        if !expected.contains(&delegation.state) {
            return Err(ActionError::new(
                ActionStage::Lookup,
                LifecycleError::InvalidInput(format!(
                    "delegation {staking_tx_hash_hex} is {}",
                    delegation.state
                )),
            ));
        }
        Ok(delegation)
    }

    /// Records the local action and refreshes the view. The action already reached the
    /// network, so a storage failure is logged and the next poll shows the API state.
    fn persist_intermediate(&mut self, delegation: &Delegation, state: IntermediateState) {
        let res = self
            .intermediates
            .append(
                &mut self.storage,
                IntermediateDelegation::from_delegation(delegation, state),
            )
            .map_err(LifecycleError::from)
            .and_then(|()| self.reconcile());
        if let Err(e) = res {
            error!(
                staking_tx_hash = %delegation.staking_tx_hash_hex,
                stage = %ActionStage::Persistence,
                error = %e,
                "failed to record local action"
            );
        }
    }

    /// unbond unbonds an active delegation on demand: once the staking API confirms the
    /// delegation is eligible, the unbonding tx is built, signed by the staker and handed to
    /// the covenant committee. Returns the unbonding tx hash.
    /// Nothing is recorded locally unless the submission succeeded.
    pub async fn unbond(&mut self, staking_tx_hash_hex: &str) -> Result<String, ActionError> {
        let res = self.try_unbond(staking_tx_hash_hex).await;
        if let Err(e) = &res {
            warn!(
                staking_tx_hash = staking_tx_hash_hex,
                stage = %e.stage,
                error = %e.error,
                "unbonding aborted"
            );
        }
        res
    }

    async fn try_unbond(&mut self, staking_tx_hash_hex: &str) -> Result<String, ActionError> {
        let owner = self.connected_owner()?;
        let delegation =
            self.owned_delegation(&owner, staking_tx_hash_hex, &[DelegationState::Active])?;

        self.eligibility
            .ensure_eligible(staking_tx_hash_hex)
            .await
            .at(ActionStage::Eligibility)?;

        debug!(
            staking_tx_hash = staking_tx_hash_hex,
            stage = "construction",
            "building unbonding tx"
        );
        let params = self
            .params_at(delegation.staking_tx.start_height)
            .await
            .at(ActionStage::Construction)?;
        let scripts = delegation_scripts(&delegation, &params).at(ActionStage::Construction)?;
        let staking_tx = delegation
            .decoded_staking_tx()
            .at(ActionStage::Construction)?;
        let output_index = delegation.staking_tx.output_index;
        scripts
            .verify_staking_tx(&staking_tx, output_index)
            .at(ActionStage::Construction)?;
        let psbt = build_unbonding_tx(
            &scripts,
            &staking_tx,
            output_index,
            params.unbonding_fee_sat,
            self.config.btc_network(),
        )
        .at(ActionStage::Construction)?;

        debug!(
            staking_tx_hash = staking_tx_hash_hex,
            stage = "signing",
            "signing unbonding tx"
        );
        let signed_tx_hex = self
            .sources
            .signer
            .sign(&psbt.serialize_hex())
            .await
            .at(ActionStage::Signing)?;
        let signed_tx =
            decode_signed_tx(&signed_tx_hex, &psbt.unsigned_tx).at(ActionStage::Signing)?;
        let signature = staker_signature(&signed_tx)
            .map_err(|e| SignerError::Other(e.to_string()))
            .at(ActionStage::Signing)?;
        let staker_key = x_only_pk_from_hex(&owner.pk_no_coord_hex).at(ActionStage::Signing)?;
        verify_transaction_sig_with_output(
            &signed_tx,
            &staking_tx.output[output_index as usize],
            &scripts.unbonding_script,
            &staker_key,
            &signature,
        )
        .map_err(|e| SignerError::Other(format!("invalid staker signature: {e}")))
        .at(ActionStage::Signing)?;

        let request = UnbondingRequest {
            staker_signed_signature_hex: hex::encode(&signature),
            staking_tx_hash_hex: staking_tx_hash_hex.to_string(),
            unbonding_tx_hash_hex: signed_tx.compute_txid().to_string(),
            unbonding_tx_hex: tx_to_hex(&signed_tx),
        };
        self.sources
            .unbonding
            .submit(&request)
            .await
            .map_err(|e| BroadcastError::NetworkRejected(e.to_string()))
            .at(ActionStage::Submission)?;
        info!(
            staking_tx_hash = staking_tx_hash_hex,
            owner = %owner.pk_no_coord_hex,
            unbonding_tx_hash = %request.unbonding_tx_hash_hex,
            "unbonding request submitted"
        );

        self.persist_intermediate(&delegation, IntermediateState::IntermediateUnbonding);
        Ok(request.unbonding_tx_hash_hex)
    }

    /// withdraw spends an unbonded delegation back to the owner's address and returns the
    /// withdrawal txid. Delegations unbonded on demand are withdrawn from their unbonding
    /// output, the others from their staking output.
    pub async fn withdraw(&mut self, staking_tx_hash_hex: &str) -> Result<String, ActionError> {
        let res = self.try_withdraw(staking_tx_hash_hex).await;
        if let Err(e) = &res {
            warn!(
                staking_tx_hash = staking_tx_hash_hex,
                stage = %e.stage,
                error = %e.error,
                "withdrawal aborted"
            );
        }
        res
    }

    async fn try_withdraw(&mut self, staking_tx_hash_hex: &str) -> Result<String, ActionError> {
        let owner = self.connected_owner()?;
        let delegation =
            self.owned_delegation(&owner, staking_tx_hash_hex, &[DelegationState::Unbonded])?;

        let params = self
            .params_at(delegation.staking_tx.start_height)
            .await
            .at(ActionStage::Construction)?;
        let scripts = delegation_scripts(&delegation, &params).at(ActionStage::Construction)?;
        let staking_tx = delegation
            .decoded_staking_tx()
            .at(ActionStage::Construction)?;
        let unbonding = delegation
            .decoded_unbonding_tx()
            .at(ActionStage::Construction)?;
        let output_index = delegation.staking_tx.output_index;

        let verified = match &unbonding {
            Some((unbonding_tx, unbonding_output_index)) => {
                scripts.verify_unbonding_tx(unbonding_tx, *unbonding_output_index)
            }
            None => scripts.verify_staking_tx(&staking_tx, output_index),
        };
        verified.at(ActionStage::Construction)?;

        let source = WithdrawalSource::select(
            &staking_tx,
            output_index,
            unbonding.as_ref().map(|(tx, idx)| (tx, *idx)),
        );
        debug!(
            staking_tx_hash = staking_tx_hash_hex,
            stage = "construction",
            early_unbonded = source.is_early_unbonded(),
            "building withdrawal tx"
        );
        let psbt = build_withdrawal_tx(
            &scripts,
            source,
            &owner.address,
            self.config.withdrawal_fee_sat,
            self.config.btc_network(),
        )
        .at(ActionStage::Construction)?;

        let signed_tx_hex = self
            .sources
            .signer
            .sign(&psbt.serialize_hex())
            .await
            .at(ActionStage::Signing)?;
        decode_signed_tx(&signed_tx_hex, &psbt.unsigned_tx).at(ActionStage::Signing)?;

        let txid = self
            .sources
            .broadcaster
            .push(&signed_tx_hex)
            .await
            .at(ActionStage::Submission)?;
        info!(
            staking_tx_hash = staking_tx_hash_hex,
            owner = %owner.pk_no_coord_hex,
            txid = %txid,
            "withdrawal broadcast"
        );

        self.persist_intermediate(&delegation, IntermediateState::IntermediateWithdrawal);
        Ok(txid)
    }

    /// record_pending_stake caches a staking delegation broadcast by the owner until the
    /// staking API reports it
    pub fn record_pending_stake(&mut self, record: PendingDelegation) -> Result<(), LifecycleError> {
        let Some(owner) = &self.owner else {
            return Err(LifecycleError::NotConnected);
        };
        if record.staker_pk_hex != owner.pk_no_coord_hex {
            return Err(LifecycleError::InvalidInput(format!(
                "pending delegation {} is not owned by the connected staker",
                record.staking_tx_hash_hex
            )));
        }
        if record.staking_tx_hash_hex.len() != HASH_SIZE * 2 {
            return Err(LifecycleError::InvalidInput(format!(
                "invalid staking tx hash {}",
                record.staking_tx_hash_hex
            )));
        }
        debug!(staking_tx_hash = %record.staking_tx_hash_hex, "recording pending stake");
        self.pending.append(&mut self.storage, record)?;
        self.reconcile()
    }
}
