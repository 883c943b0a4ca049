use std::str::FromStr;
use std::sync::Arc;

use cosmwasm_std::Storage;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use babylon_apis::sources::{
    Broadcaster, ChainTipSource, DelegationSource, EligibilitySource, ParamsSource, Signer,
    UnbondingSubmission,
};
use babylon_apis::wallet::{is_supported_address_type, WalletProvider};
use babylon_apis::{
    current_params_version, is_over_the_cap, Delegation, IntermediateDelegation,
    ParamsWithContext, PendingDelegation, ProtocolParams, Validate,
};
use babylon_bitcoin::{public_key_no_coord, x_only_pk_from_hex, Address};

use crate::config::Config;
use crate::eligibility::EligibilityGate;
use crate::error::LifecycleError;
use crate::poller::{fetch_all_delegations, valid_delegations};
use crate::reconcile::{reconcile, DelegationRow};
use crate::store::{LocalDelegationStore, INTERMEDIATE_DELEGATIONS, PENDING_DELEGATIONS};
use crate::summary::total_active_staked;

/// Collaborators are the external services the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub signer: Arc<dyn Signer>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub params: Arc<dyn ParamsSource>,
    pub chain_tip: Arc<dyn ChainTipSource>,
    pub delegations: Arc<dyn DelegationSource>,
    pub eligibility: Arc<dyn EligibilitySource>,
    pub unbonding: Arc<dyn UnbondingSubmission>,
}

/// Owner is the connected staker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    /// pk_no_coord_hex is the x-only public key of the staker in hex
    pub pk_no_coord_hex: String,
    /// address receives withdrawn funds
    pub address: String,
}

/// DelegationManager drives the delegations of the connected owner: it polls the staking
/// API, runs unbonding and withdrawal actions and keeps the merged view up to date.
/// Poll ticks and user actions are serialised through `&mut self`.
pub struct DelegationManager<S: Storage> {
    pub(crate) config: Config,
    pub(crate) storage: S,
    pub(crate) sources: Collaborators,
    pub(crate) eligibility: EligibilityGate,
    pub(crate) intermediates: LocalDelegationStore<IntermediateDelegation>,
    pub(crate) pending: LocalDelegationStore<PendingDelegation>,
    pub(crate) owner: Option<Owner>,
    pub(crate) params_versions: Vec<ProtocolParams>,
    pub(crate) params: ParamsWithContext,
    pub(crate) remote: Vec<Delegation>,
    pub(crate) rows: Vec<DelegationRow>,
}

impl<S: Storage> DelegationManager<S> {
    pub fn new(config: Config, storage: S, sources: Collaborators) -> Result<Self, LifecycleError> {
        config.validate()?;
        Ok(DelegationManager {
            config,
            storage,
            eligibility: EligibilityGate::new(sources.eligibility.clone()),
            sources,
            intermediates: LocalDelegationStore::new(INTERMEDIATE_DELEGATIONS),
            pending: LocalDelegationStore::new(PENDING_DELEGATIONS),
            owner: None,
            params_versions: vec![],
            params: ParamsWithContext::default(),
            remote: vec![],
            rows: vec![],
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// connect scopes the engine to the owner of the given public key, compressed or x-only.
    /// The view is rebuilt from the owner's local records until the next poll.
    pub fn connect(&mut self, owner_pk_hex: &str, address: &str) -> Result<(), LifecycleError> {
        let pk_no_coord_hex = public_key_no_coord(owner_pk_hex)?;
        x_only_pk_from_hex(&pk_no_coord_hex)?;

        if !is_supported_address_type(address) {
            return Err(LifecycleError::InvalidInput(format!(
                "unsupported address type: {address}"
            )));
        }
        Address::from_str(address)
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?
            .require_network(self.config.btc_network())
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;

        self.intermediates.set_owner(Some(pk_no_coord_hex.clone()));
        self.pending.set_owner(Some(pk_no_coord_hex.clone()));
        self.remote.clear();
        info!(owner = %pk_no_coord_hex, "wallet connected");
        self.owner = Some(Owner {
            pk_no_coord_hex,
            address: address.to_string(),
        });
        self.reconcile()
    }

    /// connect_wallet connects the wallet and scopes the engine to its current account.
    /// The wallet must be on the configured network.
    pub async fn connect_wallet(
        &mut self,
        wallet: &dyn WalletProvider,
    ) -> Result<(), LifecycleError> {
        wallet.connect().await?;
        let network = wallet.network().await?;
        if network != self.config.network {
            return Err(LifecycleError::InvalidInput(format!(
                "wallet is on {network}, expected {}",
                self.config.network
            )));
        }
        let address = wallet.address().await?;
        let pk_hex = wallet.public_key_hex().await?;
        debug!(wallet = wallet.name(), "connecting wallet");
        self.connect(&pk_hex, &address)
    }

    pub fn disconnect(&mut self) {
        if let Some(owner) = self.owner.take() {
            info!(owner = %owner.pk_no_coord_hex, "wallet disconnected");
        }
        self.intermediates.set_owner(None);
        self.pending.set_owner(None);
        self.remote.clear();
        self.rows.clear();
    }

    /// refresh_params fetches the params versions and selects the one the next BTC block
    /// will be validated against
    pub async fn refresh_params(&mut self) -> Result<&ParamsWithContext, LifecycleError> {
        let versions: Vec<ProtocolParams> = self
            .sources
            .params
            .fetch_versions()
            .await?
            .into_iter()
            .filter(|params| match params.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(version = params.version, error = %e, "skipping invalid params version");
                    false
                }
            })
            .collect();
        let tip_height = self.sources.chain_tip.tip_height().await?;

        self.params = current_params_version(tip_height.saturating_add(1), &versions);
        self.params_versions = versions;
        debug!(
            tip_height,
            version = ?self.params.current_version.as_ref().map(|p| p.version),
            approaching_next = self.params.is_approaching_next_version,
            "params refreshed"
        );
        Ok(&self.params)
    }

    pub fn params(&self) -> &ParamsWithContext {
        &self.params
    }

    /// params_at returns the params version active at `height`
    pub(crate) async fn params_at(&mut self, height: u64) -> Result<ProtocolParams, LifecycleError> {
        if self.params_versions.is_empty() {
            self.refresh_params().await?;
        }
        current_params_version(height, &self.params_versions)
            .current_version
            .ok_or(LifecycleError::NoActiveParams(height))
    }

    /// poll fetches the owner's delegations and reconciles the local records against them.
    /// Without a connected owner it does nothing.
    pub async fn poll(&mut self) -> Result<(), LifecycleError> {
        let Some(owner) = &self.owner else {
            return Ok(());
        };
        let owner_pk = owner.pk_no_coord_hex.clone();

        let fetched = fetch_all_delegations(
            self.sources.delegations.as_ref(),
            &owner_pk,
            self.config.max_delegation_pages,
        )
        .await?;
        self.remote = valid_delegations(fetched);
        debug!(owner = %owner_pk, count = self.remote.len(), "delegations polled");
        self.reconcile()
    }

    /// reconcile prunes the local records the API caught up with, persisting them only when
    /// they changed, and rebuilds the view
    pub fn reconcile(&mut self) -> Result<(), LifecycleError> {
        let intermediates = self.intermediates.list(&self.storage)?;
        let pending = self.pending.list(&self.storage)?;
        let out = reconcile(&self.remote, &intermediates, &pending);

        if out.intermediates_changed {
            info!(
                owner = ?self.intermediates.owner(),
                before = intermediates.len(),
                after = out.intermediates.len(),
                "intermediate delegations pruned"
            );
            self.intermediates
                .replace(&mut self.storage, out.intermediates)?;
        }
        if out.pending_changed {
            info!(
                owner = ?self.pending.owner(),
                before = pending.len(),
                after = out.pending.len(),
                "pending delegations pruned"
            );
            self.pending.replace(&mut self.storage, out.pending)?;
        }
        self.rows = out.rows;
        Ok(())
    }

    /// view is the merged delegations collection, local records first
    pub fn view(&self) -> &[DelegationRow] {
        &self.rows
    }

    /// delegations are the valid delegations of the last poll, in server order
    pub fn delegations(&self) -> &[Delegation] {
        &self.remote
    }

    pub fn local_intermediates(&self) -> Result<Vec<IntermediateDelegation>, LifecycleError> {
        Ok(self.intermediates.list(&self.storage)?)
    }

    pub fn local_pending(&self) -> Result<Vec<PendingDelegation>, LifecycleError> {
        Ok(self.pending.list(&self.storage)?)
    }

    pub fn total_active_staked(&self) -> u64 {
        total_active_staked(&self.remote)
    }

    /// is_over_the_cap checks the active TVL against the current params version
    pub fn is_over_the_cap(&self, active_tvl_sat: u64) -> bool {
        self.params
            .current_version
            .as_ref()
            .is_some_and(|params| is_over_the_cap(params, active_tvl_sat))
    }

    /// run polls at the configured interval until `shutdown` turns true or its sender is
    /// dropped. Poll failures are logged and retried at the next tick.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll().await {
                        warn!(error = %e, retryable = e.is_retryable(), "delegations poll failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("delegations polling stopped");
                        return;
                    }
                }
            }
        }
    }
}
