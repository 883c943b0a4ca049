use babylon_bitcoin::X_ONLY_PK_LEN;

use crate::btc_staking_api::{Delegation, HASH_SIZE};
use crate::error::StakingApiError;
use crate::params::ProtocolParams;

/// A trait for validating the API structs / input.
pub trait Validate {
    fn validate(&self) -> Result<(), StakingApiError>;
}

impl Validate for Delegation {
    fn validate(&self) -> Result<(), StakingApiError> {
        if self.staking_tx_hash_hex.len() != HASH_SIZE * 2 {
            return Err(StakingApiError::InvalidStakingTxHash(HASH_SIZE * 2));
        }
        hex::decode(&self.staking_tx_hash_hex)?;

        if self.staker_pk_hex.is_empty() {
            return Err(StakingApiError::EmptyBtcPk);
        }
        if self.finality_provider_pk_hex.is_empty() {
            return Err(StakingApiError::EmptyFinalityProviderPk);
        }
        if self.staking_tx.tx_hex.is_empty() {
            return Err(StakingApiError::EmptyStakingTx);
        }
        if self.staking_tx.timelock == 0 {
            return Err(StakingApiError::ZeroTimelock);
        }
        if let Some(unbonding_tx) = &self.unbonding_tx {
            if unbonding_tx.tx_hex.is_empty() {
                return Err(StakingApiError::EmptyUnbondingTx);
            }
        }

        Ok(())
    }
}

impl Validate for ProtocolParams {
    fn validate(&self) -> Result<(), StakingApiError> {
        if self.covenant_pks.is_empty() {
            return Err(StakingApiError::EmptyCovenantPks);
        }
        for (pk_hex, pk) in self.covenant_pks.iter().zip(self.covenant_keys()?) {
            if pk.len() != X_ONLY_PK_LEN {
                return Err(StakingApiError::InvalidCovenantPk(pk_hex.clone()));
            }
        }

        if self.covenant_quorum == 0 || self.covenant_quorum as usize > self.covenant_pks.len() {
            return Err(StakingApiError::InvalidCovenantQuorum {
                quorum: self.covenant_quorum,
                keys: self.covenant_pks.len(),
            });
        }

        if self.min_staking_time > self.max_staking_time {
            return Err(StakingApiError::InvalidStakingTimeRange {
                min: self.min_staking_time,
                max: self.max_staking_time,
            });
        }
        if self.min_staking_amount_sat > self.max_staking_amount_sat {
            return Err(StakingApiError::InvalidStakingAmountRange {
                min: self.min_staking_amount_sat,
                max: self.max_staking_amount_sat,
            });
        }

        self.tag_bytes()?;
        self.unbonding_time_u16()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btc_staking_api::{DelegationState, StakingTx, UnbondingTx};

    fn delegation() -> Delegation {
        Delegation {
            staking_tx_hash_hex: "ab".repeat(32),
            staker_pk_hex: "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
                .to_string(),
            finality_provider_pk_hex:
                "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5".to_string(),
            state: DelegationState::Active,
            staking_value: 100_000,
            staking_tx: StakingTx {
                tx_hex: "0200".to_string(),
                output_index: 0,
                start_timestamp: "2024-04-24T10:00:00Z".to_string(),
                start_height: 200,
                timelock: 150,
            },
            unbonding_tx: None,
            is_overflow: false,
        }
    }

    fn params() -> ProtocolParams {
        ProtocolParams {
            version: 0,
            activation_height: 100,
            staking_cap_sat: 1_000_000,
            tag: "01020304".to_string(),
            covenant_pks: vec![
                "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798".to_string(),
                "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5".to_string(),
            ],
            covenant_quorum: 2,
            unbonding_time: 101,
            unbonding_fee_sat: 500,
            max_staking_amount_sat: 1_000_000,
            min_staking_amount_sat: 10_000,
            max_staking_time: 65_535,
            min_staking_time: 64,
            confirmation_depth: 6,
        }
    }

    #[test]
    fn valid_delegation() {
        delegation().validate().unwrap();
    }

    #[test]
    fn delegation_validation_errors() {
        let mut del = delegation();
        del.staking_tx_hash_hex = "ab".to_string();
        assert_eq!(del.validate(), Err(StakingApiError::InvalidStakingTxHash(64)));

        let mut del = delegation();
        del.staker_pk_hex.clear();
        assert_eq!(del.validate(), Err(StakingApiError::EmptyBtcPk));

        let mut del = delegation();
        del.staking_tx.tx_hex.clear();
        assert_eq!(del.validate(), Err(StakingApiError::EmptyStakingTx));

        let mut del = delegation();
        del.staking_tx.timelock = 0;
        assert_eq!(del.validate(), Err(StakingApiError::ZeroTimelock));

        let mut del = delegation();
        del.unbonding_tx = Some(UnbondingTx {
            tx_hex: String::new(),
            output_index: 0,
        });
        assert_eq!(del.validate(), Err(StakingApiError::EmptyUnbondingTx));
    }

    #[test]
    fn valid_params() {
        params().validate().unwrap();
    }

    #[test]
    fn params_validation_errors() {
        let mut p = params();
        p.covenant_quorum = 3;
        assert_eq!(
            p.validate(),
            Err(StakingApiError::InvalidCovenantQuorum { quorum: 3, keys: 2 })
        );

        let mut p = params();
        p.covenant_quorum = 0;
        assert!(matches!(
            p.validate(),
            Err(StakingApiError::InvalidCovenantQuorum { .. })
        ));

        let mut p = params();
        p.min_staking_time = 70_000;
        assert_eq!(
            p.validate(),
            Err(StakingApiError::InvalidStakingTimeRange {
                min: 70_000,
                max: 65_535
            })
        );

        let mut p = params();
        p.covenant_pks.push("abcd".to_string());
        assert_eq!(
            p.validate(),
            Err(StakingApiError::InvalidCovenantPk("abcd".to_string()))
        );

        let mut p = params();
        p.covenant_pks.clear();
        assert_eq!(p.validate(), Err(StakingApiError::EmptyCovenantPks));

        let mut p = params();
        p.unbonding_time = 65_536;
        assert_eq!(
            p.validate(),
            Err(StakingApiError::ErrInvalidUnbondingTime(65_536, 65_535))
        );
    }
}
