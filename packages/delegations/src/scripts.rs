use babylon_apis::{Delegation, ProtocolParams, Validate};
use babylon_btcstaking::{StakingScriptData, StakingScripts};

use crate::error::LifecycleError;

/// build_scripts reconstructs the staking scripts of a delegation of the owner to a
/// finality provider, under the given params.
/// All inputs are validated before any script is assembled.
pub fn build_scripts(
    owner_pk_no_coord_hex: &str,
    fp_pk_hex: &str,
    params: &ProtocolParams,
    staking_timelock: u16,
) -> Result<StakingScripts, LifecycleError> {
    params.validate()?;

    let timelock = u32::from(staking_timelock);
    if timelock == 0 || timelock < params.min_staking_time || timelock > params.max_staking_time {
        return Err(LifecycleError::InvalidInput(format!(
            "staking timelock {} out of bounds [{}, {}]",
            staking_timelock, params.min_staking_time, params.max_staking_time
        )));
    }

    let staker_key = hex::decode(owner_pk_no_coord_hex)
        .map_err(|e| LifecycleError::InvalidInput(format!("staker public key: {e}")))?;
    let fp_key = hex::decode(fp_pk_hex)
        .map_err(|e| LifecycleError::InvalidInput(format!("finality provider public key: {e}")))?;

    let data = StakingScriptData::new(
        &staker_key,
        &[fp_key],
        &params.covenant_keys()?,
        params.covenant_quorum,
        staking_timelock,
        params.unbonding_time_u16()?,
        &params.tag_bytes()?,
    )?;
    Ok(data.build_scripts()?)
}

/// delegation_scripts reconstructs the staking scripts a remote delegation was created with
pub fn delegation_scripts(
    delegation: &Delegation,
    params: &ProtocolParams,
) -> Result<StakingScripts, LifecycleError> {
    delegation.validate()?;
    build_scripts(
        &delegation.staker_pk_hex,
        &delegation.finality_provider_pk_hex,
        params,
        delegation.staking_tx.timelock,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use babylon_apis::DelegationState;
    use test_utils::{fp_pk_hex, get_params, new_delegation, staker_pk_hex, x_only_pk_hex};

    #[test]
    fn build_scripts_is_deterministic() {
        let params = get_params();
        let a = build_scripts(&staker_pk_hex(), &fp_pk_hex(), &params, 150).unwrap();
        let b = build_scripts(&staker_pk_hex(), &fp_pk_hex(), &params, 150).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.staking_output_script().unwrap(),
            b.staking_output_script().unwrap()
        );
    }

    #[test]
    fn quorum_above_covenant_count_is_invalid_input() {
        let mut params = get_params();
        params.covenant_quorum = params.covenant_pks.len() as u32 + 1;
        assert_matches!(
            build_scripts(&staker_pk_hex(), &fp_pk_hex(), &params, 150),
            Err(LifecycleError::InvalidInput(_))
        );
    }

    #[test]
    fn timelock_must_be_within_params_bounds() {
        let params = get_params();
        for timelock in [0, 63] {
            assert_matches!(
                build_scripts(&staker_pk_hex(), &fp_pk_hex(), &params, timelock),
                Err(LifecycleError::InvalidInput(_))
            );
        }
        build_scripts(&staker_pk_hex(), &fp_pk_hex(), &params, 64).unwrap();
        build_scripts(&staker_pk_hex(), &fp_pk_hex(), &params, u16::MAX).unwrap();
    }

    #[test]
    fn keys_must_be_x_only() {
        let params = get_params();
        let compressed = format!("02{}", staker_pk_hex());
        assert_matches!(
            build_scripts(&compressed, &fp_pk_hex(), &params, 150),
            Err(LifecycleError::InvalidInput(_))
        );
        // a finality provider key equal to a covenant key
        assert_matches!(
            build_scripts(&staker_pk_hex(), &x_only_pk_hex(3), &params, 150),
            Err(LifecycleError::InvalidInput(_))
        );
    }

    #[test]
    fn delegation_scripts_match_the_staking_output() {
        let params = get_params();
        let del = new_delegation(100_000, 7, DelegationState::Active);
        let scripts = delegation_scripts(&del, &params).unwrap();
        let staking_tx = del.decoded_staking_tx().unwrap();
        scripts
            .verify_staking_tx(&staking_tx, del.staking_tx.output_index)
            .unwrap();
    }
}
