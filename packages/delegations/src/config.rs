use std::time::Duration;

use cosmwasm_schema::cw_serde;
use derivative::Derivative;

use babylon_bitcoin::chain_params::Network;

use crate::error::LifecycleError;

/// Config of the delegation engine
#[cw_serde]
#[derive(Derivative)]
#[derivative(Default)]
pub struct Config {
    /// `network` is the BTC network the staking protocol runs on.
    /// Connected wallets and withdrawal addresses must belong to it.
    #[derivative(Default(value = "Network::Signet"))]
    pub network: Network,
    /// `withdrawal_fee_sat` is the fee paid by withdrawal transactions, in satoshis
    #[derivative(Default(value = "500"))]
    pub withdrawal_fee_sat: u64,
    /// `poll_interval_secs` is the interval between two delegation polls
    #[derivative(Default(value = "60"))]
    pub poll_interval_secs: u64,
    /// `max_delegation_pages` bounds the number of pages fetched per poll
    #[derivative(Default(value = "100"))]
    pub max_delegation_pages: u32,
}

impl Config {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.withdrawal_fee_sat == 0 {
            return Err(LifecycleError::InvalidConfig(
                "withdrawal fee must be larger than 0".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(LifecycleError::InvalidConfig(
                "poll interval must be larger than 0".to_string(),
            ));
        }
        if self.max_delegation_pages == 0 {
            return Err(LifecycleError::InvalidConfig(
                "max delegation pages must be larger than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn btc_network(&self) -> bitcoin::Network {
        self.network.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.network, Network::Signet);
        assert_eq!(cfg.withdrawal_fee_sat, 500);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        assert_eq!(cfg.max_delegation_pages, 100);
        assert_eq!(cfg.btc_network(), bitcoin::Network::Signet);
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_values_are_rejected() {
        for cfg in [
            Config {
                withdrawal_fee_sat: 0,
                ..Default::default()
            },
            Config {
                poll_interval_secs: 0,
                ..Default::default()
            },
            Config {
                max_delegation_pages: 0,
                ..Default::default()
            },
        ] {
            assert_matches!(cfg.validate(), Err(LifecycleError::InvalidConfig(_)));
        }
    }

    #[test]
    fn config_from_json() {
        let cfg: Config = serde_json::from_str(
            r#"{"network":"regtest","withdrawal_fee_sat":1000,"poll_interval_secs":5,"max_delegation_pages":3}"#,
        )
        .unwrap();
        assert_eq!(cfg.network, Network::Regtest);
        assert_eq!(cfg.withdrawal_fee_sat, 1000);
    }
}
