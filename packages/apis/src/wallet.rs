use async_trait::async_trait;

use babylon_bitcoin::chain_params::Network;
use babylon_bitcoin::public_key_no_coord;

use crate::error::SignerError;
use crate::sources::Signer;

const NATIVE_SEGWIT_ADDRESS_LEN: usize = 42;
const TAPROOT_ADDRESS_LEN: usize = 62;

/// is_supported_address_type returns whether the address is native segwit or taproot,
/// the only address types staking supports
pub fn is_supported_address_type(address: &str) -> bool {
    address.len() == NATIVE_SEGWIT_ADDRESS_LEN || address.len() == TAPROOT_ADDRESS_LEN
}

pub fn is_taproot(address: &str) -> bool {
    address.len() == TAPROOT_ADDRESS_LEN
}

/// Called with the new address whenever the user switches accounts in the wallet
pub type AccountChangeListener = Box<dyn Fn(&str) + Send + Sync>;

/// WalletProvider is the capability set every wallet integration exposes
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<(), SignerError>;

    async fn address(&self) -> Result<String, SignerError>;

    /// public_key_hex returns the compressed public key of the connected account
    async fn public_key_hex(&self) -> Result<String, SignerError>;

    async fn sign_psbt(&self, psbt_hex: &str) -> Result<String, SignerError>;

    async fn sign_psbts(&self, psbts_hex: &[String]) -> Result<Vec<String>, SignerError> {
        let mut signed = Vec::with_capacity(psbts_hex.len());
        for psbt_hex in psbts_hex {
            signed.push(self.sign_psbt(psbt_hex).await?);
        }
        Ok(signed)
    }

    async fn sign_message(&self, message: &str) -> Result<String, SignerError>;

    async fn network(&self) -> Result<Network, SignerError>;

    fn on_account_change(&self, listener: AccountChangeListener);

    async fn is_supported_address_type(&self) -> Result<bool, SignerError> {
        Ok(is_supported_address_type(&self.address().await?))
    }

    async fn is_taproot(&self) -> Result<bool, SignerError> {
        Ok(is_taproot(&self.address().await?))
    }

    /// public_key_no_coord returns the x-only public key of the connected account in hex
    async fn public_key_no_coord(&self) -> Result<String, SignerError> {
        let pk_hex = self.public_key_hex().await?;
        public_key_no_coord(&pk_hex).map_err(|e| SignerError::Other(e.to_string()))
    }
}

/// Any wallet can sign the engine's transactions
#[async_trait]
impl<W: WalletProvider + ?Sized> Signer for W {
    async fn sign(&self, unsigned_psbt_hex: &str) -> Result<String, SignerError> {
        self.sign_psbt(unsigned_psbt_hex).await
    }
}

/// EnvironmentProbe reports which wallet integrations the host environment exposes
pub trait EnvironmentProbe {
    fn has_feature(&self, flag: &str) -> bool;
}

type WalletFactory = Box<dyn Fn() -> Box<dyn WalletProvider> + Send + Sync>;

struct WalletEntry {
    flag: String,
    name: String,
    factory: WalletFactory,
}

/// WalletRegistry picks the wallet integration to use from the features present in the
/// environment. Entries are tried in registration order.
#[derive(Default)]
pub struct WalletRegistry {
    entries: Vec<WalletEntry>,
    fallback: Option<WalletFactory>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, flag: &str, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn WalletProvider> + Send + Sync + 'static,
    {
        self.entries.push(WalletEntry {
            flag: flag.to_string(),
            name: name.to_string(),
            factory: Box::new(factory),
        });
        self
    }

    /// with_fallback sets the wallet used when no registered feature is present
    pub fn with_fallback<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn WalletProvider> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(factory));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn select(&self, probe: &dyn EnvironmentProbe) -> Option<Box<dyn WalletProvider>> {
        self.entries
            .iter()
            .find(|entry| probe.has_feature(&entry.flag))
            .map(|entry| (entry.factory)())
            .or_else(|| self.fallback.as_ref().map(|factory| factory()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct StaticWallet {
        name: &'static str,
        address: &'static str,
    }

    #[async_trait]
    impl WalletProvider for StaticWallet {
        fn name(&self) -> &str {
            self.name
        }

        async fn connect(&self) -> Result<(), SignerError> {
            Ok(())
        }

        async fn address(&self) -> Result<String, SignerError> {
            Ok(self.address.to_string())
        }

        async fn public_key_hex(&self) -> Result<String, SignerError> {
            Ok("0250929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0".to_string())
        }

        async fn sign_psbt(&self, psbt_hex: &str) -> Result<String, SignerError> {
            Ok(format!("signed:{psbt_hex}"))
        }

        async fn sign_message(&self, _message: &str) -> Result<String, SignerError> {
            Err(SignerError::UserRejected)
        }

        async fn network(&self) -> Result<Network, SignerError> {
            Ok(Network::Signet)
        }

        fn on_account_change(&self, _listener: AccountChangeListener) {}
    }

    struct Flags(HashSet<&'static str>);

    impl EnvironmentProbe for Flags {
        fn has_feature(&self, flag: &str) -> bool {
            self.0.contains(flag)
        }
    }

    fn registry() -> WalletRegistry {
        WalletRegistry::new()
            .register("okxwallet", "OKX Wallet", || {
                Box::new(StaticWallet {
                    name: "OKX Wallet",
                    address: "tb1q",
                })
            })
            .register("tomo_btc", "Tomo", || {
                Box::new(StaticWallet {
                    name: "Tomo",
                    address: "tb1p",
                })
            })
            .with_fallback(|| {
                Box::new(StaticWallet {
                    name: "Injected",
                    address: "tb1p",
                })
            })
    }

    #[test]
    fn address_types() {
        let segwit = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
        let taproot = "tb1pqqqqp399et2xygdj5xreqhjjvcmzhxw4aywxecjdzew6hylgvsesf3hn0c";
        assert_eq!(segwit.len(), 42);
        assert_eq!(taproot.len(), 62);
        assert!(is_supported_address_type(segwit));
        assert!(is_supported_address_type(taproot));
        assert!(!is_taproot(segwit));
        assert!(is_taproot(taproot));
        assert!(!is_supported_address_type("mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn"));
    }

    #[test]
    fn registry_picks_the_first_present_feature() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["OKX Wallet", "Tomo"]);

        let wallet = registry
            .select(&Flags(HashSet::from(["tomo_btc", "okxwallet"])))
            .unwrap();
        assert_eq!(wallet.name(), "OKX Wallet");

        let wallet = registry.select(&Flags(HashSet::from(["tomo_btc"]))).unwrap();
        assert_eq!(wallet.name(), "Tomo");

        let wallet = registry.select(&Flags(HashSet::new())).unwrap();
        assert_eq!(wallet.name(), "Injected");

        assert!(WalletRegistry::new()
            .select(&Flags(HashSet::new()))
            .is_none());
    }

    #[tokio::test]
    async fn wallet_helpers_and_signer_adapter() {
        let wallet = StaticWallet {
            name: "Tomo",
            address: "tb1pqqqqp399et2xygdj5xreqhjjvcmzhxw4aywxecjdzew6hylgvsesf3hn0c",
        };
        assert!(wallet.is_taproot().await.unwrap());
        assert!(wallet.is_supported_address_type().await.unwrap());
        assert_eq!(
            wallet.public_key_no_coord().await.unwrap(),
            "50929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0"
        );
        assert_eq!(
            wallet
                .sign_psbts(&["aa".to_string(), "bb".to_string()])
                .await
                .unwrap(),
            vec!["signed:aa".to_string(), "signed:bb".to_string()]
        );

        let signer: &dyn Signer = &wallet;
        assert_eq!(signer.sign("cc").await.unwrap(), "signed:cc");
    }
}
