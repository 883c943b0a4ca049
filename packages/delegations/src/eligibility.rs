use std::sync::Arc;

use tracing::warn;

use babylon_apis::sources::EligibilitySource;

use crate::error::LifecycleError;

/// EligibilityGate asks the staking API whether a delegation may be unbonded on demand
#[derive(Clone)]
pub struct EligibilityGate {
    source: Arc<dyn EligibilitySource>,
}

impl EligibilityGate {
    pub fn new(source: Arc<dyn EligibilitySource>) -> Self {
        EligibilityGate { source }
    }

    /// is_eligible treats a failed query as not eligible
    pub async fn is_eligible(&self, staking_tx_hash_hex: &str) -> bool {
        match self.source.fetch_eligible(staking_tx_hash_hex).await {
            Ok(eligible) => eligible,
            Err(e) => {
                warn!(
                    staking_tx_hash = staking_tx_hash_hex,
                    error = %e,
                    "unbonding eligibility query failed"
                );
                false
            }
        }
    }

    pub async fn ensure_eligible(&self, staking_tx_hash_hex: &str) -> Result<(), LifecycleError> {
        if self.is_eligible(staking_tx_hash_hex).await {
            Ok(())
        } else {
            Err(LifecycleError::NotEligible(staking_tx_hash_hex.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babylon_apis::error::SourceError;
    use test_utils::mocks::MockEligibility;

    #[tokio::test]
    async fn eligible_delegation_passes() {
        let source = Arc::new(MockEligibility::new(true));
        let gate = EligibilityGate::new(source.clone());
        gate.ensure_eligible("a").await.unwrap();
        assert_eq!(*source.queried.lock(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn ineligible_or_failing_query_is_rejected() {
        let source = Arc::new(MockEligibility::new(false));
        let gate = EligibilityGate::new(source.clone());
        assert_eq!(
            gate.ensure_eligible("a").await,
            Err(LifecycleError::NotEligible("a".to_string()))
        );

        *source.eligible.lock() = true;
        source.fail_with(SourceError::Unavailable("timeout".to_string()));
        assert!(!gate.is_eligible("a").await);
        assert_eq!(
            gate.ensure_eligible("a").await,
            Err(LifecycleError::NotEligible("a".to_string()))
        );
    }
}
