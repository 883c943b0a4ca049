use std::collections::HashSet;

use tracing::{debug, warn};

use babylon_apis::error::SourceError;
use babylon_apis::sources::DelegationSource;
use babylon_apis::{Delegation, Validate};

/// fetch_all_delegations follows the page keys of the owner's delegations until the last
/// page. It stops early after `max_pages` pages or when a page key repeats.
pub async fn fetch_all_delegations(
    source: &dyn DelegationSource,
    owner_pk_hex: &str,
    max_pages: u32,
) -> Result<Vec<Delegation>, SourceError> {
    let mut delegations = vec![];
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut page_key: Option<String> = None;

    for page_num in 1..=max_pages {
        let page = source.fetch_page(owner_pk_hex, page_key.as_deref()).await?;
        debug!(
            owner = owner_pk_hex,
            page = page_num,
            count = page.delegations.len(),
            "fetched delegations page"
        );
        delegations.extend(page.delegations);

        if page.next_key.is_empty() {
            return Ok(delegations);
        }
        if !seen_keys.insert(page.next_key.clone()) {
            warn!(
                owner = owner_pk_hex,
                next_key = %page.next_key,
                "delegations page key repeated, stopping"
            );
            return Ok(delegations);
        }
        page_key = Some(page.next_key);
    }

    warn!(
        owner = owner_pk_hex,
        max_pages, "delegations page limit reached, stopping"
    );
    Ok(delegations)
}

/// valid_delegations drops the delegations failing validation
pub fn valid_delegations(delegations: Vec<Delegation>) -> Vec<Delegation> {
    delegations
        .into_iter()
        .filter(|d| match d.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    staking_tx_hash = %d.staking_tx_hash_hex,
                    error = %e,
                    "skipping invalid delegation"
                );
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use babylon_apis::{DelegationState, DelegationsPage};
    use test_utils::mocks::MockDelegationSource;
    use test_utils::new_delegation;

    fn delegations(n: u8) -> Vec<Delegation> {
        (0..n)
            .map(|i| new_delegation(10_000 + u64::from(i), i, DelegationState::Active))
            .collect()
    }

    #[tokio::test]
    async fn follows_page_keys_until_the_last_page() {
        let source = MockDelegationSource::default();
        source.set_delegations(delegations(5), 2);

        let all = fetch_all_delegations(&source, "owner", 100).await.unwrap();
        assert_eq!(all, delegations(5));
        assert_eq!(
            *source.requested_keys.lock(),
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[tokio::test]
    async fn stops_at_the_page_limit() {
        let source = MockDelegationSource::default();
        source.set_delegations(delegations(5), 1);

        let all = fetch_all_delegations(&source, "owner", 3).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(source.requested_keys.lock().len(), 3);
    }

    #[tokio::test]
    async fn stops_on_a_repeated_key() {
        let dels = delegations(2);
        let source = MockDelegationSource::default();
        source.set_pages(vec![
            DelegationsPage {
                delegations: vec![dels[0].clone()],
                next_key: "1".to_string(),
            },
            DelegationsPage {
                delegations: vec![dels[1].clone()],
                next_key: "1".to_string(),
            },
        ]);

        let all = fetch_all_delegations(&source, "owner", 100).await.unwrap();
        assert_eq!(all, dels);
        assert_eq!(source.requested_keys.lock().len(), 2);
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let source = MockDelegationSource::new(delegations(1));
        source.fail_with(SourceError::Unavailable("down".to_string()));
        assert_eq!(
            fetch_all_delegations(&source, "owner", 100).await,
            Err(SourceError::Unavailable("down".to_string()))
        );
    }

    #[test]
    fn invalid_delegations_are_skipped() {
        let mut dels = delegations(3);
        dels[1].staking_tx_hash_hex = "short".to_string();
        let valid = valid_delegations(dels.clone());
        assert_eq!(valid, vec![dels[0].clone(), dels[2].clone()]);
    }
}
