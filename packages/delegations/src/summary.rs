use rust_decimal::{Decimal, RoundingStrategy};

use babylon_apis::Delegation;

/// Satoshis per bitcoin, as a decimal scale
const BTC_SCALE: u32 = 8;

/// total_active_staked sums the value of the active delegations, in satoshis
pub fn total_active_staked(delegations: &[Delegation]) -> u64 {
    delegations
        .iter()
        .filter(|d| d.is_active())
        .map(|d| d.staking_value)
        .sum()
}

pub fn satoshi_to_btc(sat: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(sat), BTC_SCALE)
}

/// format_btc renders an amount of satoshis in BTC with at most `max_decimals` decimals,
/// rounding half away from zero and dropping trailing zeros
pub fn format_btc(sat: u64, max_decimals: u32) -> String {
    satoshi_to_btc(sat)
        .round_dp_with_strategy(max_decimals, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}
