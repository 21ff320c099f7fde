//! Campaign progress math — pure functions, no I/O.

use rust_decimal::{Decimal, RoundingStrategy};

/// Progress toward the fundraising goal.  `Unknown` until both the on-chain
/// total and a price quote have been obtained; a missing input must read as
/// "loading", never as 0 %.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignProgress {
    Unknown,
    Known {
        total_eth: Decimal,
        total_usd: Decimal,
        /// Clamped to `[0, 100]` even when the goal is exceeded.
        percent_complete: Decimal,
        deposit_count: Option<u64>,
    },
}

pub fn compute_progress(
    total_eth: Option<Decimal>,
    rate: Option<Decimal>,
    goal_usd: Decimal,
    deposit_count: Option<u64>,
) -> CampaignProgress {
    let (Some(total_eth), Some(rate)) = (total_eth, rate) else {
        return CampaignProgress::Unknown;
    };
    if goal_usd <= Decimal::ZERO {
        return CampaignProgress::Unknown;
    }
    let Some(total_usd) = total_eth.checked_mul(rate) else {
        return CampaignProgress::Unknown;
    };

    let percent = total_usd
        .checked_div(goal_usd)
        .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
        // Overflow can only mean far past the goal.
        .unwrap_or(Decimal::ONE_HUNDRED)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    CampaignProgress::Known {
        total_eth,
        total_usd: total_usd.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        percent_complete: percent,
        deposit_count,
    }
}

/// Two-decimal, thousands-separated figure, e.g. `1,234.56`.
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{rounded:.2}");
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn percent_is_clamped_when_goal_exceeded() {
        // 10 ETH at 1000 USD/ETH against a 3000 USD goal is 333 %, shown as 100 %.
        let progress = compute_progress(Some(dec("10")), Some(dec("1000")), dec("3000"), Some(4));
        match progress {
            CampaignProgress::Known {
                percent_complete,
                total_usd,
                ..
            } => {
                assert_eq!(percent_complete, dec("100"));
                assert_eq!(total_usd, dec("10000.00"));
            }
            CampaignProgress::Unknown => panic!("expected known progress"),
        }
    }

    #[test]
    fn partial_progress() {
        let progress = compute_progress(Some(dec("0.1")), Some(dec("3000")), dec("3000"), Some(2));
        match progress {
            CampaignProgress::Known {
                percent_complete,
                total_eth,
                deposit_count,
                ..
            } => {
                assert_eq!(percent_complete, dec("10.00"));
                assert_eq!(total_eth, dec("0.1"));
                assert_eq!(deposit_count, Some(2));
            }
            CampaignProgress::Unknown => panic!("expected known progress"),
        }
    }

    #[test]
    fn missing_inputs_are_unknown_not_zero() {
        assert_eq!(
            compute_progress(None, Some(dec("2500")), dec("3000"), Some(1)),
            CampaignProgress::Unknown
        );
        assert_eq!(
            compute_progress(Some(dec("1")), None, dec("3000"), None),
            CampaignProgress::Unknown
        );
    }

    #[test]
    fn zero_total_is_known_zero_percent() {
        let progress = compute_progress(Some(dec("0")), Some(dec("2500")), dec("3000"), Some(0));
        match progress {
            CampaignProgress::Known {
                percent_complete, ..
            } => assert_eq!(percent_complete, dec("0.00")),
            CampaignProgress::Unknown => panic!("expected known progress"),
        }
    }

    #[test]
    fn usd_formatting() {
        assert_eq!(format_usd(dec("0")), "0.00");
        assert_eq!(format_usd(dec("3000")), "3,000.00");
        assert_eq!(format_usd(dec("1234567.891")), "1,234,567.89");
        assert_eq!(format_usd(dec("999.999")), "1,000.00");
        assert_eq!(format_usd(dec("0.005")), "0.01");
        assert_eq!(format_usd(dec("0.001")), "0.00");
    }
}
