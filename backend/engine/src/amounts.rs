//! Linked ETH/USD amount fields.
//!
//! Whichever field the user edited last is authoritative; only the other one
//! is ever recomputed.  `last_edited` is set synchronously by every edit
//! operation and doubles as the ownership token between user edits and the
//! background price refresher.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::{EngineError, Result};

pub const USD_DECIMALS: u32 = 2;
pub const ETH_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditedField {
    Eth,
    Usd,
    #[default]
    None,
}

/// The two user-editable amount fields, kept as the strings the user typed
/// (or the formatted derived value).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmountPair {
    pub eth: String,
    pub usd: String,
    pub last_edited: EditedField,
}

impl AmountPair {
    /// The user typed into the ETH field.  The USD field is recomputed from
    /// the current rate; with no usable rate it is left untouched.
    pub fn on_eth_changed(&mut self, new_eth: &str, rate: Option<Decimal>) -> Result<()> {
        let parsed = parse_amount(new_eth)?;
        let derived = match (parsed, usable(rate)) {
            (Some(eth), Some(rate)) => Some(eth_to_usd(eth, rate)?),
            _ => None,
        };

        self.eth = new_eth.trim().to_string();
        self.last_edited = EditedField::Eth;
        match (parsed, derived) {
            (None, _) => self.usd.clear(),
            (Some(_), Some(usd)) => self.usd = format_fixed(usd, USD_DECIMALS),
            (Some(_), None) => {}
        }
        Ok(())
    }

    /// The user typed into the USD field.  Mirror image of `on_eth_changed`.
    pub fn on_usd_changed(&mut self, new_usd: &str, rate: Option<Decimal>) -> Result<()> {
        let parsed = parse_amount(new_usd)?;
        let derived = match (parsed, usable(rate)) {
            (Some(usd), Some(rate)) => Some(usd_to_eth(usd, rate)?),
            _ => None,
        };

        self.usd = new_usd.trim().to_string();
        self.last_edited = EditedField::Usd;
        match (parsed, derived) {
            (None, _) => self.eth.clear(),
            (Some(_), Some(eth)) => self.eth = format_fixed(eth, ETH_DECIMALS),
            (Some(_), None) => {}
        }
        Ok(())
    }

    /// A new rate arrived.  Recomputes only the derived side; a pair that was
    /// never edited is left alone.
    pub fn reprice(&mut self, rate: Option<Decimal>) {
        let Some(rate) = usable(rate) else {
            return;
        };
        match self.last_edited {
            EditedField::Eth => {
                if let Ok(Some(eth)) = parse_amount(&self.eth) {
                    if let Ok(usd) = eth_to_usd(eth, rate) {
                        self.usd = format_fixed(usd, USD_DECIMALS);
                    }
                }
            }
            EditedField::Usd => {
                if let Ok(Some(usd)) = parse_amount(&self.usd) {
                    if let Ok(eth) = usd_to_eth(usd, rate) {
                        self.eth = format_fixed(eth, ETH_DECIMALS);
                    }
                }
            }
            EditedField::None => {}
        }
    }

    /// Seed both fields from the reference donation once a rate is known.
    /// A pair the user already touched is never clobbered.
    pub fn set_default(&mut self, reference_usd: Decimal, rate: Option<Decimal>) -> bool {
        if self.last_edited != EditedField::None || !self.eth.is_empty() || !self.usd.is_empty() {
            return false;
        }
        let Some(rate) = usable(rate) else {
            return false;
        };
        let Ok(eth) = usd_to_eth(reference_usd, rate) else {
            return false;
        };
        self.eth = format_fixed(eth, ETH_DECIMALS);
        self.usd = format_fixed(reference_usd, USD_DECIMALS);
        true
    }

    /// Clear both fields (after a successful donation, or on demand).
    pub fn reset(&mut self) {
        self.eth.clear();
        self.usd.clear();
        self.last_edited = EditedField::None;
    }

    /// The ETH field as a number, when it currently holds a valid amount.
    pub fn eth_value(&self) -> Option<Decimal> {
        parse_amount(&self.eth).ok().flatten()
    }
}

/// Parse a user-supplied amount.  `Ok(None)` for empty input; negative and
/// non-numeric input is rejected so it can never reach a derived field or a
/// transaction value.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: Decimal = trimmed
        .parse()
        .map_err(|_| EngineError::InvalidAmount(format!("not a decimal number: {trimmed:?}")))?;
    if value.is_sign_negative() {
        return Err(EngineError::InvalidAmount(format!(
            "amount must not be negative: {trimmed}"
        )));
    }
    Ok(Some(value))
}

fn usable(rate: Option<Decimal>) -> Option<Decimal> {
    rate.filter(|r| *r > Decimal::ZERO)
}

pub fn eth_to_usd(eth: Decimal, rate: Decimal) -> Result<Decimal> {
    eth.checked_mul(rate)
        .map(|usd| usd.round_dp_with_strategy(USD_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
}

pub fn usd_to_eth(usd: Decimal, rate: Decimal) -> Result<Decimal> {
    usd.checked_div(rate)
        .map(|eth| eth.round_dp_with_strategy(ETH_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| EngineError::InvalidAmount("amount out of range".to_string()))
}

/// Round and zero-pad to a fixed number of decimal places, like `toFixed`.
pub fn format_fixed(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.prec$}", prec = decimals as usize)
}

/// Convert an ETH amount string into wei by an exact 18-decimal shift.
/// This is what crosses the transaction boundary — never the 6 dp display
/// rounding.
pub fn to_wei(eth: &str) -> Result<u128> {
    let trimmed = eth.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAmount("empty amount".to_string()));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(EngineError::InvalidAmount(format!(
            "not a decimal number: {trimmed:?}"
        )));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(EngineError::InvalidAmount(format!(
            "not a non-negative decimal number: {trimmed:?}"
        )));
    }
    if frac_part.len() > 18 {
        return Err(EngineError::InvalidAmount(format!(
            "more than 18 decimal places: {trimmed}"
        )));
    }

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))?
    };

    let mut frac = frac_part.to_string();
    while frac.len() < 18 {
        frac.push('0');
    }
    let frac_value: u128 = frac.parse().unwrap_or(0);

    int_value
        .checked_mul(10u128.pow(18))
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
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
    fn eth_edit_derives_usd() {
        let mut pair = AmountPair::default();
        pair.on_eth_changed("1", Some(dec("2500"))).unwrap();
        assert_eq!(pair.eth, "1");
        assert_eq!(pair.usd, "2500.00");
        assert_eq!(pair.last_edited, EditedField::Eth);
    }

    #[test]
    fn usd_edit_derives_eth() {
        let mut pair = AmountPair::default();
        pair.on_usd_changed("0.50", Some(dec("2500"))).unwrap();
        assert_eq!(pair.usd, "0.50");
        assert_eq!(pair.eth, "0.000200");
        assert_eq!(pair.last_edited, EditedField::Usd);
    }

    #[test]
    fn round_trip_recovers_eth_within_tolerance() {
        let rate = dec("1234.56");
        let original = dec("0.2");

        let mut pair = AmountPair::default();
        pair.on_eth_changed("0.2", Some(rate)).unwrap();
        let usd = pair.usd.clone();
        pair.on_usd_changed(&usd, Some(rate)).unwrap();

        let recovered: Decimal = pair.eth.parse().unwrap();
        // Half a cent of USD rounding plus one unit at 6 dp.
        let tolerance = dec("0.005") / rate + dec("0.000001");
        assert!((recovered - original).abs() <= tolerance, "{recovered}");
    }

    #[test]
    fn empty_input_clears_derived_field() {
        let mut pair = AmountPair::default();
        pair.on_eth_changed("1", Some(dec("2500"))).unwrap();
        pair.on_eth_changed("", Some(dec("2500"))).unwrap();
        assert_eq!(pair.eth, "");
        assert_eq!(pair.usd, "");
    }

    #[test]
    fn invalid_input_rejected_and_pair_untouched() {
        let mut pair = AmountPair::default();
        pair.on_eth_changed("0.1", Some(dec("2500"))).unwrap();
        let before = pair.clone();

        assert!(pair.on_eth_changed("abc", Some(dec("2500"))).is_err());
        assert!(pair.on_eth_changed("-1", Some(dec("2500"))).is_err());
        assert!(pair.on_usd_changed("1e5", Some(dec("2500"))).is_err());
        assert_eq!(pair, before);
    }

    #[test]
    fn usd_edit_with_no_rate_leaves_eth_alone() {
        let mut pair = AmountPair {
            eth: "0.123".to_string(),
            usd: String::new(),
            last_edited: EditedField::Eth,
        };
        pair.on_usd_changed("10", None).unwrap();
        assert_eq!(pair.eth, "0.123");
        assert_eq!(pair.usd, "10");

        pair.on_usd_changed("10", Some(Decimal::ZERO)).unwrap();
        assert_eq!(pair.eth, "0.123");
    }

    #[test]
    fn reprice_never_touches_the_edited_field() {
        let mut pair = AmountPair::default();
        pair.on_eth_changed("0.1", Some(dec("2500"))).unwrap();
        assert_eq!(pair.usd, "250.00");

        pair.reprice(Some(dec("3000")));
        assert_eq!(pair.eth, "0.1");
        assert_eq!(pair.usd, "300.00");

        pair.on_usd_changed("300.00", Some(dec("3000"))).unwrap();
        pair.reprice(Some(dec("2000")));
        assert_eq!(pair.usd, "300.00");
        assert_eq!(pair.eth, "0.150000");
    }

    #[test]
    fn reprice_is_a_noop_before_any_edit() {
        let mut pair = AmountPair::default();
        pair.reprice(Some(dec("2500")));
        assert_eq!(pair, AmountPair::default());
    }

    #[test]
    fn default_seeding_happens_once() {
        let mut pair = AmountPair::default();
        assert!(!pair.set_default(dec("0.50"), None));
        assert!(pair.set_default(dec("0.50"), Some(dec("2500"))));
        assert_eq!(pair.eth, "0.000200");
        assert_eq!(pair.usd, "0.50");

        // Already seeded: no second seeding.
        assert!(!pair.set_default(dec("0.50"), Some(dec("3000"))));
        assert_eq!(pair.eth, "0.000200");
    }

    #[test]
    fn default_seeding_never_clobbers_a_user_edit() {
        let mut pair = AmountPair::default();
        pair.on_eth_changed("0.05", Some(dec("2500"))).unwrap();
        assert!(!pair.set_default(dec("0.50"), Some(dec("2500"))));
        assert_eq!(pair.eth, "0.05");
    }

    #[test]
    fn reset_clears_everything() {
        let mut pair = AmountPair::default();
        pair.on_eth_changed("0.05", Some(dec("2500"))).unwrap();
        pair.reset();
        assert_eq!(pair, AmountPair::default());
    }

    #[test]
    fn wei_conversion_is_an_exact_shift() {
        assert_eq!(to_wei("1").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(to_wei("0.000001").unwrap(), 1_000_000_000_000);
        assert_eq!(to_wei(".5").unwrap(), 500_000_000_000_000_000);
        assert_eq!(to_wei("1.").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(
            to_wei("0.123456789012345678").unwrap(),
            123_456_789_012_345_678
        );
    }

    #[test]
    fn wei_conversion_rejects_garbage() {
        assert!(to_wei("").is_err());
        assert!(to_wei(".").is_err());
        assert!(to_wei("-1").is_err());
        assert!(to_wei("abc").is_err());
        assert!(to_wei("1.0000000000000000001").is_err()); // 19 decimal places
        assert!(to_wei("999999999999999999999999999999999999999").is_err());
    }

    #[test]
    fn fixed_formatting_pads_and_rounds() {
        assert_eq!(format_fixed(dec("2500"), 2), "2500.00");
        assert_eq!(format_fixed(dec("0.005"), 2), "0.01");
        assert_eq!(format_fixed(dec("0.1234567"), 6), "0.123457");
    }
}
