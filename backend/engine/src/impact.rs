//! Motivational impact figures derived from a USD donation amount.
//!
//! The meals-per-day and days selectors are enumerated option sets, so the
//! students-fed denominator can never reach zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::amounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealsPerDay {
    One,
    Two,
}

impl MealsPerDay {
    pub fn from_count(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    pub fn count(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Days {
    One,
    Two,
}

impl Days {
    pub fn from_count(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    pub fn count(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// How many students the amount feeds at `meal_cost_usd` per meal.
/// Empty, zero, or unparseable input yields 0 — never an error.
pub fn students_fed(usd: &str, meal_cost_usd: Decimal, meals: MealsPerDay, days: Days) -> u64 {
    let Some(usd) = amounts::parse_amount(usd).ok().flatten() else {
        return 0;
    };
    let denominator = meal_cost_usd * Decimal::from(meals.count()) * Decimal::from(days.count());
    if denominator <= Decimal::ZERO {
        return 0;
    }
    usd.checked_div(denominator)
        .and_then(|d| d.floor().to_u64())
        .unwrap_or(0)
}

/// What else the amount buys, at the campaign's fixed unit costs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactBreakdown {
    /// $0.10 per snack bag
    pub snack_bags: u64,
    /// $200 per refurbished laptop
    pub laptops: u64,
    /// $50 per coding class
    pub coding_classes: u64,
    /// $25 per month of internet access
    pub internet_months: u64,
}

pub fn impact_breakdown(usd: &str) -> ImpactBreakdown {
    let Some(usd) = amounts::parse_amount(usd).ok().flatten() else {
        return ImpactBreakdown::default();
    };
    let floor = |d: Option<Decimal>| d.and_then(|d| d.floor().to_u64()).unwrap_or(0);
    ImpactBreakdown {
        snack_bags: floor(usd.checked_mul(Decimal::from(10))),
        laptops: floor(usd.checked_div(Decimal::from(200))),
        coding_classes: floor(usd.checked_div(Decimal::from(50))),
        internet_months: floor(usd.checked_div(Decimal::from(25))),
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cost() -> Decimal {
        "0.5".parse().unwrap()
    }

    #[test]
    fn one_reference_donation_feeds_one_student() {
        assert_eq!(students_fed("0.5", cost(), MealsPerDay::One, Days::One), 1);
    }

    #[test]
    fn empty_and_invalid_input_feed_nobody() {
        assert_eq!(students_fed("", cost(), MealsPerDay::One, Days::One), 0);
        assert_eq!(students_fed("abc", cost(), MealsPerDay::One, Days::One), 0);
        assert_eq!(students_fed("-5", cost(), MealsPerDay::One, Days::One), 0);
        assert_eq!(students_fed("0", cost(), MealsPerDay::One, Days::One), 0);
    }

    #[test]
    fn more_meals_and_days_divide_the_count() {
        assert_eq!(students_fed("5", cost(), MealsPerDay::One, Days::One), 10);
        assert_eq!(students_fed("5", cost(), MealsPerDay::Two, Days::One), 5);
        assert_eq!(students_fed("5", cost(), MealsPerDay::Two, Days::Two), 2);
    }

    #[test]
    fn option_sets_reject_other_counts() {
        assert_eq!(MealsPerDay::from_count(2), Some(MealsPerDay::Two));
        assert_eq!(MealsPerDay::from_count(0), None);
        assert_eq!(MealsPerDay::from_count(3), None);
        assert_eq!(Days::from_count(1), Some(Days::One));
        assert_eq!(Days::from_count(0), None);
    }

    #[test]
    fn breakdown_uses_fixed_unit_costs() {
        let breakdown = impact_breakdown("100");
        assert_eq!(breakdown.snack_bags, 1000);
        assert_eq!(breakdown.laptops, 0);
        assert_eq!(breakdown.coding_classes, 2);
        assert_eq!(breakdown.internet_months, 4);

        assert_eq!(impact_breakdown(""), ImpactBreakdown::default());
    }
}
