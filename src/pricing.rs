use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Fraction of the total collected at booking time; the rest is paid in cash
/// at the shoot.
pub const DEPOSIT_FRACTION: f64 = 0.30;

/// Winter-sale discount applied to bookings dated Dec 1 - Jan 31.
const WINTER_DISCOUNT_PCT: f64 = 15.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageId {
    Essential,
    Premium,
    Luxury,
    Rooftop,
}

impl PackageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageId::Essential => "essential",
            PackageId::Premium => "premium",
            PackageId::Luxury => "luxury",
            PackageId::Rooftop => "rooftop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "essential" => Some(PackageId::Essential),
            "premium" => Some(PackageId::Premium),
            "luxury" => Some(PackageId::Luxury),
            "rooftop" => Some(PackageId::Rooftop),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PackageId::Essential => "Essential Photoshoot",
            PackageId::Premium => "Premium Photoshoot",
            PackageId::Luxury => "Luxury Photoshoot",
            PackageId::Rooftop => "Rooftop Group Photoshoot",
        }
    }

    /// Base price in EUR. For the rooftop package this is the per-person rate.
    pub fn base_price(&self) -> f64 {
        match self {
            PackageId::Essential => 150.0,
            PackageId::Premium => 250.0,
            PackageId::Luxury => 400.0,
            PackageId::Rooftop => 80.0,
        }
    }

    /// The rooftop shoot is billed per head; everything else is a flat rate.
    pub fn is_per_person(&self) -> bool {
        matches!(self, PackageId::Rooftop)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub base_price: f64,
    pub discount_percentage: f64,
    pub is_discounted: bool,
    /// Total amount for the booking (per-person packages multiplied out).
    pub price: f64,
    pub deposit_amount: f64,
    pub display_name: &'static str,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("unknown package id")]
    UnknownPackage,

    #[error("people count is required for the rooftop package")]
    MissingPeopleCount,

    #[error("people count must be between 1 and 10")]
    PeopleCountOutOfRange,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn in_winter_window(date: NaiveDate) -> bool {
    matches!(date.month(), 12 | 1)
}

/// Deterministic price quote for (package, date, people count). The handlers
/// recompute this server-side and compare against client-submitted amounts,
/// so any change here changes what the API accepts.
pub fn quote(
    package: PackageId,
    date: NaiveDate,
    people_count: Option<i64>,
) -> Result<Quote, PricingError> {
    let people = if package.is_per_person() {
        let n = people_count.ok_or(PricingError::MissingPeopleCount)?;
        if !(1..=10).contains(&n) {
            return Err(PricingError::PeopleCountOutOfRange);
        }
        n
    } else {
        1
    };

    let base = package.base_price();
    let discounted = in_winter_window(date);
    let discount_pct = if discounted { WINTER_DISCOUNT_PCT } else { 0.0 };
    let unit = round2(base * (1.0 - discount_pct / 100.0));
    let total = round2(unit * people as f64);

    Ok(Quote {
        base_price: base,
        discount_percentage: discount_pct,
        is_discounted: discounted,
        price: total,
        deposit_amount: round2(total * DEPOSIT_FRACTION),
        display_name: package.display_name(),
    })
}

/// Amounts within one cent are considered equal when re-validating
/// client-submitted figures.
pub fn amounts_match(expected: f64, submitted: f64) -> bool {
    (expected - submitted).abs() <= 0.01
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn essential_off_season_deposit_is_45() {
        let q = quote(PackageId::Essential, d("2025-06-15"), None).unwrap();
        assert_eq!(q.base_price, 150.0);
        assert!(!q.is_discounted);
        assert_eq!(q.price, 150.0);
        assert_eq!(q.deposit_amount, 45.0);
    }

    #[test]
    fn winter_window_applies_discount() {
        let q = quote(PackageId::Premium, d("2025-12-24"), None).unwrap();
        assert!(q.is_discounted);
        assert_eq!(q.discount_percentage, 15.0);
        assert_eq!(q.price, 212.5);
        assert_eq!(q.deposit_amount, 63.75);

        let jan = quote(PackageId::Premium, d("2026-01-31"), None).unwrap();
        assert!(jan.is_discounted);

        let feb = quote(PackageId::Premium, d("2026-02-01"), None).unwrap();
        assert!(!feb.is_discounted);
    }

    #[test]
    fn rooftop_multiplies_per_person() {
        let q = quote(PackageId::Rooftop, d("2025-06-15"), Some(4)).unwrap();
        assert_eq!(q.price, 320.0);
        assert_eq!(q.deposit_amount, 96.0);
    }

    #[test]
    fn rooftop_requires_people_count() {
        assert_eq!(
            quote(PackageId::Rooftop, d("2025-06-15"), None),
            Err(PricingError::MissingPeopleCount)
        );
    }

    #[test]
    fn rooftop_people_count_bounds() {
        assert!(quote(PackageId::Rooftop, d("2025-06-15"), Some(1)).is_ok());
        assert!(quote(PackageId::Rooftop, d("2025-06-15"), Some(10)).is_ok());
        assert_eq!(
            quote(PackageId::Rooftop, d("2025-06-15"), Some(0)),
            Err(PricingError::PeopleCountOutOfRange)
        );
        assert_eq!(
            quote(PackageId::Rooftop, d("2025-06-15"), Some(11)),
            Err(PricingError::PeopleCountOutOfRange)
        );
    }

    #[test]
    fn people_count_ignored_for_flat_packages() {
        let q = quote(PackageId::Luxury, d("2025-06-15"), Some(7)).unwrap();
        assert_eq!(q.price, 400.0);
    }

    #[test]
    fn quote_is_deterministic() {
        let a = quote(PackageId::Rooftop, d("2025-12-05"), Some(3)).unwrap();
        let b = quote(PackageId::Rooftop, d("2025-12-05"), Some(3)).unwrap();
        assert_eq!(a.price, b.price);
        assert_eq!(a.deposit_amount, b.deposit_amount);
        assert_eq!(a.discount_percentage, b.discount_percentage);
    }

    #[test]
    fn amounts_match_uses_cent_epsilon() {
        assert!(amounts_match(45.0, 45.0));
        assert!(amounts_match(45.0, 45.01));
        assert!(amounts_match(45.0, 44.99));
        assert!(!amounts_match(45.0, 44.5));
        assert!(!amounts_match(45.0, 45.02));
    }
}
