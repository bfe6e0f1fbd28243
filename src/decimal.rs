use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Money in integer minor units (cents, đồng, ...)
///
/// Amounts are never stored as binary fractions. A negative value only ever
/// appears as the result of a signed difference used for consistency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// create from minor units
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// create from major units with the given number of minor units per major unit
    ///
    /// `None` when the product does not fit in minor units.
    pub fn from_major(amount: i64, minor_per_major: i64) -> Option<Self> {
        amount.checked_mul(minor_per_major).map(Money)
    }

    /// underlying minor units
    pub fn as_minor(&self) -> i64 {
        self.0
    }

    /// minor units as a decimal
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// subtraction that refuses to go below zero
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0
            .checked_sub(other.0)
            .filter(|v| *v >= 0)
            .map(Money)
    }

    /// addition that refuses to overflow
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// split into `parts` floor-divided shares; returns (share, last share)
    ///
    /// `share * (parts - 1) + last == self` holds exactly.
    pub fn split_floor(self, parts: u32) -> Option<(Money, Money)> {
        if parts == 0 {
            return None;
        }
        let n = i64::from(parts);
        let share = self.0.div_euclid(n);
        let last = self.0 - share * (n - 1);
        Some((Money(share), Money(last)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Money {
    fn from(i: i64) -> Self {
        Money::from_minor(i)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + *x)
    }
}

/// decimal fraction used for paid shares and thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// whole percent, 10 -> 0.10
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    /// basis points, 999 -> 0.0999
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(10000))
    }

    /// part / whole; zero when whole is zero
    pub fn ratio(part: Money, whole: Money) -> Self {
        if whole.is_zero() {
            return Rate::ZERO;
        }
        Rate(part.as_decimal() / whole.as_decimal())
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_floor_absorbs_remainder() {
        let total = Money::from_minor(100_000_001);
        let (share, last) = total.split_floor(8).unwrap();

        assert_eq!(share, Money::from_minor(12_500_000));
        assert_eq!(last, Money::from_minor(12_500_001));
        assert_eq!(share.as_minor() * 7 + last.as_minor(), total.as_minor());

        assert!(total.split_floor(0).is_none());
    }

    #[test]
    fn test_from_major_refuses_overflow() {
        assert_eq!(Money::from_major(1_500, 100), Some(Money::from_minor(150_000)));
        assert_eq!(Money::from_major(-3, 1_000), Some(Money::from_minor(-3_000)));
        assert!(Money::from_major(i64::MAX / 10, 100).is_none());
        assert!(Money::from_major(i64::MIN, -1).is_none());
    }

    #[test]
    fn test_checked_sub_never_negative() {
        let a = Money::from_minor(500);
        let b = Money::from_minor(700);

        assert_eq!(b.checked_sub(a), Some(Money::from_minor(200)));
        assert_eq!(a.checked_sub(b), None);
        assert!((a - b).is_negative());
    }

    #[test]
    fn test_money_serializes_as_integer() {
        let json = serde_json::to_string(&Money::from_minor(12_500_000)).unwrap();
        assert_eq!(json, "12500000");
    }

    #[test]
    fn test_ratio() {
        let paid = Money::from_minor(25);
        let total = Money::from_minor(100);

        assert_eq!(Rate::ratio(paid, total).as_percentage(), dec!(25));
        assert_eq!(Rate::ratio(paid, Money::ZERO), Rate::ZERO);
        assert_eq!(Rate::from_bps(1000), Rate::from_percentage(10));
    }
}
