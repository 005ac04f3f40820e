use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of micro-units in one whole currency unit.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// The largest difference between an asserted and an expected amount that still counts as a match (0.01 units).
pub const AMOUNT_TOLERANCE: Money = Money(10_000);

//--------------------------------------       Money         ---------------------------------------------------------
/// A currency amount, stored as a whole number of micro-units.
///
/// Gateways and POS terminals report amounts as decimal strings or floats. These are converted exactly (up to six
/// decimal places) on the way in, so that comparisons such as the 0.01 payment tolerance never suffer from binary
/// floating point error.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

// Arithmetic saturates at the bounds of the micro-unit counter rather than wrapping or panicking. Amounts read from
// untrusted input go through the checked constructors instead.
op!(binary Money, Add, add, saturating_add);
op!(binary Money, Sub, sub, saturating_sub);
op!(inplace Money, AddAssign, add_assign, saturating_add);
op!(inplace Money, SubAssign, sub_assign, saturating_sub);
op!(unary Money, Neg, neg, saturating_neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0.saturating_mul(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(micros: i64) -> Self {
        Self(micros)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let micros = (value * Decimal::from(MICROS_PER_UNIT)).round_dp(0);
        micros.to_i64().map(Self).ok_or_else(|| MoneyConversionError(value.to_string()))
    }
}

impl TryFrom<f64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let d = Decimal::try_from(value).map_err(|e| MoneyConversionError(format!("{value}. {e}")))?;
        Self::try_from(d)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let d = Decimal::from_str(s.trim()).map_err(|e| MoneyConversionError(format!("{s}. {e}")))?;
        Self::try_from(d)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_decimal().round_dp(2))
    }
}

impl Money {
    /// The raw value, in micro-units.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Saturates for amounts beyond the representable range. Use [`Money::checked_from_units`] for untrusted input.
    pub fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(MICROS_PER_UNIT))
    }

    pub fn checked_from_units(units: i64) -> Result<Self, MoneyConversionError> {
        units
            .checked_mul(MICROS_PER_UNIT)
            .map(Self)
            .ok_or_else(|| MoneyConversionError(format!("{units} is too large")))
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Money> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The number of whole currency units, rounded towards negative infinity.
    pub fn whole_units(&self) -> i64 {
        self.0.div_euclid(MICROS_PER_UNIT)
    }

    pub fn abs_diff(&self, other: Money) -> Money {
        Self(self.0.saturating_sub(other.0).saturating_abs())
    }

    /// True if `other` differs from this amount by no more than `tolerance`.
    pub fn matches_within(&self, other: Money, tolerance: Money) -> bool {
        self.abs_diff(other) <= tolerance
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), 6)
    }
}

/// Serde helpers for API payloads that carry amounts as decimal numbers (`12.5`) or decimal strings (`"12.50"`),
/// rather than raw micro-units.
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct Line {
///     #[serde(with = "settlement_common::decimal_serde")]
///     unit_price: Money,
/// }
/// ```
pub mod decimal_serde {
    use std::str::FromStr;

    use serde::{de, Deserializer, Serializer};

    use super::Money;

    pub fn serialize<S: Serializer>(value: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }

    struct MoneyVisitor;

    impl<'de> de::Visitor<'de> for MoneyVisitor {
        type Value = Money;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a decimal amount as a number or string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
            Money::checked_from_units(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
            let v = i64::try_from(v).map_err(E::custom)?;
            Money::checked_from_units(v).map_err(E::custom)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
            Money::try_from(v).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
            Money::from_str(v).map_err(E::custom)
        }
    }
}
