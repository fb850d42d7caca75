//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored in the shop's standard currency unit (Colombian pesos)
//! and are never negative. On the wire they travel as plain JSON numbers so
//! the persisted cart record stays readable by any consumer of the store.
//!
//! A JSON number is a binary float, so a price carries at most two decimal
//! places and fifteen significant digits. Within those bounds every amount
//! survives the store round trip exactly.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),

    /// The text is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),

    /// The amount has more than two decimal places.
    #[error("price has more than two decimal places: {0}")]
    TooPrecise(Decimal),

    /// The amount is above [`Price::MAX`].
    #[error("price exceeds the largest storable amount: {0}")]
    TooLarge(Decimal),
}

/// Decimal places a price may carry.
const MAX_SCALE: u32 = 2;

/// A non-negative unit price or total.
///
/// ## Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use techland_core::Price;
///
/// let mouse = Price::new(Decimal::from(20)).unwrap();
/// assert_eq!(mouse.times(2), Price::new(Decimal::from(40)).unwrap());
/// assert!(Price::new(Decimal::from(-1)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// The largest storable amount, `9999999999999.99`.
    pub const MAX: Self = Self(Decimal::from_parts(
        2_764_472_319,
        232_830,
        0,
        false,
        MAX_SCALE,
    ));

    /// Create a new price.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount` is below zero,
    /// `PriceError::TooPrecise` if it has more than two decimal places and
    /// `PriceError::TooLarge` if it is above [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        if amount.normalize().scale() > MAX_SCALE {
            return Err(PriceError::TooPrecise(amount));
        }
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of pesos.
    #[must_use]
    pub fn from_units(units: u32) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// This price multiplied by a quantity.
    ///
    /// Saturates at [`Price::MAX`].
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::saturating(self.0.checked_mul(Decimal::from(quantity)))
    }

    fn saturating(amount: Option<Decimal>) -> Self {
        match amount {
            Some(amount) if amount <= Self::MAX.0 => Self(amount),
            _ => Self::MAX,
        }
    }

    /// Format for display in Colombian pesos (e.g., `$ 20.000`).
    ///
    /// Rounds to whole pesos and groups thousands with `.`.
    #[must_use]
    pub fn display_cop(&self) -> String {
        let whole = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .trunc()
            .to_string();

        let digits: Vec<char> = whole.chars().collect();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, digit) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(*digit);
        }

        format!("$ {grouped}")
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::saturating(self.0.checked_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl core::str::FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount: Decimal = s
            .trim()
            .parse()
            .map_err(|_| PriceError::Invalid(s.to_owned()))?;
        Self::new(amount)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}
