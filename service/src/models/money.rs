// tokencart_service/src/models/money.rs

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use std::fmt::{self, Display};
use std::ops::{Add, Sub};
use thiserror::Error;

/// An amount in the currency's minor unit (cents).
///
/// On the JSON surface it is a decimal number with at most two fraction digits, so
/// `19.99` travels as `19.99` and is held as `1999`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Type)]
#[sqlx(transparent)]
pub struct Money(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid amount '{0}': expected a decimal with at most two fraction digits")]
pub struct MoneyParseError(pub String);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn from_cents(cents: i64) -> Self {
    Self(cents)
  }

  pub fn cents(&self) -> i64 {
    self.0
  }

  pub fn is_zero(&self) -> bool {
    self.0 == 0
  }

  pub fn is_negative(&self) -> bool {
    self.0 < 0
  }

  /// Parses `"19.99"`, `"20"`, `"0.5"`. Rejects exponents, signs other than a leading `-`,
  /// and more than two fraction digits.
  pub fn parse_decimal(input: &str) -> Result<Self, MoneyParseError> {
    let err = || MoneyParseError(input.to_string());
    let s = input.trim();
    let (negative, digits) = match s.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, s),
    };
    let (whole, frac) = match digits.split_once('.') {
      Some((w, f)) => (w, f),
      None => (digits, ""),
    };
    if whole.is_empty() || frac.len() > 2 {
      return Err(err());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
      return Err(err());
    }
    let whole: i64 = whole.parse().map_err(|_| err())?;
    let frac_cents: i64 = match frac.len() {
      0 => 0,
      1 => frac.parse::<i64>().map_err(|_| err())? * 10,
      _ => frac.parse().map_err(|_| err())?,
    };
    let cents = whole
      .checked_mul(100)
      .and_then(|c| c.checked_add(frac_cents))
      .ok_or_else(err)?;
    Ok(Self(if negative { -cents } else { cents }))
  }

  pub fn checked_add(self, rhs: Money) -> Option<Money> {
    self.0.checked_add(rhs.0).map(Money)
  }

  pub fn checked_sub(self, rhs: Money) -> Option<Money> {
    self.0.checked_sub(rhs.0).map(Money)
  }

  pub fn checked_mul(self, factor: i64) -> Option<Money> {
    self.0.checked_mul(factor).map(Money)
  }

  /// `self × percentage / 100`, rounded to the nearest cent with ties to even.
  ///
  /// Percentages above 100 are clamped, so the result never exceeds `self` in magnitude.
  pub fn percent_of(&self, percentage: u8) -> Money {
    let scaled = i128::from(self.0) * i128::from(percentage.min(100));
    // |scaled / 100| <= |self|, so the narrowing cannot fail.
    Money(i64::try_from(div_round_half_even(scaled, 100)).unwrap_or(self.0))
  }

  /// Two-decimal string, as gateways expect it (`"19.99"`, `"45.00"`).
  pub fn to_decimal_string(&self) -> String {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
  }
}

fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
  let quotient = numerator.div_euclid(denominator);
  let remainder = numerator.rem_euclid(denominator);
  match (remainder * 2).cmp(&denominator) {
    std::cmp::Ordering::Less => quotient,
    std::cmp::Ordering::Greater => quotient + 1,
    std::cmp::Ordering::Equal => quotient + (quotient & 1),
  }
}

impl Add for Money {
  type Output = Money;

  fn add(self, rhs: Self) -> Self::Output {
    Money(self.0 + rhs.0)
  }
}

impl Sub for Money {
  type Output = Money;

  fn sub(self, rhs: Self) -> Self::Output {
    Money(self.0 - rhs.0)
  }
}

impl Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_decimal_string())
  }
}

impl Serialize for Money {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(self.0 as f64 / 100.0)
  }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
  type Value = Money;

  fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("a decimal amount with at most two fraction digits")
  }

  fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
    v.checked_mul(100).map(Money).ok_or_else(|| E::custom(MoneyParseError(v.to_string())))
  }

  fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
    i64::try_from(v)
      .ok()
      .and_then(|v| v.checked_mul(100))
      .map(Money)
      .ok_or_else(|| E::custom(MoneyParseError(v.to_string())))
  }

  // `Display` for f64 is the shortest representation that round-trips, so 19.99 becomes "19.99".
  fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
    if !v.is_finite() {
      return Err(E::custom(MoneyParseError(v.to_string())));
    }
    Money::parse_decimal(&v.to_string()).map_err(E::custom)
  }

  fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
    Money::parse_decimal(v).map_err(E::custom)
  }
}

impl<'de> Deserialize<'de> for Money {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    deserializer.deserialize_any(MoneyVisitor)
  }
}
