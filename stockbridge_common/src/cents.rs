use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------        Cents          ---------------------------------------------------------
/// A monetary amount in hundredths of the shop currency.
///
/// Vendors report amounts as JSON numbers or as strings (Lazada uses thousands separators, e.g. `"1,234.50"`). Both
/// are converted with [`Cents::from_decimal`], which rounds half away from zero to two decimal places.
///
/// On the wire, `Cents` serializes as a decimal number (`8.67`), so API consumers see the same figures the vendors
/// report.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, AddAssign, add_assign);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct CentsConversionError(String);

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_decimal(amount: f64) -> Self {
        // f64::round rounds half away from zero
        Self((amount * 100.0).round() as i64)
    }

    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The unit cost of a merged stock position:
    /// `(existing_qty × existing_cost + incoming_qty × incoming_cost) / (existing_qty + incoming_qty)`,
    /// rounded half away from zero to the nearest cent.
    ///
    /// If the merged quantity is not positive there is nothing to average, and the incoming cost is returned.
    pub fn weighted_average(existing_qty: i64, existing_cost: Cents, incoming_qty: i64, incoming_cost: Cents) -> Cents {
        let total_qty = i128::from(existing_qty) + i128::from(incoming_qty);
        if total_qty <= 0 {
            return incoming_cost;
        }
        let total_value = i128::from(existing_qty) * i128::from(existing_cost.0)
            + i128::from(incoming_qty) * i128::from(incoming_cost.0);
        let doubled = 2 * total_value;
        let rounded = if doubled >= 0 {
            (doubled + total_qty) / (2 * total_qty)
        } else {
            (doubled - total_qty) / (2 * total_qty)
        };
        Cents(rounded as i64)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Cents {
    type Err = CentsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().replace(',', "");
        if cleaned.is_empty() {
            return Err(CentsConversionError(s.to_string()));
        }
        let amount = cleaned.parse::<f64>().map_err(|e| CentsConversionError(format!("{s}. {e}")))?;
        if !amount.is_finite() {
            return Err(CentsConversionError(s.to_string()));
        }
        Ok(Self::from_decimal(amount))
    }
}

impl Serialize for Cents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Cents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Amount {
            Number(f64),
            Text(String),
        }
        match Amount::deserialize(deserializer)? {
            Amount::Number(n) => Ok(Cents::from_decimal(n)),
            Amount::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn weighted_average_cost() {
        let cost = Cents::weighted_average(10, Cents::from(800), 5, Cents::from(1000));
        assert_eq!(cost, Cents::from(867));
        assert_eq!(cost.to_string(), "8.67");
        // nothing on hand
        assert_eq!(Cents::weighted_average(0, Cents::from(800), 3, Cents::from(500)), Cents::from(500));
        assert_eq!(Cents::weighted_average(-3, Cents::from(800), 3, Cents::from(500)), Cents::from(500));
    }

    #[test]
    fn parse_vendor_amounts() {
        assert_eq!("1,234.50".parse::<Cents>().unwrap(), Cents::from(123_450));
        assert_eq!("-120".parse::<Cents>().unwrap(), Cents::from(-12_000));
        assert_eq!(" 8.676 ".parse::<Cents>().unwrap(), Cents::from(868));
        assert!("".parse::<Cents>().is_err());
        assert!("abc".parse::<Cents>().is_err());
    }

    #[test]
    fn display_negative_amounts() {
        assert_eq!(Cents::from(-5).to_string(), "-0.05");
        assert_eq!(Cents::from(10_500).to_string(), "105.00");
    }

    #[test]
    fn serde_as_decimal() {
        let v = serde_json::to_string(&Cents::from(10_500)).unwrap();
        assert_eq!(v, "105.0");
        let c: Cents = serde_json::from_str("\"2,000.10\"").unwrap();
        assert_eq!(c, Cents::from(200_010));
        let c: Cents = serde_json::from_str("12.3").unwrap();
        assert_eq!(c, Cents::from(1230));
    }
}
