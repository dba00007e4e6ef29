use dashu_base::{Abs, Approximation, Sign};
use dashu_float::{DBig, FBig};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Arbitrary precision real with explicit precision enforcement.
///
/// Uses f64 internally when `precision_bits <= 64`, `FBig` otherwise. Zoom scale and
/// center coordinates are carried as `BigFloat` so deep zooms never underflow to zero.
#[derive(Clone, Debug)]
pub struct BigFloat {
    value: BigFloatValue,
    precision_bits: usize,
}

#[derive(Clone, Debug)]
enum BigFloatValue {
    F64(f64),
    Arbitrary(FBig),
}

fn fbig_from_f64(val: f64, precision_bits: usize) -> FBig {
    // Non-finite inputs have no FBig representation; they collapse to zero.
    let base: FBig = if val == 0.0 {
        FBig::ZERO
    } else {
        FBig::try_from(val).unwrap_or(FBig::ZERO)
    };
    base.with_precision(precision_bits).value()
}

impl BigFloat {
    /// Create from f64 with explicit precision. There is no default precision.
    pub fn with_precision(val: f64, precision_bits: usize) -> Self {
        let value = if precision_bits <= 64 {
            BigFloatValue::F64(val)
        } else {
            BigFloatValue::Arbitrary(fbig_from_f64(val, precision_bits))
        };

        Self {
            value,
            precision_bits,
        }
    }

    pub fn zero(precision_bits: usize) -> Self {
        Self::with_precision(0.0, precision_bits)
    }

    pub fn one(precision_bits: usize) -> Self {
        Self::with_precision(1.0, precision_bits)
    }

    pub fn precision_bits(&self) -> usize {
        self.precision_bits
    }

    /// Same value at a different precision.
    pub fn with_new_precision(&self, precision_bits: usize) -> Self {
        if precision_bits <= 64 {
            return Self::with_precision(self.to_f64(), precision_bits);
        }
        Self {
            value: BigFloatValue::Arbitrary(self.to_fbig().with_precision(precision_bits).value()),
            precision_bits,
        }
    }

    /// Convert to f64. Lossy for values that need more than 64 bits.
    pub fn to_f64(&self) -> f64 {
        match &self.value {
            BigFloatValue::F64(v) => *v,
            BigFloatValue::Arbitrary(v) => v.to_f64().value(),
        }
    }

    /// Parse a decimal string with explicit precision.
    ///
    /// Values beyond f64 range (e.g. "1e-1000") are kept exactly when
    /// `precision_bits > 64`.
    pub fn from_string(val: &str, precision_bits: usize) -> Result<Self, CoreError> {
        let parse_err = |reason: String| CoreError::ParseNumber {
            input: val.to_string(),
            reason,
        };

        if precision_bits <= 64 {
            return val
                .trim()
                .parse::<f64>()
                .map(|f| Self::with_precision(f, precision_bits))
                .map_err(|e| parse_err(e.to_string()));
        }

        let dbig = val
            .trim()
            .parse::<DBig>()
            .map_err(|e| parse_err(e.to_string()))?;
        let fbig = match dbig.with_base_and_precision::<2>(precision_bits) {
            Approximation::Exact(v) => v,
            Approximation::Inexact(v, _) => v,
        };
        Ok(Self {
            value: BigFloatValue::Arbitrary(fbig.with_rounding::<dashu_float::round::mode::Zero>()),
            precision_bits,
        })
    }

    pub fn add(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a + b, |a, b| a + b)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a - b, |a, b| a - b)
    }

    pub fn mul(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a * b, |a, b| a * b)
    }

    pub fn div(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a / b, |a, b| a / b)
    }

    /// Multiply by a plain f64 at this value's precision.
    pub fn mul_f64(&self, factor: f64) -> Self {
        self.mul(&Self::with_precision(factor, self.precision_bits))
    }

    pub fn neg(&self) -> Self {
        let value = match &self.value {
            BigFloatValue::F64(v) => BigFloatValue::F64(-v),
            BigFloatValue::Arbitrary(v) => BigFloatValue::Arbitrary(-v.clone()),
        };
        Self {
            value,
            precision_bits: self.precision_bits,
        }
    }

    pub fn abs(&self) -> Self {
        let value = match &self.value {
            BigFloatValue::F64(v) => BigFloatValue::F64(v.abs()),
            BigFloatValue::Arbitrary(v) => BigFloatValue::Arbitrary(v.clone().abs()),
        };
        Self {
            value,
            precision_bits: self.precision_bits,
        }
    }

    pub fn is_zero(&self) -> bool {
        match &self.value {
            BigFloatValue::F64(v) => *v == 0.0,
            BigFloatValue::Arbitrary(v) => v.repr().is_zero(),
        }
    }

    pub fn is_positive(&self) -> bool {
        match &self.value {
            BigFloatValue::F64(v) => *v > 0.0,
            BigFloatValue::Arbitrary(v) => !v.repr().is_zero() && v.repr().sign() == Sign::Positive,
        }
    }

    /// Approximate log2 of the magnitude, usable far outside f64 range.
    ///
    /// Returns negative infinity for zero.
    pub fn log2_approx(&self) -> f64 {
        match &self.value {
            BigFloatValue::F64(v) => v.abs().log2(),
            BigFloatValue::Arbitrary(v) => {
                let as_f64 = v.to_f64().value().abs();
                if as_f64.is_normal() {
                    return as_f64.log2();
                }
                let repr = v.repr();
                if repr.is_zero() {
                    return f64::NEG_INFINITY;
                }
                // value = significand * 2^exponent, significand has `digits` bits
                (repr.exponent() as f64) + (repr.digits() as f64) - 1.0
            }
        }
    }

    pub fn log10_approx(&self) -> f64 {
        let as_f64 = self.to_f64().abs();
        if as_f64.is_normal() {
            return as_f64.log10();
        }
        self.log2_approx() * std::f64::consts::LOG10_2
    }

    fn binary_op(
        &self,
        other: &Self,
        fast: impl Fn(f64, f64) -> f64,
        slow: impl Fn(&FBig, &FBig) -> FBig,
    ) -> Self {
        let result_precision = self.precision_bits.max(other.precision_bits);

        let value = match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) if result_precision <= 64 => {
                BigFloatValue::F64(fast(*a, *b))
            }
            _ => {
                let a = self.with_new_precision_fbig(result_precision);
                let b = other.with_new_precision_fbig(result_precision);
                BigFloatValue::Arbitrary(slow(&a, &b))
            }
        };

        Self {
            value,
            precision_bits: result_precision,
        }
    }

    fn with_new_precision_fbig(&self, precision_bits: usize) -> FBig {
        self.to_fbig().with_precision(precision_bits).value()
    }

    fn to_fbig(&self) -> FBig {
        match &self.value {
            BigFloatValue::F64(v) => fbig_from_f64(*v, self.precision_bits.max(64)),
            BigFloatValue::Arbitrary(v) => v.clone(),
        }
    }
}

impl PartialEq for BigFloat {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) => a == b,
            _ => self.to_fbig() == other.to_fbig(),
        }
    }
}

impl PartialOrd for BigFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) => a.partial_cmp(b),
            _ => self.to_fbig().partial_cmp(&other.to_fbig()),
        }
    }
}

impl std::fmt::Display for BigFloat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            BigFloatValue::F64(v) => write!(f, "{}", v),
            BigFloatValue::Arbitrary(v) => {
                // Binary FBig prints in base 2; convert to decimal for humans and files.
                let digits = (self.precision_bits as f64 * std::f64::consts::LOG10_2).ceil() as usize;
                let decimal = v.clone().with_base_and_precision::<10>(digits.max(1));
                let decimal = match decimal {
                    Approximation::Exact(d) => d,
                    Approximation::Inexact(d, _) => d,
                };
                write!(f, "{}", decimal)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BigFloatSerde {
    value: String,
    precision_bits: usize,
}

impl Serialize for BigFloat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        BigFloatSerde {
            value: self.to_string(),
            precision_bits: self.precision_bits,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BigFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BigFloatSerde::deserialize(deserializer)?;
        BigFloat::from_string(&raw.value, raw.precision_bits).map_err(serde::de::Error::custom)
    }
}
