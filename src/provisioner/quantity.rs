//! Kubernetes resource quantity arithmetic
//!
//! Parses quantity strings such as `2G`, `2.2G`, `2Gi` or `5e9` into an exact
//! fraction so storage requests can be converted to whole gigabytes without
//! floating point rounding.

use crate::error::{Error, Result};

const GIGA: u128 = 1_000_000_000;

/// An exactly parsed quantity, `numerator / denominator` with a sign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    negative: bool,
    numerator: u128,
    denominator: u128,
}

enum Suffix {
    /// Power of ten
    Decimal(i32),
    /// Power of two
    Binary(u32),
}

impl Quantity {
    /// Parse a quantity in the Kubernetes grammar:
    /// `[+-]<digits>[.<digits>]<suffix>` where the suffix is one of
    /// `Ki Mi Gi Ti Pi Ei`, `m k M G T P E`, an `e`/`E` exponent, or empty.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("quantity {s:?} is not a valid number"));

        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let number_len = unsigned
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_len);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if frac_part.contains('.') {
            return Err(invalid());
        }

        let mut numerator: u128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            numerator = numerator
                .checked_mul(10)
                .and_then(|n| n.checked_add(u128::from(b - b'0')))
                .ok_or_else(|| overflow(s))?;
        }
        let mut denominator = pow10(frac_part.len() as u32).ok_or_else(|| overflow(s))?;

        match parse_suffix(suffix).ok_or_else(invalid)? {
            Suffix::Binary(shift) => {
                numerator = numerator
                    .checked_mul(1u128 << shift)
                    .ok_or_else(|| overflow(s))?;
            }
            Suffix::Decimal(exp) if exp >= 0 => {
                let factor = pow10(exp.unsigned_abs()).ok_or_else(|| overflow(s))?;
                numerator = numerator.checked_mul(factor).ok_or_else(|| overflow(s))?;
            }
            Suffix::Decimal(exp) => {
                let factor = pow10(exp.unsigned_abs()).ok_or_else(|| overflow(s))?;
                denominator = denominator.checked_mul(factor).ok_or_else(|| overflow(s))?;
            }
        }

        Ok(Self {
            negative,
            numerator,
            denominator,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    /// Smallest whole number of decimal gigabytes holding this quantity.
    ///
    /// Always rounds up so a share is never smaller than what was requested.
    pub fn to_gigabytes_ceil(&self) -> Result<u64> {
        if self.is_negative() {
            return Err(Error::Validation(
                "negative quantity cannot be expressed in gigabytes".into(),
            ));
        }

        let per_gigabyte = self
            .denominator
            .checked_mul(GIGA)
            .ok_or_else(|| Error::Validation("quantity precision too large".into()))?;

        let mut gigabytes = self.numerator / per_gigabyte;
        if self.numerator % per_gigabyte != 0 {
            gigabytes += 1;
        }

        u64::try_from(gigabytes).map_err(|_| {
            Error::Validation(format!("{gigabytes} gigabytes is not a representable size"))
        })
    }
}

fn parse_suffix(suffix: &str) -> Option<Suffix> {
    let parsed = match suffix {
        "" => Suffix::Decimal(0),
        "m" => Suffix::Decimal(-3),
        "k" => Suffix::Decimal(3),
        "M" => Suffix::Decimal(6),
        "G" => Suffix::Decimal(9),
        "T" => Suffix::Decimal(12),
        "P" => Suffix::Decimal(15),
        "E" => Suffix::Decimal(18),
        "Ki" => Suffix::Binary(10),
        "Mi" => Suffix::Binary(20),
        "Gi" => Suffix::Binary(30),
        "Ti" => Suffix::Binary(40),
        "Pi" => Suffix::Binary(50),
        "Ei" => Suffix::Binary(60),
        _ => {
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?;
            let digits = exponent
                .strip_prefix('-')
                .or_else(|| exponent.strip_prefix('+'))
                .unwrap_or(exponent);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            Suffix::Decimal(exponent.parse().ok()?)
        }
    };
    Some(parsed)
}

fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

fn overflow(s: &str) -> Error {
    Error::Validation(format!("quantity {s:?} cannot be expressed as an integer"))
}
