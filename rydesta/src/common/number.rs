//! Arbitrary-precision rational numbers, the language's only numeric type.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

/// A rational number with arbitrary-precision numerator and denominator.
/// Integers are just rationals with a denominator of one; `num` and `str`
/// cast between this and its canonical decimal text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Number(BigRational);

impl Number {
    pub fn from_i64(n: i64) -> Number {
        Number(BigRational::from_integer(BigInt::from(n)))
    }

    pub fn ratio(numerator: BigInt, denominator: BigInt) -> Number {
        Number(BigRational::new(numerator, denominator))
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Parses a numeric literal in any of the lexer's accepted radixes:
    /// `0x..`, `0o..`, `0b..`, a plain decimal integer, `0`, or a decimal
    /// float `[0-9]*.[0-9]+`.
    pub fn parse_literal(text: &str) -> Result<Number, String> {
        if let Some(digits) = text.strip_prefix("0x") {
            return Self::parse_radix(digits, 16, text);
        }
        if let Some(digits) = text.strip_prefix("0o") {
            return Self::parse_radix(digits, 8, text);
        }
        if let Some(digits) = text.strip_prefix("0b") {
            return Self::parse_radix(digits, 2, text);
        }
        if text.contains('.') {
            return Self::parse_decimal_float(text);
        }
        let int = text
            .parse::<BigInt>()
            .map_err(|_| format!("'{}' is not a valid number", text))?;
        Ok(Number(BigRational::from_integer(int)))
    }

    fn parse_radix(digits: &str, radix: u32, original: &str) -> Result<Number, String> {
        let int = BigInt::parse_bytes(digits.as_bytes(), radix)
            .ok_or_else(|| format!("'{}' is not a valid number", original))?;
        Ok(Number(BigRational::from_integer(int)))
    }

    /// Parses `str n` back into a rational: the inverse of `Display`.
    /// Accepts plain integers and decimal fractions.
    fn parse_decimal_float(text: &str) -> Result<Number, String> {
        let negative = text.starts_with('-');
        let unsigned = if negative { &text[1..] } else { text };
        let mut parts = unsigned.splitn(2, '.');
        let whole = parts.next().unwrap_or("");
        let frac = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(format!("'{}' is not a valid number", text));
        }
        let whole_digits = if whole.is_empty() { "0" } else { whole };
        let whole_part = whole_digits
            .parse::<BigInt>()
            .map_err(|_| format!("'{}' is not a valid number", text))?;
        let mut value = BigRational::from_integer(whole_part);
        if !frac.is_empty() {
            let frac_int = frac
                .parse::<BigInt>()
                .map_err(|_| format!("'{}' is not a valid number", text))?;
            let scale = BigInt::from(10u32).pow(frac.len() as u32);
            value += BigRational::new(frac_int, scale);
        }
        if negative {
            value = -value;
        }
        Ok(Number(value))
    }

    pub fn checked_div(&self, other: &Number) -> Option<Number> {
        if other.0.is_zero() {
            None
        } else {
            Some(Number(&self.0 / &other.0))
        }
    }

    pub fn checked_rem(&self, other: &Number) -> Option<Number> {
        if other.0.is_zero() {
            None
        } else {
            Some(Number(&self.0 % &other.0))
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.0.to_f64()
    }
}

impl Add for Number {
    type Output = Number;
    fn add(self, rhs: Number) -> Number {
        Number(self.0 + rhs.0)
    }
}

impl Sub for Number {
    type Output = Number;
    fn sub(self, rhs: Number) -> Number {
        Number(self.0 - rhs.0)
    }
}

impl Mul for Number {
    type Output = Number;
    fn mul(self, rhs: Number) -> Number {
        Number(self.0 * rhs.0)
    }
}

impl Div for Number {
    type Output = Number;
    fn div(self, rhs: Number) -> Number {
        Number(self.0 / rhs.0)
    }
}

impl Rem for Number {
    type Output = Number;
    fn rem(self, rhs: Number) -> Number {
        Number(self.0 % rhs.0)
    }
}

impl Neg for Number {
    type Output = Number;
    fn neg(self) -> Number {
        Number(-self.0)
    }
}

impl fmt::Display for Number {
    /// Integer display when the denominator is one, decimal otherwise.
    /// Falls back to floor-division display if the decimal conversion
    /// would overflow a host float.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            return write!(f, "{}", self.0.numer());
        }
        match self.0.to_f64() {
            Some(float) if float.is_finite() => write!(f, "{}", float),
            _ => {
                let floor = self.0.numer().div_floor(self.0.denom());
                write!(f, "{}", floor)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integer_display() {
        assert_eq!(Number::from_i64(42).to_string(), "42");
    }

    #[test]
    fn hex_literal() {
        let n = Number::parse_literal("0xff").unwrap();
        assert_eq!(n, Number::from_i64(255));
    }

    #[test]
    fn binary_literal() {
        let n = Number::parse_literal("0b1010").unwrap();
        assert_eq!(n, Number::from_i64(10));
    }

    #[test]
    fn decimal_fraction_roundtrip() {
        let n = Number::parse_literal("3.5").unwrap();
        assert_eq!(n.to_string(), "3.5");
    }

    #[test]
    fn division_by_zero_is_none() {
        assert!(Number::from_i64(1).checked_div(&Number::from_i64(0)).is_none());
    }

    #[test]
    fn malformed_number_errors() {
        assert!(Number::parse_literal("not-a-number").is_err());
    }
}
