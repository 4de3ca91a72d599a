//! Exact arithmetic over the two numeric shapes the engine produces.
//!
//! Machine integers stay integers as long as they fit; anything that
//! came in with a fractional part, or that overflows `i64`, lives in a
//! `rust_decimal::Decimal`. All comparisons convert both sides to
//! decimal, so `Int(3)` and `Precise(3.0)` are the same number.
//!
//! `None` stands for an unknown operand and is absorbing: every
//! operation on it yields `None`.

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Int(i64),
    Precise(Decimal),
}

impl NumericValue {
    pub fn to_decimal(self) -> Decimal {
        match self {
            NumericValue::Int(i) => Decimal::from(i),
            NumericValue::Precise(d) => d,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            NumericValue::Int(i) => i == 0,
            NumericValue::Precise(d) => d.is_zero(),
        }
    }
}

impl From<i64> for NumericValue {
    fn from(i: i64) -> Self {
        NumericValue::Int(i)
    }
}

impl From<Decimal> for NumericValue {
    fn from(d: Decimal) -> Self {
        NumericValue::Precise(d)
    }
}

pub fn add(a: Option<NumericValue>, b: Option<NumericValue>) -> Option<NumericValue> {
    let (a, b) = (a?, b?);
    match (a, b) {
        (NumericValue::Int(x), NumericValue::Int(y)) => Some(match x.checked_add(y) {
            Some(sum) => NumericValue::Int(sum),
            // promote on overflow instead of wrapping
            None => NumericValue::Precise(Decimal::from(x) + Decimal::from(y)),
        }),
        _ => a
            .to_decimal()
            .checked_add(b.to_decimal())
            .map(NumericValue::Precise),
    }
}

pub fn multiply(a: Option<NumericValue>, b: Option<NumericValue>) -> Option<NumericValue> {
    let (a, b) = (a?, b?);
    match (a, b) {
        (NumericValue::Int(x), NumericValue::Int(y)) => Some(match x.checked_mul(y) {
            Some(product) => NumericValue::Int(product),
            None => NumericValue::Precise(Decimal::from(x) * Decimal::from(y)),
        }),
        _ => a
            .to_decimal()
            .checked_mul(b.to_decimal())
            .map(NumericValue::Precise),
    }
}

pub fn equal(a: Option<NumericValue>, b: Option<NumericValue>) -> Option<bool> {
    Some(a?.to_decimal() == b?.to_decimal())
}

pub fn less_than(a: Option<NumericValue>, b: Option<NumericValue>) -> Option<bool> {
    Some(a?.to_decimal() < b?.to_decimal())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> NumericValue {
        NumericValue::Precise(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn int_addition_stays_int() {
        assert_eq!(
            add(Some(NumericValue::Int(3)), Some(NumericValue::Int(5))),
            Some(NumericValue::Int(8))
        );
    }

    #[test]
    fn overflow_promotes_to_decimal() {
        let big = NumericValue::Int(i64::MAX);
        let sum = add(Some(big), Some(NumericValue::Int(1))).unwrap();
        assert!(matches!(sum, NumericValue::Precise(_)));
        assert_eq!(
            sum.to_decimal(),
            Decimal::from(i64::MAX) + Decimal::from(1)
        );
    }

    #[test]
    fn decimal_product_is_exact() {
        // binary floats get this wrong (45999.99999999999)
        let product = multiply(
            multiply(Some(dec("1.15")), Some(NumericValue::Int(400))),
            Some(NumericValue::Int(100)),
        )
        .unwrap();
        assert_eq!(product.to_decimal(), Decimal::from_str("46000.00").unwrap());
    }

    #[test]
    fn unknown_is_absorbing() {
        assert_eq!(add(None, Some(NumericValue::Int(1))), None);
        assert_eq!(multiply(Some(NumericValue::Int(2)), None), None);
        assert_eq!(equal(None, None), None);
        assert_eq!(less_than(Some(NumericValue::Int(1)), None), None);
    }

    #[test]
    fn comparisons_ignore_representation() {
        assert_eq!(equal(Some(NumericValue::Int(3)), Some(dec("3.0"))), Some(true));
        assert_eq!(less_than(Some(dec("2.5")), Some(NumericValue::Int(3))), Some(true));
        assert_eq!(less_than(Some(NumericValue::Int(3)), Some(dec("2.5"))), Some(false));
    }
}
