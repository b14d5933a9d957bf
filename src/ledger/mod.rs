pub mod balance;
pub mod expense;
pub mod simplify;
pub mod split;
pub mod summary;

use rust_decimal_macros::dec;

// Using named types doesn't provide any compiler help, but it helps a lot with
// readability: HashMap<UserId, Amount> is self-explanatory, HashMap<String, Decimal>
// is not.
pub type UserId = String;
pub type ExpenseId = u32;

// I decided to use a decimal library instead of the built-in f64 type, to be
// safer when dealing with money. Equal splits that don't terminate (10 / 3)
// still leave a residue, but it sits at the 28th decimal place.
pub type Amount = rust_decimal::Decimal;

/// Any monetary difference at or below this is treated as zero, everywhere:
/// split validation, balance zeroing and transfer emission.
pub const EPSILON: Amount = dec!(0.01);

/// Number of decimal places for every amount we report.
pub const REPORTED_PRECISION: u32 = 2;

/// Round an amount for reporting. The scale is fixed, so `30` is reported as `30.00`.
pub fn reported(amount: Amount) -> Amount {
    let mut rounded = amount.round_dp(REPORTED_PRECISION);
    rounded.rescale(REPORTED_PRECISION);
    rounded
}

/// Whether an amount is indistinguishable from zero.
pub fn is_negligible(amount: Amount) -> bool {
    amount.abs() <= EPSILON
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    #[test]
    fn test_reported() {
        for (raw, want) in vec![
            (dec!(30), "30.00"),
            (dec!(3.3333333333), "3.33"),
            (dec!(0.125), "0.12"), // midpoint goes to the even digit
            (dec!(0.135), "0.14"),
            (dec!(-12.5), "-12.50"),
        ] {
            assert_eq!(want, super::reported(raw).to_string());
        }
    }

    #[test]
    fn test_is_negligible() {
        for (amount, want) in vec![
            (dec!(0), true),
            (dec!(0.01), true),
            (dec!(-0.01), true),
            (dec!(0.0100001), false),
            (dec!(-0.02), false),
        ] {
            assert_eq!(want, super::is_negligible(amount), "{}", amount);
        }
    }
}
