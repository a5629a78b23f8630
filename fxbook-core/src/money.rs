use rust_decimal::{Decimal, RoundingStrategy};

/// Round a home-currency amount to the configured number of decimal places.
pub fn round_money(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// `true` when `a` and `b` differ by no more than `epsilon`.
pub fn within(a: Decimal, b: Decimal, epsilon: Decimal) -> bool {
    (a - b).abs() <= epsilon
}
