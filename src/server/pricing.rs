//! subtotal/tax/total arithmetic over currency minor units

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OrderTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
}

/// Sum `(unit_price, quantity)` pairs and apply the flat tax rate with
/// half-up rounding to the minor unit.
pub(crate) fn compute_totals<I>(lines: I, tax_rate: f64) -> OrderTotals
where
    I: IntoIterator<Item = (i64, i32)>,
{
    let subtotal = lines.into_iter().fold(0i64, |acc, (unit_price, quantity)| {
        acc.saturating_add(unit_price.saturating_mul(quantity as i64))
    });
    let tax = round_half_up(subtotal as f64 * tax_rate);
    OrderTotals {
        subtotal,
        tax,
        total: subtotal.saturating_add(tax),
    }
}

/// An order whose surviving lines sum to nothing must not persist.
pub(crate) fn is_degenerate(total: i64, line_count: usize) -> bool {
    line_count == 0 || total <= 0
}

fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
