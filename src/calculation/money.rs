//! Money rounding and pro-rata apportionment.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds an amount to satang (2 decimal places), half away from zero.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::round_money;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_money(Decimal::new(20833333, 5)), Decimal::new(20833, 2));
/// assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
/// ```
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits `total` into shares proportional to `weights`.
///
/// Each share is rounded to 2 decimal places and the rounding residue is
/// added to the share with the largest weight (the first one on ties), so the
/// shares always add up to `total` exactly. When the weights sum to zero the
/// total is split evenly.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::apportion;
/// use rust_decimal::Decimal;
///
/// let shares = apportion(Decimal::new(100, 0), &[Decimal::ONE, Decimal::ONE, Decimal::ONE]);
/// assert_eq!(shares, vec![Decimal::new(3334, 2), Decimal::new(3333, 2), Decimal::new(3333, 2)]);
/// ```
pub fn apportion(total: Decimal, weights: &[Decimal]) -> Vec<Decimal> {
    if weights.is_empty() {
        return Vec::new();
    }

    let weights: Vec<Decimal> = if weights.iter().copied().sum::<Decimal>().is_zero() {
        vec![Decimal::ONE; weights.len()]
    } else {
        weights.to_vec()
    };
    let weight_sum: Decimal = weights.iter().copied().sum();

    let mut shares: Vec<Decimal> = weights
        .iter()
        .map(|w| round_money(total * *w / weight_sum))
        .collect();

    let residue = total - shares.iter().copied().sum::<Decimal>();
    if !residue.is_zero() {
        let largest = weights
            .iter()
            .enumerate()
            .fold(0, |best, (i, w)| if *w > weights[best] { i } else { best });
        shares[largest] += residue;
    }
    shares
}
