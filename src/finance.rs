//! General functions related to finance.
use crate::units::{Dimensionless, Money, MoneyPerPower, MoneyPerYear, Power};
use log::error;

/// Discount rates below this value are clamped to it so that the general formula stays defined
const MIN_DISCOUNT_RATE: f64 = 1e-9;

/// If `(1 + r)^n - 1` is smaller than this, the straight-line factor `1 / n` is used instead
const MIN_DENOMINATOR: f64 = 1e-9;

/// The result of an annuity factor calculation.
///
/// A factor of zero for a positive lifetime means that the calculation overflowed. Any asset
/// costed with such a factor would be treated as free, so callers should check
/// [`AnnuityFactor::is_usable`] before trusting costs derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnuityFactor {
    /// The factor by which a one-off capital cost is multiplied to give an annual payment
    pub factor: Dimensionless,
    /// Whether the calculation overflowed
    pub overflowed: bool,
}

impl AnnuityFactor {
    fn new(factor: f64) -> Self {
        Self {
            factor: Dimensionless(factor),
            overflowed: false,
        }
    }

    /// Whether the factor can be used to price an asset
    pub fn is_usable(&self) -> bool {
        !self.overflowed && self.factor > Dimensionless(0.0)
    }
}

/// Calculates the annuity factor (capital recovery factor) for a given discount rate and lifetime.
///
/// The annuity factor converts a one-off capital cost into an equivalent constant annual payment
/// over the lifetime of an asset.
///
/// # Arguments
///
/// * `rate` - The discount rate (e.g. 0.06 for 6%)
/// * `years` - The lifetime of the asset in years
pub fn annuity_factor(rate: f64, years: f64) -> AnnuityFactor {
    if years <= 0.0 {
        return AnnuityFactor::new(0.0);
    }
    if rate == 0.0 {
        return AnnuityFactor::new(1.0 / years);
    }

    let rate = if rate < MIN_DISCOUNT_RATE {
        MIN_DISCOUNT_RATE
    } else {
        rate
    };
    let qn = (1.0 + rate).powf(years);
    if !qn.is_finite() {
        error!("Overflow calculating annuity factor (rate={rate}, years={years})");
        return AnnuityFactor {
            factor: Dimensionless(0.0),
            overflowed: true,
        };
    }

    let denominator = qn - 1.0;
    if denominator.abs() < MIN_DENOMINATOR {
        return AnnuityFactor::new(1.0 / years);
    }

    AnnuityFactor::new(rate * qn / denominator)
}

/// Calculates the annualised capital cost of the given installed capacity
pub fn annual_capital_cost(
    capital_cost: MoneyPerPower,
    capacity: Power,
    factor: &AnnuityFactor,
) -> MoneyPerYear {
    let total: Money = capital_cost * capacity;
    (total * factor.factor).per_year()
}
