//! Black-Scholes option pricing
//!
//! Stateless pricing of European options:
//! - Price: S·N(d1) − K·e^(−rT)·N(d2) for calls, K·e^(−rT)·N(−d2) − S·N(−d1) for puts
//! - Delta (∂V/∂S), Gamma (∂²V/∂S²), Theta (per day), Vega (per vol point), Rho (per 1%)
//! - Implied volatility via Brent's method
//!
//! Every function returns per-unit values. Scaling by position size happens in
//! the risk calculator.

use crate::error::{Result, RiskError};
use crate::models::{Greeks, PositionKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::{PI, SQRT_2};

/// Days per year used for expiry and theta conversion
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Lower bound of the implied volatility search bracket
pub const IV_LOWER_BOUND: f64 = 0.0001;

/// Upper bound of the implied volatility search bracket
pub const IV_UPPER_BOUND: f64 = 10.0;

pub const IV_MAX_ITERATIONS: usize = 100;

pub const IV_TOLERANCE: f64 = 1e-6;

/// Option type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Option type of a position kind, `None` for non-options
    pub fn from_kind(kind: PositionKind) -> Option<Self> {
        match kind {
            PositionKind::Call => Some(OptionType::Call),
            PositionKind::Put => Some(OptionType::Put),
            _ => None,
        }
    }
}

/// Pricing inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionInputs {
    /// Underlying spot price
    pub spot: f64,

    pub strike: f64,

    /// Time to expiry in years
    pub time_to_expiry: f64,

    /// Annualised risk-free rate
    pub rate: f64,

    /// Annualised volatility
    pub volatility: f64,
}

impl OptionInputs {
    pub fn new(spot: f64, strike: f64, time_to_expiry: f64, rate: f64, volatility: f64) -> Self {
        Self {
            spot,
            strike,
            time_to_expiry,
            rate,
            volatility,
        }
    }

    fn expired(&self) -> bool {
        self.time_to_expiry <= 0.0
    }

    fn zero_vol(&self) -> bool {
        self.volatility <= 0.0
    }

    /// K·e^(−rT)
    fn discounted_strike(&self) -> f64 {
        self.strike * (-self.rate * self.time_to_expiry).exp()
    }
}

/// Time to expiry in years, floored at zero
pub fn time_to_expiry(expiry: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (expiry - now).num_milliseconds() as f64 / 1000.0;
    (seconds / (DAYS_PER_YEAR * 24.0 * 3600.0)).max(0.0)
}

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal PDF
pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// d1 = (ln(S/K) + (r + σ²/2)T) / (σ√T)
///
/// Only meaningful for T > 0 and σ > 0.
pub fn d1(inputs: &OptionInputs) -> f64 {
    let OptionInputs {
        spot: s,
        strike: k,
        time_to_expiry: t,
        rate: r,
        volatility: sigma,
    } = *inputs;
    ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// d2 = d1 − σ√T
pub fn d2(inputs: &OptionInputs) -> f64 {
    d1(inputs) - inputs.volatility * inputs.time_to_expiry.sqrt()
}

/// Theoretical option price
pub fn price(option_type: OptionType, inputs: &OptionInputs) -> f64 {
    let s = inputs.spot;
    let k = inputs.strike;

    if inputs.expired() {
        return match option_type {
            OptionType::Call => (s - k).max(0.0),
            OptionType::Put => (k - s).max(0.0),
        };
    }

    // Zero volatility: the option is worth its discounted forward intrinsic value
    if inputs.zero_vol() {
        let k_disc = inputs.discounted_strike();
        return match option_type {
            OptionType::Call => (s - k_disc).max(0.0),
            OptionType::Put => (k_disc - s).max(0.0),
        };
    }

    let d1 = d1(inputs);
    let d2 = d2(inputs);
    let k_disc = inputs.discounted_strike();

    let value = match option_type {
        OptionType::Call => s * norm_cdf(d1) - k_disc * norm_cdf(d2),
        OptionType::Put => k_disc * norm_cdf(-d2) - s * norm_cdf(-d1),
    };
    value.max(0.0)
}

/// Delta: N(d1) for calls, N(d1) − 1 for puts
pub fn delta(option_type: OptionType, inputs: &OptionInputs) -> f64 {
    if inputs.expired() {
        return step_delta(option_type, inputs.spot, inputs.strike);
    }
    if inputs.zero_vol() {
        return step_delta(option_type, inputs.spot, inputs.discounted_strike());
    }

    let n_d1 = norm_cdf(d1(inputs));
    match option_type {
        OptionType::Call => n_d1,
        OptionType::Put => n_d1 - 1.0,
    }
}

fn step_delta(option_type: OptionType, spot: f64, strike: f64) -> f64 {
    match option_type {
        OptionType::Call => {
            if spot > strike {
                1.0
            } else {
                0.0
            }
        }
        OptionType::Put => {
            if spot < strike {
                -1.0
            } else {
                0.0
            }
        }
    }
}

/// Gamma: φ(d1) / (Sσ√T), identical for calls and puts
pub fn gamma(inputs: &OptionInputs) -> f64 {
    if inputs.expired() || inputs.zero_vol() {
        return 0.0;
    }
    norm_pdf(d1(inputs)) / (inputs.spot * inputs.volatility * inputs.time_to_expiry.sqrt())
}

/// Theta per calendar day
pub fn theta(option_type: OptionType, inputs: &OptionInputs) -> f64 {
    if inputs.expired() {
        return 0.0;
    }

    let r = inputs.rate;
    let k_disc = inputs.discounted_strike();

    if inputs.zero_vol() {
        // Only the carry on the discounted strike remains
        let annual = match option_type {
            OptionType::Call if inputs.spot > k_disc => -r * k_disc,
            OptionType::Put if inputs.spot < k_disc => r * k_disc,
            _ => 0.0,
        };
        return annual / DAYS_PER_YEAR;
    }

    let d1 = d1(inputs);
    let d2 = d2(inputs);
    let decay = -(inputs.spot * norm_pdf(d1) * inputs.volatility) / (2.0 * inputs.time_to_expiry.sqrt());

    let annual = match option_type {
        OptionType::Call => decay - r * k_disc * norm_cdf(d2),
        OptionType::Put => decay + r * k_disc * norm_cdf(-d2),
    };
    annual / DAYS_PER_YEAR
}

/// Vega per 1 vol point (σ move of 0.01)
pub fn vega(inputs: &OptionInputs) -> f64 {
    if inputs.expired() || inputs.zero_vol() {
        return 0.0;
    }
    inputs.spot * norm_pdf(d1(inputs)) * inputs.time_to_expiry.sqrt() / 100.0
}

/// Rho per 1% rate move
pub fn rho(option_type: OptionType, inputs: &OptionInputs) -> f64 {
    if inputs.expired() {
        return 0.0;
    }

    let t = inputs.time_to_expiry;
    let k_disc = inputs.discounted_strike();

    if inputs.zero_vol() {
        return match option_type {
            OptionType::Call if inputs.spot > k_disc => t * k_disc / 100.0,
            OptionType::Put if inputs.spot < k_disc => -t * k_disc / 100.0,
            _ => 0.0,
        };
    }

    let d2 = d2(inputs);
    match option_type {
        OptionType::Call => t * k_disc * norm_cdf(d2) / 100.0,
        OptionType::Put => -t * k_disc * norm_cdf(-d2) / 100.0,
    }
}

/// All five per-unit Greeks
pub fn greeks(option_type: OptionType, inputs: &OptionInputs) -> Greeks {
    Greeks {
        delta: delta(option_type, inputs),
        gamma: gamma(inputs),
        theta: theta(option_type, inputs),
        vega: vega(inputs),
        rho: rho(option_type, inputs),
    }
}

/// Solve for the volatility that reproduces `market_price`
///
/// Searches σ ∈ [0.0001, 10.0] with Brent's method. Fails with
/// [`RiskError::Numerical`] when the bracket holds no root (for example a
/// market price below intrinsic value) or the solver does not converge.
pub fn solve_implied_volatility(
    option_type: OptionType,
    market_price: f64,
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    rate: f64,
) -> Result<f64> {
    if time_to_expiry <= 0.0 || spot <= 0.0 || strike <= 0.0 || market_price <= 0.0 {
        return Err(RiskError::Numerical(format!(
            "Implied volatility undefined for price={} spot={} strike={} T={}",
            market_price, spot, strike, time_to_expiry
        )));
    }

    let objective = |sigma: f64| {
        price(
            option_type,
            &OptionInputs::new(spot, strike, time_to_expiry, rate, sigma),
        ) - market_price
    };

    brent(objective, IV_LOWER_BOUND, IV_UPPER_BOUND, IV_TOLERANCE, IV_MAX_ITERATIONS)
}

/// Implied volatility, `None` when no solution exists in the search bracket
pub fn implied_volatility(
    option_type: OptionType,
    market_price: f64,
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    rate: f64,
) -> Option<f64> {
    match solve_implied_volatility(option_type, market_price, spot, strike, time_to_expiry, rate) {
        Ok(sigma) => Some(sigma),
        Err(e) => {
            tracing::debug!(error = %e, "Implied volatility not found");
            None
        }
    }
}

/// Brent's bracketed root finder
fn brent<F>(f: F, lower: f64, upper: f64, tolerance: f64, max_iterations: usize) -> Result<f64>
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = (lower, upper);
    let (mut fa, mut fb) = (f(a), f(b));

    if !fa.is_finite() || !fb.is_finite() {
        return Err(RiskError::Numerical(
            "Objective not finite at bracket bounds".to_string(),
        ));
    }
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if fa * fb > 0.0 {
        return Err(RiskError::Numerical(format!(
            "Root not bracketed in [{}, {}]",
            lower, upper
        )));
    }

    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = c;
    let mut bisected = true;

    for _ in 0..max_iterations {
        if fb == 0.0 || (b - a).abs() < tolerance {
            return Ok(b);
        }

        let mut s = if fa != fc && fb != fc {
            // Inverse quadratic interpolation
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fa * fc / ((fb - fa) * (fb - fc))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            // Secant
            b - fb * (b - a) / (fb - fa)
        };

        let quarter = (3.0 * a + b) / 4.0;
        let outside = !((s > quarter.min(b)) && (s < quarter.max(b)));
        let use_bisection = outside
            || (bisected && (s - b).abs() >= (b - c).abs() / 2.0)
            || (!bisected && (s - b).abs() >= (c - d).abs() / 2.0)
            || (bisected && (b - c).abs() < tolerance)
            || (!bisected && (c - d).abs() < tolerance);

        if use_bisection {
            s = (a + b) / 2.0;
        }
        bisected = use_bisection;

        let fs = f(s);
        d = c;
        c = b;
        fc = fb;

        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    Err(RiskError::Numerical(format!(
        "Brent solver did not converge in {} iterations",
        max_iterations
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn atm() -> OptionInputs {
        OptionInputs::new(100.0, 100.0, 0.25, 0.05, 0.2)
    }

    #[test]
    fn test_call_and_put_prices() {
        let call = price(OptionType::Call, &atm());
        let put = price(OptionType::Put, &atm());

        assert!(call > 4.0 && call < 5.0);
        assert!(put > 3.0 && put < 4.0);

        // Put-call parity on prices: C − P = S − K·e^(−rT)
        let parity = 100.0 - 100.0 * (-0.05_f64 * 0.25).exp();
        assert_abs_diff_eq!(call - put, parity, epsilon = 1e-9);
    }

    #[test]
    fn test_expired_option_is_intrinsic() {
        let inputs = OptionInputs::new(110.0, 100.0, 0.0, 0.05, 0.2);

        assert_abs_diff_eq!(price(OptionType::Call, &inputs), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(price(OptionType::Put, &inputs), 0.0, epsilon = 1e-9);
        assert_eq!(delta(OptionType::Call, &inputs), 1.0);
        assert_eq!(delta(OptionType::Put, &inputs), 0.0);
        assert_eq!(gamma(&inputs), 0.0);
        assert_eq!(vega(&inputs), 0.0);
        assert_eq!(theta(OptionType::Call, &inputs), 0.0);
    }

    #[test]
    fn test_zero_volatility_does_not_divide_by_zero() {
        let inputs = OptionInputs::new(110.0, 100.0, 0.5, 0.05, 0.0);

        assert_eq!(gamma(&inputs), 0.0);
        assert_eq!(vega(&inputs), 0.0);
        assert_eq!(delta(OptionType::Call, &inputs), 1.0);

        let expected = 110.0 - 100.0 * (-0.05_f64 * 0.5).exp();
        assert_abs_diff_eq!(price(OptionType::Call, &inputs), expected, epsilon = 1e-9);
        assert!(price(OptionType::Put, &inputs).abs() < 1e-12);
    }

    #[test]
    fn test_atm_greeks_signs() {
        let call = greeks(OptionType::Call, &atm());
        let put = greeks(OptionType::Put, &atm());

        assert!(call.delta > 0.5 && call.delta < 0.6);
        assert!(put.delta < -0.4 && put.delta > -0.5);
        assert!(call.gamma > 0.0);
        assert_eq!(call.gamma, put.gamma);
        assert!(call.vega > 0.0);
        assert!(call.theta < 0.0);
        assert!(put.theta < 0.0);
        assert!(call.rho > 0.0);
        assert!(put.rho < 0.0);
    }

    #[test]
    fn test_theta_is_daily() {
        let inputs = atm();
        let d1 = d1(&inputs);
        let d2 = d2(&inputs);
        let annual = -(100.0 * norm_pdf(d1) * 0.2) / (2.0 * 0.25_f64.sqrt())
            - 0.05 * 100.0 * (-0.05_f64 * 0.25).exp() * norm_cdf(d2);

        assert_abs_diff_eq!(theta(OptionType::Call, &inputs), annual / 365.25, epsilon = 1e-12);
    }

    #[test]
    fn test_implied_volatility_round_trip() {
        let inputs = OptionInputs::new(100.0, 105.0, 0.5, 0.03, 0.35);
        let market = price(OptionType::Put, &inputs);

        let solved = implied_volatility(OptionType::Put, market, 100.0, 105.0, 0.5, 0.03).unwrap();
        assert_abs_diff_eq!(solved, 0.35, epsilon = 1e-4);
    }

    #[test]
    fn test_implied_volatility_not_found() {
        // Below intrinsic value: no volatility can reproduce it
        assert!(implied_volatility(OptionType::Call, 5.0, 120.0, 100.0, 0.5, 0.05).is_none());

        // Expired
        assert!(implied_volatility(OptionType::Call, 5.0, 100.0, 100.0, 0.0, 0.05).is_none());

        let err = solve_implied_volatility(OptionType::Call, 500.0, 100.0, 100.0, 1.0, 0.05);
        assert!(matches!(err, Err(RiskError::Numerical(_))));
    }

    #[test]
    fn test_time_to_expiry() {
        let now = "2025-01-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let expiry = "2025-04-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let t = time_to_expiry(expiry, now);
        assert!(t > 0.24 && t < 0.26);

        assert_eq!(time_to_expiry(now, expiry), 0.0);
    }

    proptest! {
        #[test]
        fn prop_delta_parity(
            s in 10.0f64..500.0,
            k in 10.0f64..500.0,
            t in 0.01f64..3.0,
            r in 0.0f64..0.1,
            sigma in 0.05f64..1.5,
        ) {
            let inputs = OptionInputs::new(s, k, t, r, sigma);
            let diff = delta(OptionType::Call, &inputs) - delta(OptionType::Put, &inputs);
            prop_assert!((diff - 1.0).abs() < 1e-2);
        }

        #[test]
        fn prop_gamma_and_vega_non_negative(
            s in 1.0f64..1000.0,
            k in 1.0f64..1000.0,
            t in 0.001f64..5.0,
            r in -0.02f64..0.15,
            sigma in 0.01f64..3.0,
        ) {
            let inputs = OptionInputs::new(s, k, t, r, sigma);
            prop_assert!(gamma(&inputs) >= 0.0);
            prop_assert!(vega(&inputs) >= 0.0);
        }

        #[test]
        fn prop_expiry_collapses_to_intrinsic(
            s in 1.0f64..1000.0,
            k in 1.0f64..1000.0,
            r in 0.0f64..0.1,
            sigma in 0.01f64..2.0,
        ) {
            let inputs = OptionInputs::new(s, k, 0.0, r, sigma);
            prop_assert!((price(OptionType::Call, &inputs) - (s - k).max(0.0)).abs() < 1e-9);
            prop_assert!((price(OptionType::Put, &inputs) - (k - s).max(0.0)).abs() < 1e-9);
        }
    }
}
