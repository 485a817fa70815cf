//! Asymptotic Kolmogorov distribution.
//!
//! `Q_KS(λ) = 2 Σ_{k≥1} (-1)^{k-1} exp(-2 k² λ²)` is the limiting survival
//! function of `sqrt(n) * D_n`. Small `λ` uses the Jacobi-theta form
//! `1 - sqrt(2π)/λ Σ exp(-(2k-1)² π² / (8 λ²))`, which converges fast there.

use std::f64::consts::PI;

const SWITCH: f64 = 1.18;

/// Survival function `P(K > lambda)` of the Kolmogorov distribution.
pub fn survival(lambda: f64) -> f64 {
    if lambda.is_nan() {
        return f64::NAN;
    }
    if lambda <= 0.0 {
        return 1.0;
    }
    let q = if lambda < SWITCH {
        let y = (-PI * PI / (8.0 * lambda * lambda)).exp();
        let y8 = y.powi(8);
        let series = y * (1.0 + y8 * (1.0 + y8 * y8 * (1.0 + y8 * y8 * y8)));
        1.0 - (2.0 * PI).sqrt() / lambda * series
    } else {
        let x = (-2.0 * lambda * lambda).exp();
        2.0 * (x - x.powi(4) + x.powi(9))
    };
    q.clamp(0.0, 1.0)
}

/// Two-sided p-value for a one-sample KS statistic `d` at sample size `n`.
///
/// Applies Stephens' correction `(sqrt(n) + 0.12 + 0.11/sqrt(n)) * d`.
pub fn ks_pvalue(d: f64, n: usize) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    let sn = (n as f64).sqrt();
    survival((sn + 0.12 + 0.11 / sn) * d)
}
