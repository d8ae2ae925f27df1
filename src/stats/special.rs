//! Special functions behind critical values and the binomial PMF.
//!
//! # Algorithms
//!
//! - `ln Γ`: Lanczos approximation (g = 7, 9 coefficients).
//! - Regularized incomplete beta: continued fraction evaluated with
//!   Lentz's method, using `I_x(a,b) = 1 − I_{1−x}(b,a)` past the mode.
//! - F quantile: bisection on the CDF.
//! - Two-sided t critical value: `t²(df) ~ F(1, df)`.

use std::f64::consts::PI;

/// Lanczos approximation of ln Γ(x) for x > 0.
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision, clippy::unreadable_literal)]
    const LANCZOS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        // Reflection
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let z = x - 1.0;
    let series = LANCZOS[1..]
        .iter()
        .enumerate()
        .fold(LANCZOS[0], |acc, (i, c)| acc + c / (z + i as f64 + 1.0));
    let t = z + G + 0.5;
    0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + series.ln()
}

/// ln B(a, b).
#[must_use]
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Regularized incomplete beta function I_x(a, b).
#[must_use]
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(1.0 - x, b, a);
    }

    let ln_front = a * x.ln() + b * (1.0 - x).ln() - ln_beta(a, b);
    ln_front.exp() / a * beta_continued_fraction(x, a, b)
}

fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_TERMS: usize = 300;
    const EPS: f64 = 1e-14;
    const FLOOR: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < FLOOR { FLOOR } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - (a + b) * x / (a + 1.0));
    let mut h = d;

    for m in 1..=MAX_TERMS {
        let m = m as f64;
        let two_m = 2.0 * m;

        let even = m * (b - m) * x / ((a + two_m - 1.0) * (a + two_m));
        d = 1.0 / guard(1.0 + even * d);
        c = guard(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + two_m) * (a + two_m + 1.0));
        d = 1.0 / guard(1.0 + odd * d);
        c = guard(1.0 + odd / c);
        let step = d * c;
        h *= step;

        if (step - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// CDF of the F distribution. Returns 0 for x <= 0 and NaN for invalid df.
#[must_use]
pub fn f_cdf(x: f64, df1: f64, df2: f64) -> f64 {
    if x.is_nan() || !(df1 > 0.0 && df2 > 0.0) {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    let y = df1 * x / (df1 * x + df2);
    regularized_incomplete_beta(y, df1 / 2.0, df2 / 2.0)
}

/// Quantile of the F distribution: x with `f_cdf(x) = p`.
///
/// Returns `None` when `p` is outside (0, 1) or a df is not positive.
#[must_use]
pub fn f_quantile(p: f64, df1: f64, df2: f64) -> Option<f64> {
    if !(p > 0.0 && p < 1.0 && df1 > 0.0 && df2 > 0.0) {
        return None;
    }

    let mut hi = 1.0;
    while f_cdf(hi, df1, df2) < p {
        hi *= 2.0;
        if hi > 1e12 {
            return Some(hi);
        }
    }

    let mut lo = 0.0_f64;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if f_cdf(mid, df1, df2) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-12 * hi.max(1.0) {
            break;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Upper-tail F critical value at level `alpha`.
#[must_use]
pub fn f_critical(alpha: f64, df1: f64, df2: f64) -> Option<f64> {
    f_quantile(1.0 - alpha, df1, df2)
}

/// Two-sided Student t critical value at level `alpha`.
#[must_use]
pub fn t_critical_two_sided(alpha: f64, df: f64) -> Option<f64> {
    f_critical(alpha, 1.0, df).map(f64::sqrt)
}

/// P(X = k) for X ~ Binomial(n, p).
#[must_use]
pub fn binomial_pmf(k: u64, n: u64, p: f64) -> f64 {
    if k > n || !(0.0..=1.0).contains(&p) {
        return 0.0;
    }
    if p == 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p == 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }

    let (n_f, k_f) = (n as f64, k as f64);
    let ln_choose = ln_gamma(n_f + 1.0) - ln_gamma(k_f + 1.0) - ln_gamma(n_f - k_f + 1.0);
    (ln_choose + k_f * p.ln() + (n_f - k_f) * (1.0 - p).ln()).exp()
}
