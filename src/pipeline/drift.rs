//! Two-sample Kolmogorov-Smirnov drift test and the drift report

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Largest sample size for which the exact p-value is computed
pub const EXACT_MAX_SAMPLES: usize = 10_000;

/// Statistic and p-value of a two-sample KS test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Kolmogorov distribution tail `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`.
///
/// Returns 1.0 when the series does not settle, which only happens for tiny λ.
fn kolmogorov_tail(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let jf = j as f64;
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= 0.001 * previous || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        previous = term.abs();
    }
    1.0
}

/// Exact `P(D ≥ d)` for samples of sizes `n` and `m` without ties.
///
/// Walks the lattice paths from `(0, 0)` to `(n, m)`: with `i` values of one
/// sample and `j` of the other taken, the ECDF gap is `|i·m - j·n| / (n·m)`.
/// The forward recursion carries the probability that a uniformly drawn path
/// reaches each point while its gap stays below `d`; only the band of points
/// satisfying that is visited.
fn exact_p_value(n: usize, m: usize, d: f64) -> f64 {
    // d is a multiple of 1/(n·m)
    let h = (d * n as f64 * m as f64).round() as i64;
    if h <= 0 {
        return 1.0;
    }
    let (ni, mi) = (n as i64, m as i64);
    // Columns j of row i with |i·m - j·n| < h
    let band = |i: usize| -> (usize, usize) {
        let centre = i as i64 * mi;
        let lo = (centre - h).div_euclid(ni) + 1;
        let hi = (centre + h - 1).div_euclid(ni);
        (lo.max(0) as usize, hi.min(mi) as usize)
    };

    let mut row = vec![0.0f64; m + 1];
    let mut next = vec![0.0f64; m + 1];
    row[0] = 1.0;
    for i in 0..=n {
        let (lo, hi) = band(i);
        for j in lo..=hi {
            let p = row[j];
            if p == 0.0 {
                continue;
            }
            let remaining = ((n - i) + (m - j)) as f64;
            if j < hi {
                row[j + 1] += p * (m - j) as f64 / remaining;
            }
            if i < n {
                next[j] += p * (n - i) as f64 / remaining;
            }
        }
        if i == n {
            return (1.0 - row[m]).clamp(0.0, 1.0);
        }
        let (next_lo, _) = band(i + 1);
        next[..next_lo].fill(0.0);
        std::mem::swap(&mut row, &mut next);
        next.fill(0.0);
    }
    0.0
}

/// Two-sample KS test. NaN values are ignored.
///
/// When both samples have at most [`EXACT_MAX_SAMPLES`] values the p-value is
/// exact under the no-ties null. Larger samples use the asymptotic
/// distribution with Stephens' correction, `λ = (√N + 0.12 + 0.11/√N) · D`
/// where `N = n·m/(n+m)`, which can differ from the exact value by enough to
/// move a column across a drift threshold when samples are small. An empty
/// sample gives `D = 0, p = 1`.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> KsResult {
    let mut x: Vec<f64> = a.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut y: Vec<f64> = b.iter().copied().filter(|v| !v.is_nan()).collect();
    if x.is_empty() || y.is_empty() {
        return KsResult {
            statistic: 0.0,
            p_value: 1.0,
        };
    }
    x.sort_by(f64::total_cmp);
    y.sort_by(f64::total_cmp);

    let (n, m) = (x.len() as f64, y.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < x.len() && j < y.len() {
        let v = x[i].min(y[j]);
        while i < x.len() && x[i] <= v {
            i += 1;
        }
        while j < y.len() && y[j] <= v {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }

    let p_value = if x.len().max(y.len()) <= EXACT_MAX_SAMPLES {
        exact_p_value(x.len(), y.len(), d)
    } else {
        let en = (n * m / (n + m)).sqrt();
        kolmogorov_tail((en + 0.12 + 0.11 / en) * d)
    };
    KsResult { statistic: d, p_value }
}

/// A column drifts when its p-value is at or below the threshold
pub fn is_drift(p_value: f64, threshold: f64) -> bool {
    p_value <= threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_status: bool,
}

/// Per-column drift results keyed by column name
pub type DriftReport = BTreeMap<String, ColumnDrift>;

/// Whether any column of a report drifted
pub fn has_drift(report: &DriftReport) -> bool {
    report.values().any(|c| c.drift_status)
}
