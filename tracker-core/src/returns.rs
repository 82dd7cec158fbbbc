//! Return multiplier calculation

use crate::snapshot::MarketSnapshot;
use serde::{Deserialize, Serialize};

/// Multiplier and percent change relative to an entry value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Returns {
    /// `current / entry`, may be below 1 and is never clamped
    pub multiplier: f64,
    /// `(multiplier - 1) * 100`
    pub percent: f64,
}

/// Compute the return of `current` against `entry`.
///
/// A missing, non-positive or non-finite entry yields `{0, 0}` rather than an
/// error, and so does a ratio that overflows. Multipliers are persisted as
/// JSON, which has no representation for infinity.
pub fn compute(entry: Option<f64>, current: f64) -> Returns {
    match entry {
        Some(entry) if entry.is_finite() && entry > 0.0 => {
            let multiplier = current / entry;
            if !multiplier.is_finite() {
                return Returns::default();
            }
            Returns {
                multiplier,
                percent: (multiplier - 1.0) * 100.0,
            }
        }
        _ => Returns::default(),
    }
}

/// Return of a snapshot against the market cap at call time.
///
/// `None` when the snapshot carries no market cap (price-only sources), since
/// there is nothing comparable to the call-time value.
pub fn for_snapshot(market_cap_at_call: f64, snapshot: &MarketSnapshot) -> Option<Returns> {
    if !snapshot.has_market_cap() {
        return None;
    }
    Some(compute(Some(market_cap_at_call), snapshot.market_cap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotSource;

    #[test]
    fn test_compute_multiplier_and_percent() {
        let r = compute(Some(10_000.0), 20_000.0);
        assert_eq!(r.multiplier, 2.0);
        assert_eq!(r.percent, 100.0);

        let r = compute(Some(10_000.0), 5_000.0);
        assert_eq!(r.multiplier, 0.5);
        assert_eq!(r.percent, -50.0);
    }

    #[test]
    fn test_compute_fallbacks() {
        assert_eq!(compute(Some(0.0), 123.0), Returns { multiplier: 0.0, percent: 0.0 });
        assert_eq!(compute(None, 123.0), Returns { multiplier: 0.0, percent: 0.0 });
        assert_eq!(compute(Some(-1.0), 123.0), Returns::default());
        assert_eq!(compute(Some(f64::NAN), 123.0), Returns::default());
    }

    #[test]
    fn test_overflowing_ratio_falls_back() {
        // subnormal entry: the ratio is +inf
        assert_eq!(compute(Some(1e-321), 10_000.0), Returns::default());
        assert_eq!(compute(Some(1.0), f64::INFINITY), Returns::default());
        assert_eq!(compute(Some(1.0), f64::NAN), Returns::default());
    }

    #[test]
    fn test_no_clamping_for_large_returns() {
        let r = compute(Some(1.0), 1_000.0);
        assert_eq!(r.multiplier, 1_000.0);
    }

    #[test]
    fn test_for_snapshot_requires_market_cap() {
        let price_only = MarketSnapshot::price_only(0.01, SnapshotSource::Jupiter);
        assert!(for_snapshot(10_000.0, &price_only).is_none());

        let full = MarketSnapshot::with_market_cap(0.01, 30_000.0, SnapshotSource::DexScreener);
        assert_eq!(for_snapshot(10_000.0, &full).unwrap().multiplier, 3.0);

        // zero call-time market cap is the defined fallback, not a skip
        assert_eq!(for_snapshot(0.0, &full).unwrap(), Returns::default());
    }
}
