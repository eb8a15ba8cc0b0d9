//! Backward asof join of exchange observations onto a reference series.
//!
//! For each exchange observation the matching reference observation is the
//! latest one at or before it. Reference samples sharing a timestamp resolve
//! to the last one in sorted order. No forward matching, no interpolation.

use chrono::NaiveDateTime;
use p2p_core::config::{AsofConfig, ExchangeBasis};
use p2p_core::{round_dp, ExchangeObservation, ReferenceObservation, ResidualPoint};

/// Decimal places of emitted residuals.
pub const RESIDUAL_DECIMALS: i32 = 2;

/// Counts from one residual computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidualStats {
    /// Exchange observations considered.
    pub exchange_rows: usize,
    /// Residuals emitted.
    pub emitted: usize,
    /// Exchange observations preceding every reference observation.
    pub unmatched: usize,
    /// Matched observations whose difference is not a number.
    pub undefined: usize,
}

/// Index of the latest `right` key at or before each `left` key.
///
/// Both slices must be sorted ascending. Runs in a single pass.
pub fn asof_backward<K: Ord>(left: &[K], right: &[K]) -> Vec<Option<usize>> {
    let mut matches = Vec::with_capacity(left.len());
    let mut cursor = 0;
    let mut current = None;

    for key in left {
        while cursor < right.len() && right[cursor] <= *key {
            current = Some(cursor);
            cursor += 1;
        }
        matches.push(current);
    }

    matches
}

/// Computes exchange-minus-reference residuals.
#[derive(Debug, Clone, Default)]
pub struct AsofResidualCalculator {
    basis: ExchangeBasis,
}

impl AsofResidualCalculator {
    /// Create a new calculator.
    pub fn new(config: &AsofConfig) -> Self {
        Self {
            basis: config.exchange_basis,
        }
    }

    /// Wall-clock instant of an exchange observation used for matching.
    pub fn join_key(&self, obs: &ExchangeObservation) -> NaiveDateTime {
        match self.basis {
            ExchangeBasis::Local => obs.timestamp.naive_local(),
            ExchangeBasis::Utc => obs.timestamp.naive_utc(),
        }
    }

    /// Join both series and compute residuals, ordered by join key.
    ///
    /// Inputs need not be sorted; both are stable-sorted here.
    pub fn compute(
        &self,
        reference: &[ReferenceObservation],
        exchange: &[ExchangeObservation],
    ) -> (Vec<ResidualPoint>, ResidualStats) {
        let mut reference: Vec<&ReferenceObservation> = reference.iter().collect();
        reference.sort_by_key(|obs| obs.timestamp);

        let mut exchange: Vec<(NaiveDateTime, &ExchangeObservation)> =
            exchange.iter().map(|obs| (self.join_key(obs), obs)).collect();
        exchange.sort_by_key(|(key, _)| *key);

        let left: Vec<NaiveDateTime> = exchange.iter().map(|(key, _)| *key).collect();
        let right: Vec<NaiveDateTime> = reference.iter().map(|obs| obs.timestamp).collect();
        let matches = asof_backward(&left, &right);

        let mut stats = ResidualStats {
            exchange_rows: exchange.len(),
            ..ResidualStats::default()
        };
        let mut residuals = Vec::with_capacity(exchange.len());

        for ((_, obs), matched) in exchange.iter().zip(matches) {
            let Some(idx) = matched else {
                stats.unmatched += 1;
                continue;
            };
            let value = round_dp(obs.value - reference[idx].value, RESIDUAL_DECIMALS);
            if !value.is_finite() {
                stats.undefined += 1;
                continue;
            }
            residuals.push(ResidualPoint {
                timestamp: obs.timestamp,
                value,
            });
        }

        stats.emitted = residuals.len();
        (residuals, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, FixedOffset};

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn aware(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn reference(points: &[(&str, f64)]) -> Vec<ReferenceObservation> {
        points
            .iter()
            .map(|&(ts, value)| ReferenceObservation {
                timestamp: naive(ts),
                value,
            })
            .collect()
    }

    fn exchange(points: &[(&str, f64)]) -> Vec<ExchangeObservation> {
        points
            .iter()
            .map(|&(ts, value)| ExchangeObservation {
                timestamp: aware(ts),
                value,
            })
            .collect()
    }

    #[test]
    fn test_asof_backward_indices() {
        let left = [1, 3, 5, 7];
        let right = [2, 3, 3, 6];
        assert_eq!(
            asof_backward(&left, &right),
            vec![None, Some(2), Some(2), Some(3)]
        );
        assert_eq!(asof_backward::<i32>(&[1, 2], &[]), vec![None, None]);
    }

    #[test]
    fn test_residual_after_reference() {
        let (residuals, stats) = AsofResidualCalculator::default().compute(
            &reference(&[("2024-05-01 09:00", 6.90)]),
            &exchange(&[
                ("2024-05-01T08:00:00Z", 6.80),
                ("2024-05-01T09:05:00Z", 6.95),
            ]),
        );

        assert_eq!(residuals.len(), 1);
        assert_eq!(residuals[0].timestamp, aware("2024-05-01T09:05:00Z"));
        assert_abs_diff_eq!(residuals[0].value, 0.05, epsilon = 1e-12);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.emitted, 1);
    }

    #[test]
    fn test_exact_timestamp_matches() {
        let (residuals, _) = AsofResidualCalculator::default().compute(
            &reference(&[("2024-05-01 09:00", 6.90)]),
            &exchange(&[("2024-05-01T09:00:00Z", 7.00)]),
        );
        assert_abs_diff_eq!(residuals[0].value, 0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_unsorted_inputs_are_sorted() {
        let (residuals, _) = AsofResidualCalculator::default().compute(
            &reference(&[("2024-05-02 09:00", 7.00), ("2024-05-01 09:00", 6.90)]),
            &exchange(&[
                ("2024-05-02T12:00:00Z", 7.10),
                ("2024-05-01T12:00:00Z", 7.10),
            ]),
        );

        assert_eq!(residuals.len(), 2);
        assert_abs_diff_eq!(residuals[0].value, 0.20, epsilon = 1e-12);
        assert_abs_diff_eq!(residuals[1].value, 0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_tied_reference_uses_last_in_order() {
        let (residuals, _) = AsofResidualCalculator::default().compute(
            &reference(&[("2024-05-01 09:00", 6.90), ("2024-05-01 09:00", 6.86)]),
            &exchange(&[("2024-05-01T10:00:00Z", 7.00)]),
        );
        assert_abs_diff_eq!(residuals[0].value, 0.14, epsilon = 1e-12);
    }

    #[test]
    fn test_local_basis_drops_offset() {
        let reference = reference(&[("2024-05-01 09:00", 6.90)]);
        // 08:30 local is 12:30 UTC
        let exchange = exchange(&[("2024-05-01T08:30:00-04:00", 6.95)]);

        let (local, _) = AsofResidualCalculator::default().compute(&reference, &exchange);
        assert!(local.is_empty());

        let utc = AsofResidualCalculator::new(&AsofConfig {
            exchange_basis: ExchangeBasis::Utc,
        });
        let (converted, _) = utc.compute(&reference, &exchange);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].timestamp.offset().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_nan_values_yield_no_row() {
        let (residuals, stats) = AsofResidualCalculator::default().compute(
            &reference(&[("2024-05-01 09:00", f64::NAN)]),
            &exchange(&[("2024-05-01T09:05:00Z", 6.95)]),
        );
        assert!(residuals.is_empty());
        assert_eq!(stats.undefined, 1);
    }

    #[test]
    fn test_residual_rounding() {
        let (residuals, _) = AsofResidualCalculator::default().compute(
            &reference(&[("2024-05-01 09:00", 6.96)]),
            &exchange(&[("2024-05-01T09:05:00Z", 7.123456)]),
        );
        assert_eq!(residuals[0].value, 0.16);
    }
}
