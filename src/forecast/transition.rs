use crate::forecast::series::{STATE_COUNT, StateSeries, TrafficState};
use crate::forecast::{ForecastError, ForecastOptions};
use serde::Deserialize;
use tracing::debug;

/// Fill policy for states never observed as a transition source.
///
/// An all-zero row would silently absorb probability mass, so unseen source
/// states must be filled explicitly: either the state is assumed to persist
/// (`SelfLoop`) or to move anywhere with equal probability (`Uniform`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroRowPolicy {
    #[default]
    SelfLoop,
    Uniform,
}

/// One-step state-transition probabilities estimated from a `StateSeries`.
///
/// Rows are indexed by source state and always sum to 1 within floating
/// tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    rows: [[f64; STATE_COUNT]; STATE_COUNT],
}

impl TransitionMatrix {
    /// Counts observed one-step transitions and normalizes them into a
    /// stochastic matrix.
    ///
    /// Only consecutive pairs whose timestamp gap is within ±10% of the
    /// inferred step count as direct transitions; pairs spanning a data gap
    /// are skipped rather than treated as one-step moves. Laplace add-one
    /// smoothing is applied when the total counted transitions fall below
    /// `options.smoothing_threshold`.
    pub fn fit(
        series: &StateSeries,
        options: &ForecastOptions,
    ) -> Result<TransitionMatrix, ForecastError> {
        if series.len() < 2 {
            return Err(ForecastError::InsufficientData(format!(
                "transition fit needs at least 2 observations, got {}",
                series.len()
            )));
        }
        let step_ms = series
            .step()
            .map(|step| step.as_millis() as i64)
            .ok_or_else(|| {
                ForecastError::InsufficientData(
                    "sampling interval could not be inferred".to_string(),
                )
            })?;
        let tolerance_ms = step_ms / 10;

        let mut counts = [[0u64; STATE_COUNT]; STATE_COUNT];
        let mut total: u64 = 0;
        let mut skipped: u64 = 0;
        for (previous, next) in series.pairs() {
            let gap_ms = (next.timestamp - previous.timestamp).whole_milliseconds() as i64;
            if (gap_ms - step_ms).abs() > tolerance_ms {
                skipped += 1;
                continue;
            }
            counts[previous.state.index()][next.state.index()] += 1;
            total += 1;
        }

        if skipped > 0 {
            debug!(skipped, "Pairs spanning data gaps excluded from transition counts");
        }
        if total == 0 {
            return Err(ForecastError::InsufficientData(
                "no one-step transitions observed at the inferred sampling interval".to_string(),
            ));
        }

        let smoothing = if total < options.smoothing_threshold {
            debug!(
                total,
                threshold = options.smoothing_threshold,
                "Sparse history, applying add-one smoothing"
            );
            1.0
        } else {
            0.0
        };

        let mut rows = [[0.0f64; STATE_COUNT]; STATE_COUNT];
        for from in 0..STATE_COUNT {
            let row_total: f64 = counts[from]
                .iter()
                .map(|&c| c as f64 + smoothing)
                .sum();
            if row_total > 0.0 {
                for to in 0..STATE_COUNT {
                    rows[from][to] = (counts[from][to] as f64 + smoothing) / row_total;
                }
            } else {
                // State never seen as a source; fill per policy.
                match options.zero_row_policy {
                    ZeroRowPolicy::SelfLoop => rows[from][from] = 1.0,
                    ZeroRowPolicy::Uniform => {
                        rows[from] = [1.0 / STATE_COUNT as f64; STATE_COUNT];
                    }
                }
            }
        }

        let matrix = TransitionMatrix { rows };
        debug_assert!(matrix.rows_are_stochastic());
        Ok(matrix)
    }

    pub fn probability(&self, from: TrafficState, to: TrafficState) -> f64 {
        self.rows[from.index()][to.index()]
    }

    pub fn row(&self, from: TrafficState) -> &[f64; STATE_COUNT] {
        &self.rows[from.index()]
    }

    /// Evolves a state distribution forward by `steps` one-step transitions.
    ///
    /// Exact repeated vector-matrix multiplication; horizons are small bounded
    /// integers, so no approximation is warranted.
    pub fn propagate(
        &self,
        distribution: [f64; STATE_COUNT],
        steps: u32,
    ) -> [f64; STATE_COUNT] {
        let mut current = distribution;
        for _ in 0..steps {
            let mut next = [0.0f64; STATE_COUNT];
            for (from, weight) in current.iter().enumerate() {
                for to in 0..STATE_COUNT {
                    next[to] += weight * self.rows[from][to];
                }
            }
            current = next;
        }
        current
    }

    fn rows_are_stochastic(&self) -> bool {
        self.rows.iter().all(|row| {
            let sum: f64 = row.iter().sum();
            (sum - 1.0).abs() < 1e-6 && row.iter().all(|&p| (0.0..=1.0).contains(&p))
        })
    }
}
