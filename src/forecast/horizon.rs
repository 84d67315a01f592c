use crate::forecast::ForecastError;
use crate::forecast::series::{STATE_COUNT, StateSeries, TrafficState};
use crate::forecast::transition::TransitionMatrix;
use std::time::Duration;

/// State-probability distribution at a requested horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub current_state: TrafficState,
    pub horizon_steps: u32,
    distribution: [f64; STATE_COUNT],
}

impl PredictionResult {
    pub fn probability(&self, state: TrafficState) -> f64 {
        self.distribution[state.index()]
    }

    /// Probability of the congestion target state at the horizon.
    pub fn congestion_probability(&self) -> f64 {
        self.distribution[TrafficState::Congested.index()]
    }

    pub fn distribution(&self) -> impl Iterator<Item = (TrafficState, f64)> + '_ {
        TrafficState::ALL
            .into_iter()
            .map(|state| (state, self.distribution[state.index()]))
    }
}

/// Distribution over states after `horizon_steps` one-step transitions from
/// `current_state`.
///
/// Horizon 0 is the point distribution at the current state; otherwise the
/// current state's one-hot vector is propagated through the exact matrix
/// power.
pub fn predict(
    matrix: &TransitionMatrix,
    current_state: TrafficState,
    horizon_steps: u32,
) -> PredictionResult {
    let mut one_hot = [0.0f64; STATE_COUNT];
    one_hot[current_state.index()] = 1.0;
    let distribution = matrix.propagate(one_hot, horizon_steps);

    debug_assert!(
        {
            let sum: f64 = distribution.iter().sum();
            (sum - 1.0).abs() < 1e-6
        },
        "prediction distribution does not sum to 1"
    );
    debug_assert!(
        distribution.iter().all(|&p| (0.0..=1.0).contains(&p)),
        "prediction probability out of [0, 1]"
    );

    PredictionResult {
        current_state,
        horizon_steps,
        distribution,
    }
}

/// Converts a wall-clock horizon into whole time-steps of the series'
/// sampling interval.
///
/// Rounds to the nearest step and rejects horizons that are not within ±10%
/// of a whole multiple of the step.
pub fn steps_for_horizon(
    horizon: Duration,
    step: Option<Duration>,
) -> Result<u32, ForecastError> {
    let step = step.ok_or_else(|| {
        ForecastError::Configuration(
            "cannot convert wall-clock horizon: sampling interval unknown".to_string(),
        )
    })?;
    let step_ms = step.as_millis() as i64;
    if step_ms == 0 {
        return Err(ForecastError::Configuration(
            "sampling interval is zero".to_string(),
        ));
    }
    let horizon_ms = horizon.as_millis() as i64;

    let steps = (horizon_ms as f64 / step_ms as f64).round() as i64;
    let remainder = (horizon_ms - steps * step_ms).abs();
    if remainder > step_ms / 10 {
        return Err(ForecastError::Configuration(format!(
            "horizon {horizon_ms}ms is not a near-integer multiple of the {step_ms}ms sampling interval"
        )));
    }
    Ok(steps as u32)
}

/// Convenience entry point: predicts from the series' most recent state at a
/// wall-clock horizon.
pub fn predict_at(
    matrix: &TransitionMatrix,
    series: &StateSeries,
    horizon: Duration,
) -> Result<PredictionResult, ForecastError> {
    let current_state = series.last_state().ok_or_else(|| {
        ForecastError::InsufficientData("series holds no observations".to_string())
    })?;
    let horizon_steps = steps_for_horizon(horizon, series.step())?;
    Ok(predict(matrix, current_state, horizon_steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastOptions;
    use time::OffsetDateTime;
    use time::macros::datetime;

    fn ts(seconds: u64) -> OffsetDateTime {
        datetime!(2026-08-01 06:00 UTC) + Duration::from_secs(seconds)
    }

    fn reference_matrix() -> TransitionMatrix {
        let records: Vec<_> = [
            (0u64, "free"),
            (60, "free"),
            (120, "congested"),
            (180, "congested"),
            (240, "free"),
        ]
        .iter()
        .map(|&(seconds, label)| (ts(seconds), label))
        .collect();
        let series = StateSeries::build(&records).expect("valid series");
        let options = ForecastOptions {
            smoothing_threshold: 0,
            ..ForecastOptions::default()
        };
        TransitionMatrix::fit(&series, &options).expect("fit")
    }

    #[test]
    fn horizon_zero_is_a_point_distribution() {
        let matrix = reference_matrix();

        let result = predict(&matrix, TrafficState::Congested, 0);

        assert_eq!(result.probability(TrafficState::Congested), 1.0);
        for state in [TrafficState::Free, TrafficState::Dense, TrafficState::Closed] {
            assert_eq!(result.probability(state), 0.0);
        }
    }

    #[test]
    fn distribution_sums_to_one_with_entries_in_range() {
        let matrix = reference_matrix();

        for horizon_steps in [1, 2, 5, 15, 60] {
            let result = predict(&matrix, TrafficState::Free, horizon_steps);
            let sum: f64 = result.distribution().map(|(_, p)| p).sum();
            assert!((sum - 1.0).abs() < 1e-6, "horizon {horizon_steps}: sum {sum}");
            for (state, p) in result.distribution() {
                assert!(
                    (0.0..=1.0).contains(&p),
                    "horizon {horizon_steps}, state {state:?}: {p}"
                );
            }
        }
    }

    #[test]
    fn one_step_from_free_splits_evenly() {
        let matrix = reference_matrix();

        let result = predict(&matrix, TrafficState::Free, 1);

        assert!((result.probability(TrafficState::Free) - 0.5).abs() < 1e-12);
        assert!((result.congestion_probability() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn propagation_composes_across_split_horizons() {
        let matrix = reference_matrix();

        for a in 0u32..4 {
            for b in 0u32..4 {
                let direct = predict(&matrix, TrafficState::Free, a + b);
                let staged = {
                    let intermediate = predict(&matrix, TrafficState::Free, a);
                    let mut distribution = [0.0f64; STATE_COUNT];
                    for (state, p) in intermediate.distribution() {
                        distribution[state.index()] = p;
                    }
                    matrix.propagate(distribution, b)
                };

                for (state, p) in direct.distribution() {
                    assert!(
                        (p - staged[state.index()]).abs() < 1e-9,
                        "a={a} b={b} state {state:?}: {p} vs {}",
                        staged[state.index()]
                    );
                }
            }
        }
    }

    #[test]
    fn wall_clock_horizon_rounds_to_whole_steps() -> Result<(), ForecastError> {
        let step = Some(Duration::from_secs(60));

        assert_eq!(steps_for_horizon(Duration::from_secs(900), step)?, 15);
        assert_eq!(steps_for_horizon(Duration::from_secs(898), step)?, 15);
        assert_eq!(steps_for_horizon(Duration::ZERO, step)?, 0);
        Ok(())
    }

    #[test]
    fn misaligned_horizon_is_a_configuration_error() {
        let step = Some(Duration::from_secs(60));

        let result = steps_for_horizon(Duration::from_secs(890), step);

        assert!(matches!(result, Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn unknown_step_is_a_configuration_error() {
        let result = steps_for_horizon(Duration::from_secs(900), None);

        assert!(matches!(result, Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn predict_at_uses_most_recent_state() -> Result<(), ForecastError> {
        let records: Vec<_> = [(0u64, "free"), (60, "congested")]
            .iter()
            .map(|&(seconds, label)| (ts(seconds), label))
            .collect();
        let series = StateSeries::build(&records)?;
        let options = ForecastOptions {
            smoothing_threshold: 0,
            ..ForecastOptions::default()
        };
        let matrix = TransitionMatrix::fit(&series, &options)?;

        let result = predict_at(&matrix, &series, Duration::from_secs(120))?;

        assert_eq!(result.current_state, TrafficState::Congested);
        assert_eq!(result.horizon_steps, 2);
        Ok(())
    }
}
