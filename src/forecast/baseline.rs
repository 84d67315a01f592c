//! Logistic-regression baseline and the Markov-vs-baseline comparison
//! protocol.
//!
//! The baseline predicts the probability that the segment is congested at
//! +`horizon_steps` from the current state, the time of day and the weekday,
//! mirroring the feature set the service historically used. The comparison
//! splits the history chronologically, fits both models on the early portion
//! and scores them on the held-out tail.

use crate::forecast::metrics::{accuracy, log_loss, mean_absolute_error, roc_auc};
use crate::forecast::series::{Observation, STATE_COUNT, StateSeries, TrafficState};
use crate::forecast::transition::TransitionMatrix;
use crate::forecast::{ForecastError, ForecastOptions, horizon};
use time::OffsetDateTime;
use tracing::debug;

/// One-hot state, cyclic hour-of-day (sin/cos) and weekday.
const FEATURE_COUNT: usize = STATE_COUNT + 3;
const FEATURE_SCHEMA: [&str; FEATURE_COUNT] = [
    "state_free",
    "state_dense",
    "state_congested",
    "state_closed",
    "hour_sin",
    "hour_cos",
    "weekday",
];

const GRADIENT_ITERATIONS: usize = 600;
const LEARNING_RATE: f64 = 0.3;
const MIN_FIT_SAMPLES: usize = 10;

/// Fitted logistic-regression parameters plus the standardization statistics
/// of the fit split. Immutable after `fit`.
#[derive(Debug, Clone)]
pub struct BaselineModel {
    weights: [f64; FEATURE_COUNT],
    intercept: f64,
    means: [f64; FEATURE_COUNT],
    stds: [f64; FEATURE_COUNT],
}

impl BaselineModel {
    fn fit(features: &[[f64; FEATURE_COUNT]], labels: &[bool]) -> BaselineModel {
        let count = features.len() as f64;

        let mut means = [0.0f64; FEATURE_COUNT];
        for row in features {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= count;
        }

        let mut stds = [0.0f64; FEATURE_COUNT];
        for row in features {
            for ((std, value), mean) in stds.iter_mut().zip(row).zip(&means) {
                *std += (value - mean) * (value - mean);
            }
        }
        for std in &mut stds {
            *std = (*std / count).sqrt();
            // Constant features carry no signal; leave them centered only.
            if *std < 1e-12 {
                *std = 1.0;
            }
        }

        let standardized: Vec<[f64; FEATURE_COUNT]> = features
            .iter()
            .map(|row| standardize(row, &means, &stds))
            .collect();

        let mut weights = [0.0f64; FEATURE_COUNT];
        let mut intercept = 0.0f64;
        for _ in 0..GRADIENT_ITERATIONS {
            let mut gradient = [0.0f64; FEATURE_COUNT];
            let mut gradient_intercept = 0.0f64;
            for (row, &label) in standardized.iter().zip(labels) {
                let target = if label { 1.0 } else { 0.0 };
                let error = sigmoid(dot(&weights, row) + intercept) - target;
                for (g, value) in gradient.iter_mut().zip(row) {
                    *g += error * value;
                }
                gradient_intercept += error;
            }
            for (w, g) in weights.iter_mut().zip(&gradient) {
                *w -= LEARNING_RATE * g / count;
            }
            intercept -= LEARNING_RATE * gradient_intercept / count;
        }

        BaselineModel {
            weights,
            intercept,
            means,
            stds,
        }
    }

    fn predict_probability(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let standardized = standardize(features, &self.means, &self.stds);
        sigmoid(dot(&self.weights, &standardized) + self.intercept)
    }

    pub fn feature_schema() -> &'static [&'static str] {
        &FEATURE_SCHEMA
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn standardize(
    features: &[f64; FEATURE_COUNT],
    means: &[f64; FEATURE_COUNT],
    stds: &[f64; FEATURE_COUNT],
) -> [f64; FEATURE_COUNT] {
    let mut out = [0.0f64; FEATURE_COUNT];
    for i in 0..FEATURE_COUNT {
        out[i] = (features[i] - means[i]) / stds[i];
    }
    out
}

fn feature_vector(observation: &Observation) -> [f64; FEATURE_COUNT] {
    let mut features = [0.0f64; FEATURE_COUNT];
    features[observation.state.index()] = 1.0;
    let hour = observation.timestamp.hour() as f64
        + observation.timestamp.minute() as f64 / 60.0;
    let angle = hour / 24.0 * std::f64::consts::TAU;
    features[STATE_COUNT] = angle.sin();
    features[STATE_COUNT + 1] = angle.cos();
    features[STATE_COUNT + 2] =
        observation.timestamp.weekday().number_days_from_monday() as f64;
    features
}

/// Per-sample scores over the held-out split.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSample {
    pub timestamp: OffsetDateTime,
    pub markov_probability: f64,
    pub baseline_probability: f64,
    pub outcome: bool,
}

/// Aggregate scores of one model against the realized outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelScore {
    pub mean_absolute_error: f64,
    pub log_loss: f64,
    pub accuracy: f64,
    /// None when the held-out outcomes are single-class.
    pub roc_auc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub horizon_steps: u32,
    pub fit_samples: usize,
    pub eval_samples: usize,
    pub markov: ModelScore,
    pub baseline: ModelScore,
    pub samples: Vec<ComparisonSample>,
}

#[derive(Debug, Clone)]
struct Sample {
    observation_index: usize,
    timestamp: OffsetDateTime,
    current_state: TrafficState,
    features: [f64; FEATURE_COUNT],
    outcome: bool,
}

/// Fits the baseline and a fit-portion Markov matrix, then scores both on the
/// chronological tail of the series.
pub fn fit_and_compare(
    series: &StateSeries,
    horizon_steps: u32,
    options: &ForecastOptions,
) -> Result<ComparisonReport, ForecastError> {
    if !(options.split_ratio > 0.0 && options.split_ratio < 1.0) {
        return Err(ForecastError::Configuration(format!(
            "split_ratio must lie strictly between 0 and 1, got {}",
            options.split_ratio
        )));
    }
    if horizon_steps == 0 {
        return Err(ForecastError::Configuration(
            "comparison horizon must be at least one step".to_string(),
        ));
    }

    let samples = build_samples(series, horizon_steps)?;
    let (fit, eval) = chronological_split(&samples, options.split_ratio);
    if fit.len() < MIN_FIT_SAMPLES || eval.is_empty() {
        return Err(ForecastError::InsufficientData(format!(
            "comparison needs at least {MIN_FIT_SAMPLES} fit samples and one \
             evaluation sample, got {} and {}",
            fit.len(),
            eval.len()
        )));
    }

    // Both models see exactly the observations that produced the fit split,
    // labels included; nothing from the evaluation period.
    let Some(last_fit) = fit.last() else {
        return Err(ForecastError::InsufficientData(
            "comparison fit split is empty".to_string(),
        ));
    };
    let matrix_prefix =
        series.prefix(last_fit.observation_index + horizon_steps as usize + 1);
    let matrix = TransitionMatrix::fit(&matrix_prefix, options)?;

    let fit_features: Vec<_> = fit.iter().map(|s| s.features).collect();
    let fit_labels: Vec<_> = fit.iter().map(|s| s.outcome).collect();
    let model = BaselineModel::fit(&fit_features, &fit_labels);

    let mut scored = Vec::with_capacity(eval.len());
    for sample in eval {
        let markov_probability = horizon::predict(&matrix, sample.current_state, horizon_steps)
            .congestion_probability();
        let baseline_probability = model.predict_probability(&sample.features);
        scored.push(ComparisonSample {
            timestamp: sample.timestamp,
            markov_probability,
            baseline_probability,
            outcome: sample.outcome,
        });
    }

    let markov_probabilities: Vec<_> = scored.iter().map(|s| s.markov_probability).collect();
    let baseline_probabilities: Vec<_> =
        scored.iter().map(|s| s.baseline_probability).collect();
    let outcomes: Vec<_> = scored.iter().map(|s| s.outcome).collect();

    debug!(
        fit = fit.len(),
        eval = eval.len(),
        horizon_steps,
        "Model comparison scored"
    );

    Ok(ComparisonReport {
        horizon_steps,
        fit_samples: fit.len(),
        eval_samples: eval.len(),
        markov: score_model(&markov_probabilities, &outcomes),
        baseline: score_model(&baseline_probabilities, &outcomes),
        samples: scored,
    })
}

fn score_model(probabilities: &[f64], outcomes: &[bool]) -> ModelScore {
    ModelScore {
        mean_absolute_error: mean_absolute_error(probabilities, outcomes),
        log_loss: log_loss(probabilities, outcomes),
        accuracy: accuracy(probabilities, outcomes),
        roc_auc: roc_auc(probabilities, outcomes),
    }
}

/// Pairs each observation with the one `horizon_steps` ahead. Pairs whose
/// actual timestamp gap deviates more than 10% from the expected horizon are
/// skipped, consistent with the transition estimator's gap handling.
fn build_samples(
    series: &StateSeries,
    horizon_steps: u32,
) -> Result<Vec<Sample>, ForecastError> {
    let step = series.step().ok_or_else(|| {
        ForecastError::InsufficientData(
            "sampling interval could not be inferred".to_string(),
        )
    })?;
    let expected_gap_ms = step.as_millis() as i64 * horizon_steps as i64;
    let tolerance_ms = expected_gap_ms / 10;

    let observations = series.observations();
    let horizon = horizon_steps as usize;
    let mut samples = Vec::new();
    for (index, current) in observations.iter().enumerate() {
        let Some(future) = observations.get(index + horizon) else {
            break;
        };
        let gap_ms = (future.timestamp - current.timestamp).whole_milliseconds() as i64;
        if (gap_ms - expected_gap_ms).abs() > tolerance_ms {
            continue;
        }
        samples.push(Sample {
            observation_index: index,
            timestamp: current.timestamp,
            current_state: current.state,
            features: feature_vector(current),
            outcome: future.state.is_congested(),
        });
    }
    Ok(samples)
}

/// Splits in timestamp order; the fit portion never contains a sample later
/// than any evaluation sample.
fn chronological_split(samples: &[Sample], split_ratio: f64) -> (&[Sample], &[Sample]) {
    let split = (split_ratio * samples.len() as f64).floor() as usize;
    samples.split_at(split.min(samples.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use time::macros::datetime;

    fn ts(seconds: u64) -> OffsetDateTime {
        datetime!(2026-08-03 06:00 UTC) + Duration::from_secs(seconds)
    }

    /// Alternating 15-minute blocks of congestion and free flow at 60s
    /// sampling, long enough that the persistence signal dominates.
    fn blocky_series(blocks: usize) -> StateSeries {
        let mut records = Vec::new();
        let mut second = 0u64;
        for block in 0..blocks {
            let label = if block % 2 == 0 { "congested" } else { "free" };
            for _ in 0..15 {
                records.push((ts(second), label));
                second += 60;
            }
        }
        StateSeries::build(&records).expect("valid series")
    }

    #[test]
    fn split_never_leaks_future_into_fit() -> Result<(), ForecastError> {
        let series = blocky_series(8);
        let samples = build_samples(&series, 1)?;

        let (fit, eval) = chronological_split(&samples, 0.8);

        let last_fit = fit.last().expect("fit samples").timestamp;
        let first_eval = eval.first().expect("eval samples").timestamp;
        assert!(last_fit < first_eval);
        assert!(fit.iter().all(|s| s.timestamp <= last_fit));
        assert!(eval.iter().all(|s| s.timestamp >= first_eval));
        Ok(())
    }

    #[test]
    fn gap_crossing_samples_are_skipped() -> Result<(), ForecastError> {
        // 60s cadence with one 600s hole after the fourth observation.
        let mut records = vec![
            (ts(0), "free"),
            (ts(60), "free"),
            (ts(120), "free"),
            (ts(180), "free"),
        ];
        for i in 0..4u64 {
            records.push((ts(780 + i * 60), "congested"));
        }
        let series = StateSeries::build(&records)?;

        let samples = build_samples(&series, 1)?;

        // 7 consecutive pairs minus the one crossing the hole.
        assert_eq!(samples.len(), 6);
        assert!(samples.iter().all(|s| s.timestamp != ts(180)));
        Ok(())
    }

    #[test]
    fn baseline_learns_state_persistence() {
        let series = blocky_series(8);
        let samples = build_samples(&series, 1).expect("samples");
        let features: Vec<_> = samples.iter().map(|s| s.features).collect();
        let labels: Vec<_> = samples.iter().map(|s| s.outcome).collect();

        let model = BaselineModel::fit(&features, &labels);

        let congested_now = samples
            .iter()
            .find(|s| s.current_state == TrafficState::Congested)
            .expect("congested sample");
        let free_now = samples
            .iter()
            .find(|s| s.current_state == TrafficState::Free)
            .expect("free sample");
        let p_congested = model.predict_probability(&congested_now.features);
        let p_free = model.predict_probability(&free_now.features);
        assert!(
            p_congested > p_free,
            "persistence not learned: {p_congested} vs {p_free}"
        );
    }

    #[test]
    fn report_scores_both_models_on_the_holdout() -> Result<(), ForecastError> {
        let series = blocky_series(10);
        let options = ForecastOptions {
            smoothing_threshold: 0,
            split_ratio: 0.8,
            ..ForecastOptions::default()
        };

        let report = fit_and_compare(&series, 1, &options)?;

        assert_eq!(report.horizon_steps, 1);
        assert!(report.fit_samples >= MIN_FIT_SAMPLES);
        assert_eq!(report.samples.len(), report.eval_samples);
        for sample in &report.samples {
            assert!((0.0..=1.0).contains(&sample.markov_probability));
            assert!((0.0..=1.0).contains(&sample.baseline_probability));
        }
        for score in [&report.markov, &report.baseline] {
            assert!(score.mean_absolute_error.is_finite());
            assert!(score.log_loss.is_finite());
            assert!((0.0..=1.0).contains(&score.accuracy));
        }
        Ok(())
    }

    #[test]
    fn short_series_is_insufficient_data() {
        let records: Vec<_> = (0..6u64).map(|i| (ts(i * 60), "free")).collect();
        let series = StateSeries::build(&records).expect("valid series");

        let result = fit_and_compare(&series, 1, &ForecastOptions::default());

        assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
    }

    #[test]
    fn invalid_split_ratio_is_a_configuration_error() {
        let series = blocky_series(4);
        for split_ratio in [0.0, 1.0, 1.5, -0.2] {
            let options = ForecastOptions {
                split_ratio,
                ..ForecastOptions::default()
            };

            let result = fit_and_compare(&series, 1, &options);

            assert!(
                matches!(result, Err(ForecastError::Configuration(_))),
                "split_ratio {split_ratio} accepted"
            );
        }
    }

    #[test]
    fn zero_horizon_is_a_configuration_error() {
        let series = blocky_series(4);

        let result = fit_and_compare(&series, 0, &ForecastOptions::default());

        assert!(matches!(result, Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn feature_schema_matches_feature_vector_width() {
        assert_eq!(BaselineModel::feature_schema().len(), FEATURE_COUNT);
    }
}
