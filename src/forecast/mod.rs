use crate::error::AppError;
use crate::history;
use crate::state::{AppState, HistoryStatus};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

pub mod baseline;
pub mod horizon;
pub mod metrics;
pub mod series;
pub mod transition;

pub use baseline::{ComparisonReport, ComparisonSample, ModelScore};
pub use horizon::PredictionResult;
pub use series::{Observation, StateSeries, TrafficState};
pub use transition::{TransitionMatrix, ZeroRowPolicy};

pub const DEFAULT_HORIZON: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SMOOTHING_THRESHOLD: u64 = 30;
pub const DEFAULT_SPLIT_RATIO: f64 = 0.8;

/// Engine error taxonomy. All variants surface synchronously at the call
/// that detects them; nothing is retried internally.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid data at row {row}: {reason}")]
    InvalidData { row: usize, reason: String },
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Tunables shared by the estimator, predictor and comparator.
#[derive(Debug, Clone)]
pub struct ForecastOptions {
    /// Wall-clock prediction horizon, converted to whole sampling steps.
    pub horizon: Duration,
    /// Total-transition count below which Laplace smoothing activates.
    pub smoothing_threshold: u64,
    /// Fraction of comparison samples used for fitting, the rest held out.
    pub split_ratio: f64,
    pub zero_row_policy: ZeroRowPolicy,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            smoothing_threshold: DEFAULT_SMOOTHING_THRESHOLD,
            split_ratio: DEFAULT_SPLIT_RATIO,
            zero_row_policy: ZeroRowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub prediction: PredictionResult,
    /// None when the history is too sparse for a meaningful comparison; the
    /// prediction itself still stands.
    pub comparison: Option<ComparisonReport>,
    pub observations: usize,
}

/// Full batch cycle: raw records → series → matrix → prediction at the
/// configured horizon, plus the baseline comparison where the history
/// supports one.
pub fn run_forecast_cycle<S: AsRef<str>>(
    records: &[(OffsetDateTime, S)],
    options: &ForecastOptions,
) -> Result<ForecastOutput, ForecastError> {
    let series = StateSeries::build(records)?;
    let matrix = TransitionMatrix::fit(&series, options)?;
    let horizon_steps = horizon::steps_for_horizon(options.horizon, series.step())?;
    let current_state = series.last_state().ok_or_else(|| {
        ForecastError::InsufficientData("series holds no observations".to_string())
    })?;
    let prediction = horizon::predict(&matrix, current_state, horizon_steps);

    let comparison = match baseline::fit_and_compare(&series, horizon_steps, options) {
        Ok(report) => Some(report),
        Err(ForecastError::InsufficientData(reason)) => {
            warn!(reason = %reason, "Skipping model comparison");
            None
        }
        Err(err) => return Err(err),
    };

    Ok(ForecastOutput {
        prediction,
        comparison,
        observations: series.len(),
    })
}

/// Reloads the history file, reruns the forecast cycle and publishes the
/// results into shared state.
pub fn reload_and_store(
    path: &std::path::Path,
    state: &Arc<RwLock<AppState>>,
    options: &ForecastOptions,
) -> Result<(), AppError> {
    let records = history::load_from_path(path)?;
    let loaded_at = OffsetDateTime::now_utc();
    let output = run_forecast_cycle(&records, options)?;

    info!(
        records = records.len(),
        observations = output.observations,
        horizon_steps = output.prediction.horizon_steps,
        congestion_probability = output.prediction.congestion_probability(),
        compared = output.comparison.is_some(),
        "Forecast cycle complete"
    );

    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    guard.set_history(HistoryStatus {
        records: records.len(),
        loaded_at,
    });
    guard.set_prediction(output.prediction);
    guard.set_comparison(output.comparison);
    Ok(())
}

/// Spawn the periodic refresh thread (history reload → forecast → state).
pub fn spawn_refresh_thread(
    path: PathBuf,
    state: Arc<RwLock<AppState>>,
    options: ForecastOptions,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(e) = reload_and_store(&path, &state, &options) {
                warn!(error = %e, "Forecast refresh cycle failed");
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}
