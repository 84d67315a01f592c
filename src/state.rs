use crate::forecast::{ComparisonReport, PredictionResult};
use time::OffsetDateTime;
use tokio::sync::watch;

/// Provenance of the most recent successful history load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStatus {
    pub records: usize,
    pub loaded_at: OffsetDateTime,
}

/// Latest forecast outputs shared between the refresh thread and the API.
#[derive(Debug)]
pub struct AppState {
    history: Option<HistoryStatus>,
    history_tx: watch::Sender<Option<HistoryStatus>>,
    prediction: Option<PredictionResult>,
    prediction_tx: watch::Sender<Option<PredictionResult>>,
    comparison: Option<ComparisonReport>,
    comparison_tx: watch::Sender<Option<ComparisonReport>>,
}

impl AppState {
    pub fn new() -> Self {
        let (history_tx, _history_rx) = watch::channel(None);
        let (prediction_tx, _prediction_rx) = watch::channel(None);
        let (comparison_tx, _comparison_rx) = watch::channel(None);
        Self {
            history: None,
            history_tx,
            prediction: None,
            prediction_tx,
            comparison: None,
            comparison_tx,
        }
    }

    pub fn history(&self) -> Option<&HistoryStatus> {
        self.history.as_ref()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Option<HistoryStatus>> {
        self.history_tx.subscribe()
    }

    pub fn set_history(&mut self, history: HistoryStatus) {
        self.history = Some(history.clone());
        // send_replace delivers even when no receiver is subscribed yet.
        self.history_tx.send_replace(Some(history));
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        self.prediction.as_ref()
    }

    pub fn subscribe_prediction(&self) -> watch::Receiver<Option<PredictionResult>> {
        self.prediction_tx.subscribe()
    }

    pub fn set_prediction(&mut self, prediction: PredictionResult) {
        self.prediction = Some(prediction.clone());
        self.prediction_tx.send_replace(Some(prediction));
    }

    pub fn comparison(&self) -> Option<&ComparisonReport> {
        self.comparison.as_ref()
    }

    pub fn subscribe_comparison(&self) -> watch::Receiver<Option<ComparisonReport>> {
        self.comparison_tx.subscribe()
    }

    /// A refresh cycle may legitimately produce no comparison (sparse
    /// history); storing None clears any stale report.
    pub fn set_comparison(&mut self, comparison: Option<ComparisonReport>) {
        self.comparison = comparison.clone();
        self.comparison_tx.send_replace(comparison);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
