use crate::forecast::ForecastError;
use crate::history::HistoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state lock poisoned")]
    StateLock,
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    #[error("forecast error: {0}")]
    Forecast(#[from] ForecastError),
}
