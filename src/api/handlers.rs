use crate::api::responses::{
    ComparisonErrorCode, ComparisonErrorResponse, ComparisonSuccessResponse, HealthErrorCode,
    HealthErrorResponse, HealthStatus, HealthSuccessResponse, ModelScoreBody,
    PredictionErrorCode, PredictionErrorResponse, PredictionSuccessResponse, StateProbability,
};
use crate::forecast::ModelScore;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub enum PredictionResponse {
    Success(PredictionSuccessResponse),
    Error {
        status: StatusCode,
        body: PredictionErrorResponse,
    },
}

impl IntoResponse for PredictionResponse {
    fn into_response(self) -> Response {
        match self {
            PredictionResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            PredictionResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_prediction(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_prediction_response(state, OffsetDateTime::now_utc())
}

pub enum ComparisonResponse {
    Success(ComparisonSuccessResponse),
    Error {
        status: StatusCode,
        body: ComparisonErrorResponse,
    },
}

impl IntoResponse for ComparisonResponse {
    fn into_response(self) -> Response {
        match self {
            ComparisonResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ComparisonResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_comparison(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_comparison_response(state, OffsetDateTime::now_utc())
}

pub enum HealthResponse {
    Success {
        status: StatusCode,
        body: HealthSuccessResponse,
    },
    Error {
        status: StatusCode,
        body: HealthErrorResponse,
    },
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            HealthResponse::Success { status, body } => (status, Json(body)).into_response(),
            HealthResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_health_response(state, OffsetDateTime::now_utc())
}

fn build_prediction_response(
    state: Arc<RwLock<AppState>>,
    now: OffsetDateTime,
) -> PredictionResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return prediction_internal_error("state lock poisoned while reading prediction");
        }
    };
    let prediction = guard.prediction().cloned();
    drop(guard);

    let Some(prediction) = prediction else {
        return match format_timestamp(now) {
            Ok(formatted) => PredictionResponse::Error {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: PredictionErrorResponse {
                    error_code: PredictionErrorCode::NoData,
                    error_message: "No prediction available".to_string(),
                    timestamp: formatted,
                },
            },
            Err(_) => prediction_internal_error("timestamp formatting failure"),
        };
    };

    match format_timestamp(now) {
        Ok(formatted) => PredictionResponse::Success(PredictionSuccessResponse {
            current_state: prediction.current_state.label().to_string(),
            horizon_steps: prediction.horizon_steps,
            congestion_probability: prediction.congestion_probability(),
            distribution: prediction
                .distribution()
                .map(|(state, probability)| StateProbability {
                    state: state.label().to_string(),
                    probability,
                })
                .collect(),
            timestamp: formatted,
        }),
        Err(_) => prediction_internal_error("timestamp formatting failure"),
    }
}

fn prediction_internal_error(message: &str) -> PredictionResponse {
    error!(
        message = message,
        "Internal error while handling /api/prediction"
    );
    PredictionResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: PredictionErrorResponse {
            error_code: PredictionErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_comparison_response(
    state: Arc<RwLock<AppState>>,
    now: OffsetDateTime,
) -> ComparisonResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return comparison_internal_error("state lock poisoned while reading comparison");
        }
    };
    let comparison = guard.comparison().cloned();
    drop(guard);

    let Some(report) = comparison else {
        return match format_timestamp(now) {
            Ok(formatted) => ComparisonResponse::Error {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: ComparisonErrorResponse {
                    error_code: ComparisonErrorCode::NoData,
                    error_message: "No model comparison available".to_string(),
                    timestamp: formatted,
                },
            },
            Err(_) => comparison_internal_error("timestamp formatting failure"),
        };
    };

    match format_timestamp(now) {
        Ok(formatted) => ComparisonResponse::Success(ComparisonSuccessResponse {
            horizon_steps: report.horizon_steps,
            fit_samples: report.fit_samples,
            eval_samples: report.eval_samples,
            markov: score_body(&report.markov),
            baseline: score_body(&report.baseline),
            timestamp: formatted,
        }),
        Err(_) => comparison_internal_error("timestamp formatting failure"),
    }
}

fn score_body(score: &ModelScore) -> ModelScoreBody {
    ModelScoreBody {
        mean_absolute_error: score.mean_absolute_error,
        log_loss: score.log_loss,
        accuracy: score.accuracy,
        roc_auc: score.roc_auc,
    }
}

fn comparison_internal_error(message: &str) -> ComparisonResponse {
    error!(
        message = message,
        "Internal error while handling /api/comparison"
    );
    ComparisonResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ComparisonErrorResponse {
            error_code: ComparisonErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_health_response(state: Arc<RwLock<AppState>>, now: OffsetDateTime) -> HealthResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return health_internal_error("state lock poisoned while reading health");
        }
    };
    let history_records = guard.history().map(|h| h.records);
    let has_prediction = guard.prediction().is_some();
    let has_comparison = guard.comparison().is_some();
    drop(guard);

    let status = match (has_prediction, has_comparison) {
        (true, true) => HealthStatus::Ok,
        (true, false) => HealthStatus::Degraded,
        (false, _) => HealthStatus::Ko,
    };

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };

    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    HealthResponse::Success {
        status: status_code,
        body: HealthSuccessResponse {
            status,
            history_records,
            timestamp,
        },
    }
}

fn health_internal_error(message: &str) -> HealthResponse {
    error!(
        message = message,
        "Internal error while handling /api/health"
    );
    HealthResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: HealthErrorResponse {
            error_code: HealthErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, time::error::Format> {
    timestamp.format(&Rfc3339)
}

fn fallback_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
