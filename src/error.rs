//! Error types for each layer, plus the HTTP mapping used by the routes.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

/// Rejections raised by the challenge engine. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
  #[error("answer is empty; please enter an answer")]
  InvalidInput,
  #[error("challenge length {requested} is outside {min}..={max} days")]
  InvalidDuration { requested: u32, min: u32, max: u32 },
  #[error("today's exercise is already done; come back tomorrow")]
  AlreadyDoneToday,
  #[error("no problem has been drawn for today")]
  NoActiveProblem,
  #[error("the challenge is already complete")]
  ChallengeComplete,
}

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("problem catalog is empty")]
  Empty,
  #[error("duplicate problem key '{0}'")]
  DuplicateKey(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("storage I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("could not serialize challenge state: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("invalid user id '{0}'")]
  InvalidUser(String),
}

/// Failures of the external grading collaborator. Every variant is retryable
/// from the student's point of view and never counts as a wrong answer.
#[derive(Debug, Error)]
pub enum GradingError {
  #[error("photo grading is not configured")]
  Unavailable,
  #[error("invalid image: {0}")]
  InvalidImage(String),
  #[error("grading request failed: {0}")]
  Transport(String),
  #[error("grading service returned HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("grading response blocked: {0}")]
  Blocked(String),
  #[error("grading stopped early: {0}")]
  Incomplete(String),
  #[error("grading service returned an empty response")]
  EmptyResponse,
  #[error("grading response malformed: {0}")]
  Malformed(String),
}

impl GradingError {
  /// Message suitable for showing to the student.
  pub fn user_message(&self) -> &'static str {
    match self {
      GradingError::Unavailable => "Photo grading is not available right now. Please type your answer instead.",
      GradingError::InvalidImage(_) => "That file doesn't look like a picture we can read. Please upload a PNG or JPEG photo.",
      GradingError::Blocked(_) => "The analysis was blocked. This can happen with unclear images. Please try taking a clearer picture.",
      GradingError::Incomplete(_) => "The AI couldn't finish its analysis. This might be a temporary issue. Please try again.",
      _ => "Sorry, I couldn't analyze the image. Please try again.",
    }
  }
}

/// Error surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Engine(#[from] EngineError),
  #[error(transparent)]
  Grading(#[from] GradingError),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error("no active challenge; start one first")]
  NoChallenge,
}

#[derive(Serialize)]
struct ErrorBody {
  error: &'static str,
  message: String,
  retryable: bool,
}

impl ApiError {
  fn parts(&self) -> (StatusCode, &'static str, String, bool) {
    match self {
      ApiError::Engine(e) => {
        let (status, code) = match e {
          EngineError::InvalidInput => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
          EngineError::InvalidDuration { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_duration"),
          EngineError::AlreadyDoneToday => (StatusCode::CONFLICT, "already_done_today"),
          EngineError::NoActiveProblem => (StatusCode::CONFLICT, "no_active_problem"),
          EngineError::ChallengeComplete => (StatusCode::CONFLICT, "challenge_complete"),
        };
        (status, code, e.to_string(), matches!(e, EngineError::InvalidInput))
      }
      ApiError::Grading(e) => {
        let (status, code) = match e {
          GradingError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "grading_unavailable"),
          GradingError::InvalidImage(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_image"),
          _ => (StatusCode::BAD_GATEWAY, "grading_failed"),
        };
        (status, code, e.user_message().to_string(), true)
      }
      ApiError::Store(StoreError::InvalidUser(u)) => (
        StatusCode::BAD_REQUEST,
        "invalid_user",
        format!("invalid user id '{}'", u),
        false,
      ),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failed", e.to_string(), true),
      ApiError::NoChallenge => (StatusCode::NOT_FOUND, "no_challenge", self.to_string(), false),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, error, message, retryable) = self.parts();
    (status, Json(ErrorBody { error, message, retryable })).into_response()
  }
}
