//! HTTP endpoint handlers. These are thin wrappers that forward to `AppState`.
//! Each handler is instrumented and logs the user plus basic result info.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::protocol::*;
use crate::state::{AppState, Today};

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

/// Anonymous sign-in: hands out a fresh user id.
#[instrument(level = "info")]
pub async fn http_post_session() -> impl IntoResponse {
  let user = Uuid::new_v4().simple().to_string();
  info!(target: "mathe_backend", %user, "Anonymous session issued");
  (StatusCode::CREATED, Json(SessionOut { user }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let rules = state.engine.rules();
  Json(CatalogOut {
    offered_durations: state.rules.offered_durations.clone(),
    min_days: rules.min_days,
    max_days: rules.max_days,
    problem_count: state.engine.catalog().len(),
    photo_grading: state.grader.is_some() || state.rules.allow_ungraded_photos,
    topics: state.engine.catalog().by_topic(),
  })
}

#[instrument(level = "info", skip(state), fields(user = %q.user))]
pub async fn http_get_challenge(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Result<Json<DashboardOut>, ApiError> {
  let challenge = state
    .current(&q.user)
    .await?
    .map(|(s, summary)| ChallengeOut::new(&s, summary));
  Ok(Json(DashboardOut { challenge }))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user, total_days = body.total_days))]
pub async fn http_post_challenge(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartIn>,
) -> Result<(StatusCode, Json<StartOut>), ApiError> {
  let (summary, persisted) = state.start(&body.user, body.total_days).await?;
  info!(target: "challenge", user = %body.user, total_days = body.total_days, %persisted, "HTTP challenge started");
  Ok((StatusCode::CREATED, Json(StartOut { summary, persisted })))
}

#[instrument(level = "info", skip(state), fields(user = %q.user))]
pub async fn http_delete_challenge(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Result<Json<ResetOut>, ApiError> {
  let persisted = state.reset(&q.user).await?;
  Ok(Json(ResetOut { persisted }))
}

#[instrument(level = "info", skip(state), fields(user = %q.user))]
pub async fn http_get_problem(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Result<Json<TodayOut>, ApiError> {
  let (today, persisted) = state.today(&q.user).await?;
  let out = match today {
    Today::Open { problem, day, total_days } => {
      info!(target: "challenge", user = %q.user, day, "HTTP problem served");
      TodayOut::Open { problem: ProblemOut::new(&problem, day, total_days), persisted }
    }
    Today::Done { summary } => {
      let message = if summary.is_complete {
        format!("Challenge finished: {}!", summary.medal.display_name())
      } else {
        "Great job! You've completed your exercise for today. Come back tomorrow!".to_string()
      };
      TodayOut::Done { message, summary }
    }
  };
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user, answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let (outcome, summary, persisted) = state.submit_text(&body.user, &body.answer).await?;
  info!(target: "challenge", user = %body.user, outcome = ?outcome.outcome, score = outcome.score, "HTTP answer scored");
  Ok(Json(AnswerOut::new(outcome, summary, persisted)))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user, image_len = body.image_base64.len()))]
pub async fn http_post_photo(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PhotoIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let (outcome, summary, persisted) = state.submit_photo(&body.user, &body.image_base64, &body.mime).await?;
  info!(target: "challenge", user = %body.user, outcome = ?outcome.outcome, score = outcome.score, "HTTP photo graded");
  Ok(Json(AnswerOut::new(outcome, summary, persisted)))
}

#[instrument(level = "info", skip(state), fields(user = %q.user))]
pub async fn http_get_solution(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Result<Json<SolutionOut>, ApiError> {
  let p = state.solution(&q.user).await?;
  Ok(Json(SolutionOut { question: p.question, expected_answer: p.expected_answer }))
}

#[instrument(level = "info", skip(state), fields(user = %q.user))]
pub async fn http_get_summary(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(state.summary(&q.user).await?))
}

#[instrument(level = "info", skip(state), fields(user = %q.user))]
pub async fn http_get_share(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(state.share(&q.user).await?))
}
