//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::TopicGroup;
use crate::domain::{ChallengeState, DayRecord, Outcome, ProblemTemplate, SubmitOutcome, Summary};

/// Problem as shown to the student; the expected answer stays on the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemOut {
    pub day: u32,
    pub total_days: u32,
    pub topic: String,
    pub question: String,
}

impl ProblemOut {
    pub fn new(p: &ProblemTemplate, day: u32, total_days: u32) -> Self {
        Self { day, total_days, topic: p.topic.clone(), question: p.question.clone() }
    }
}

/// History entry for the dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOut {
    pub day: u32,
    pub points: u32,
    pub topic: String,
    pub completed_on: NaiveDate,
}

impl From<&DayRecord> for DayOut {
    fn from(r: &DayRecord) -> Self {
        Self { day: r.day, points: r.points_awarded, topic: r.problem.topic.clone(), completed_on: r.completed_on }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOut {
    pub started_on: NaiveDate,
    pub last_completed_date: Option<NaiveDate>,
    pub summary: Summary,
    pub history: Vec<DayOut>,
}

impl ChallengeOut {
    pub fn new(state: &ChallengeState, summary: Summary) -> Self {
        Self {
            started_on: state.started_on,
            last_completed_date: state.last_completed_date,
            summary,
            history: state.history.iter().map(DayOut::from).collect(),
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartIn {
    pub user: String,
    pub total_days: u32,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub user: String,
    pub answer: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoIn {
    pub user: String,
    pub image_base64: String,
    pub mime: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct SessionOut {
    pub user: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogOut {
    pub offered_durations: Vec<u32>,
    pub min_days: u32,
    pub max_days: u32,
    pub problem_count: usize,
    pub photo_grading: bool,
    pub topics: Vec<TopicGroup>,
}

/// `challenge` is null when the user has no active run.
#[derive(Serialize)]
pub struct DashboardOut {
    pub challenge: Option<ChallengeOut>,
}

#[derive(Serialize)]
pub struct StartOut {
    pub summary: Summary,
    pub persisted: bool,
}

#[derive(Serialize)]
pub struct ResetOut {
    pub persisted: bool,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TodayOut {
    Open { problem: ProblemOut, persisted: bool },
    Done { message: String, summary: Summary },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub outcome: Outcome,
    pub headline: String,
    pub day: u32,
    pub points: u32,
    pub score: u32,
    pub expected_answer: String,
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graded_answer: Option<String>,
    pub is_complete: bool,
    pub summary: Summary,
    pub persisted: bool,
}

impl AnswerOut {
    pub fn new(o: SubmitOutcome, summary: Summary, persisted: bool) -> Self {
        Self {
            outcome: o.outcome,
            headline: o.outcome.headline().to_string(),
            day: o.day,
            points: o.points,
            score: o.score,
            expected_answer: o.expected_answer,
            feedback: o.feedback,
            graded_answer: o.graded_answer,
            is_complete: o.is_complete,
            summary,
            persisted,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionOut {
    pub question: String,
    pub expected_answer: String,
}
