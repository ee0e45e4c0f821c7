//! Challenge progress engine.
//!
//! Owns the lifecycle of one run: start, daily problem selection without
//! repeats, answer scoring, day advancement and the medal summary.
//!
//! The engine never performs I/O. "Today" comes from the injected `Clock` and
//! randomness from the `Rng` handed to `select_problem`, so a sequence of calls
//! with the same clock and seed always yields the same states.

use std::sync::{Arc, RwLock};

use chrono::{Duration, Local, NaiveDate};
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::catalog::Catalog;
use crate::config::RulesCfg;
use crate::domain::{
  ChallengeState, DayRecord, MedalTable, Outcome, ProblemTemplate, Submission, SubmitOutcome,
  Summary, MAX_TOTAL_DAYS, PHOTO_ANSWER_SENTINEL, POINTS_CORRECT,
};
use crate::error::EngineError;
use crate::util::normalize_answer;

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
  fn today(&self) -> NaiveDate;
}

/// Local wall-clock date; the day boundary is local midnight.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn today(&self) -> NaiveDate {
    Local::now().date_naive()
  }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
  date: RwLock<NaiveDate>,
}

impl FixedClock {
  pub fn new(date: NaiveDate) -> Self {
    Self { date: RwLock::new(date) }
  }

  pub fn set(&self, date: NaiveDate) {
    let mut guard = self.date.write().unwrap_or_else(|e| e.into_inner());
    *guard = date;
  }

  pub fn advance_days(&self, days: i64) {
    let next = self.today() + Duration::days(days);
    self.set(next);
  }
}

impl Clock for FixedClock {
  fn today(&self) -> NaiveDate {
    *self.date.read().unwrap_or_else(|e| e.into_inner())
  }
}

#[derive(Clone, Copy, Debug)]
pub struct EngineRules {
  pub min_days: u32,
  pub max_days: u32,
  pub medal_table: MedalTable,
}

impl Default for EngineRules {
  fn default() -> Self {
    Self::from(&RulesCfg::default())
  }
}

impl From<&RulesCfg> for EngineRules {
  fn from(cfg: &RulesCfg) -> Self {
    Self {
      min_days: cfg.min_days.clamp(1, MAX_TOTAL_DAYS),
      max_days: cfg.max_days.clamp(cfg.min_days.clamp(1, MAX_TOTAL_DAYS), MAX_TOTAL_DAYS),
      medal_table: cfg.medal_table,
    }
  }
}

#[derive(Clone)]
pub struct ChallengeEngine {
  catalog: Arc<Catalog>,
  clock: Arc<dyn Clock>,
  rules: EngineRules,
}

impl ChallengeEngine {
  pub fn new(catalog: Arc<Catalog>, clock: Arc<dyn Clock>, rules: EngineRules) -> Self {
    Self { catalog, clock, rules }
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  pub fn rules(&self) -> &EngineRules {
    &self.rules
  }

  pub fn today(&self) -> NaiveDate {
    self.clock.today()
  }

  /// Fresh run of `total_days` days.
  #[instrument(level = "info", skip(self))]
  pub fn start(&self, total_days: u32) -> Result<ChallengeState, EngineError> {
    let EngineRules { min_days, max_days, .. } = self.rules;
    if total_days < min_days || total_days > max_days {
      return Err(EngineError::InvalidDuration { requested: total_days, min: min_days, max: max_days });
    }
    info!(target: "challenge", total_days, "Challenge started");
    Ok(ChallengeState {
      total_days,
      current_day: 1,
      score: 0,
      used_problem_keys: Default::default(),
      current_problem: None,
      problem_drawn_on: None,
      last_completed_date: None,
      started_on: self.today(),
      history: Vec::new(),
    })
  }

  /// Today's problem. Returns the cached one when it was drawn today or has
  /// already been answered today, so reloading never rerolls the question.
  #[instrument(level = "debug", skip(self, state, rng), fields(day = state.current_day))]
  pub fn select_problem<R: Rng>(
    &self,
    state: &mut ChallengeState,
    rng: &mut R,
  ) -> Result<ProblemTemplate, EngineError> {
    if state.is_complete() {
      return Err(EngineError::ChallengeComplete);
    }
    let today = self.today();
    if let Some(current) = &state.current_problem {
      if state.problem_drawn_on == Some(today) || state.last_completed_date == Some(today) {
        return Ok(current.clone());
      }
    }

    let all = self.catalog.problems();
    let mut eligible: Vec<&ProblemTemplate> = all
      .iter()
      .filter(|p| !state.used_problem_keys.contains(&p.key))
      .collect();
    if eligible.is_empty() {
      debug!(target: "challenge", catalog = all.len(), "Catalog exhausted; clearing used problems");
      state.used_problem_keys.clear();
      eligible = all.iter().collect();
    }

    let chosen = eligible[rng.gen_range(0..eligible.len())].clone();
    state.used_problem_keys.insert(chosen.key.clone());
    state.current_problem = Some(chosen.clone());
    state.problem_drawn_on = Some(today);
    debug!(target: "challenge", key = %chosen.key, remaining = eligible.len() - 1, "Problem drawn");
    Ok(chosen)
  }

  pub fn is_already_done_today(&self, state: &ChallengeState) -> bool {
    state.last_completed_date == Some(self.today())
  }

  /// The problem a submission today would be scored against. A problem drawn
  /// on an earlier day is stale and must be redrawn first.
  pub fn active_problem(&self, state: &ChallengeState) -> Result<ProblemTemplate, EngineError> {
    match &state.current_problem {
      Some(p) if state.problem_drawn_on == Some(self.today()) => Ok(p.clone()),
      _ => Err(EngineError::NoActiveProblem),
    }
  }

  /// Score a submission and advance the run by one day.
  ///
  /// Every rejection leaves `state` untouched.
  #[instrument(level = "info", skip(self, state, submission), fields(day = state.current_day))]
  pub fn submit_answer(
    &self,
    state: &mut ChallengeState,
    submission: Submission,
  ) -> Result<SubmitOutcome, EngineError> {
    if let Submission::Text(raw) = &submission {
      if raw.trim().is_empty() {
        return Err(EngineError::InvalidInput);
      }
    }
    if state.is_complete() {
      return Err(EngineError::ChallengeComplete);
    }
    if self.is_already_done_today(state) {
      return Err(EngineError::AlreadyDoneToday);
    }
    let problem = self.active_problem(state)?;

    let (outcome, user_answer, feedback, graded_answer) = match submission {
      Submission::Text(raw) => {
        let outcome = if normalize_answer(&raw) == normalize_answer(&problem.expected_answer) {
          Outcome::Correct
        } else {
          Outcome::Incorrect
        };
        (outcome, raw.trim().to_string(), None, None)
      }
      Submission::Graded { is_correct, feedback, correct_answer } => {
        let outcome = if is_correct { Outcome::Correct } else { Outcome::Incorrect };
        (outcome, PHOTO_ANSWER_SENTINEL.to_string(), Some(feedback), correct_answer)
      }
      Submission::UngradedPhoto => {
        (Outcome::Incorrect, PHOTO_ANSWER_SENTINEL.to_string(), None, None)
      }
    };

    let today = self.today();
    let points = outcome.points();
    let day = state.current_day;
    state.history.push(DayRecord {
      day,
      points_awarded: points,
      user_answer,
      problem: problem.clone(),
      completed_on: today,
      feedback: feedback.clone(),
    });
    state.score += points;
    state.last_completed_date = Some(today);
    state.current_day += 1;

    info!(target: "challenge", day, ?outcome, points, score = state.score, "Answer scored");
    Ok(SubmitOutcome {
      day,
      outcome,
      points,
      score: state.score,
      expected_answer: problem.expected_answer,
      feedback,
      graded_answer,
      is_complete: state.is_complete(),
    })
  }

  /// The active problem including its solution. Does not touch the state.
  pub fn reveal_solution(&self, state: &ChallengeState) -> Result<ProblemTemplate, EngineError> {
    state.current_problem.clone().ok_or(EngineError::NoActiveProblem)
  }

  pub fn summarize(&self, state: &ChallengeState) -> Summary {
    let max_points = state.total_days.saturating_mul(POINTS_CORRECT);
    let percentage = if max_points == 0 {
      0.0
    } else {
      state.score as f64 / max_points as f64 * 100.0
    };
    let completed_days = state.completed_days();
    let progress_percentage = if state.total_days == 0 {
      0.0
    } else {
      completed_days as f64 / state.total_days as f64 * 100.0
    };
    let (current_streak, best_streak) = streaks(state, self.today());
    Summary {
      total_days: state.total_days,
      current_day: state.current_day,
      completed_days,
      score: state.score,
      max_points,
      percentage,
      progress_percentage,
      medal: self.rules.medal_table.medal_for(percentage),
      is_complete: state.is_complete(),
      done_today: self.is_already_done_today(state),
      current_streak,
      best_streak,
    }
  }

  /// Discard the run.
  pub fn reset(&self) -> Option<ChallengeState> {
    info!(target: "challenge", "Challenge reset");
    None
  }
}

/// (current, best) runs of consecutive completion dates. The current run only
/// counts while its last day is today or yesterday.
fn streaks(state: &ChallengeState, today: NaiveDate) -> (u32, u32) {
  let mut best = 0u32;
  let mut run = 0u32;
  let mut prev: Option<NaiveDate> = None;
  for rec in &state.history {
    run = match prev {
      Some(p) if rec.completed_on == p + Duration::days(1) => run + 1,
      _ => 1,
    };
    best = best.max(run);
    prev = Some(rec.completed_on);
  }
  let current = match prev {
    Some(last) if last == today || last + Duration::days(1) == today => run,
    _ => 0,
  };
  (current, best)
}
