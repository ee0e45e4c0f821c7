//! Domain models: problem templates, the challenge state aggregate, day records,
//! submissions and the summary/medal types derived from a run.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Points for a correct answer.
pub const POINTS_CORRECT: u32 = 6;
/// Participation credit for an honest but incorrect attempt.
pub const POINTS_INCORRECT: u32 = 4;

/// Longest run a stored state may describe. Config cannot raise the duration
/// bound past this.
pub const MAX_TOTAL_DAYS: u32 = 366;

/// Sentinel stored as `userAnswer` when the solution was handed in as a photo.
pub const PHOTO_ANSWER_SENTINEL: &str = "[photo]";

/// One problem of the catalog. Never mutated once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemTemplate {
  pub key: String,
  pub topic: String,
  pub question: String,
  pub expected_answer: String,
}

/// Immutable record of one completed day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
  pub day: u32,
  pub points_awarded: u32,
  pub user_answer: String,
  pub problem: ProblemTemplate,
  pub completed_on: NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub feedback: Option<String>,
}

/// The single mutable aggregate of a run. Persisted as a whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeState {
  pub total_days: u32,
  pub current_day: u32,
  pub score: u32,
  pub used_problem_keys: BTreeSet<String>,
  pub current_problem: Option<ProblemTemplate>,
  pub problem_drawn_on: Option<NaiveDate>,
  pub last_completed_date: Option<NaiveDate>,
  pub started_on: NaiveDate,
  pub history: Vec<DayRecord>,
}

impl ChallengeState {
  pub fn is_complete(&self) -> bool {
    self.current_day > self.total_days
  }

  pub fn completed_days(&self) -> u32 {
    self.current_day.saturating_sub(1)
  }

  /// Check the structural invariants of a run.
  ///
  /// Stored blobs go through this before they are trusted; any violation is
  /// reported as a human readable reason.
  pub fn validate(&self) -> Result<(), String> {
    if self.total_days == 0 || self.total_days > MAX_TOTAL_DAYS {
      return Err(format!("totalDays {} outside 1..={}", self.total_days, MAX_TOTAL_DAYS));
    }
    let last_day = self.total_days + 1;
    if self.current_day < 1 || self.current_day > last_day {
      return Err(format!("currentDay {} outside 1..={}", self.current_day, last_day));
    }
    if self.history.len() as u32 != self.current_day - 1 {
      return Err(format!(
        "history has {} records but currentDay is {}",
        self.history.len(),
        self.current_day
      ));
    }
    for (i, rec) in self.history.iter().enumerate() {
      if rec.day != i as u32 + 1 {
        return Err(format!("history record {} has day {}", i, rec.day));
      }
      if rec.points_awarded != POINTS_CORRECT && rec.points_awarded != POINTS_INCORRECT {
        return Err(format!("day {} awarded {} points", rec.day, rec.points_awarded));
      }
    }
    let sum: u32 = self.history.iter().map(|r| r.points_awarded).sum();
    if sum != self.score {
      return Err(format!("score {} does not match history sum {}", self.score, sum));
    }
    let mut seen = BTreeSet::new();
    for rec in &self.history {
      if !seen.insert(rec.completed_on) {
        return Err(format!("two completions on {}", rec.completed_on));
      }
    }
    Ok(())
  }
}

/// How an answer reaches the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
  /// Free text, compared against the expected answer.
  Text(String),
  /// A photo judged by the external grading collaborator.
  Graded { is_correct: bool, feedback: String, correct_answer: Option<String> },
  /// A photo without a grader: participation credit only.
  UngradedPhoto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Correct,
  Incorrect,
}

impl Outcome {
  pub fn points(self) -> u32 {
    match self {
      Outcome::Correct => POINTS_CORRECT,
      Outcome::Incorrect => POINTS_INCORRECT,
    }
  }

  pub fn headline(self) -> &'static str {
    match self {
      Outcome::Correct => "Excellent work!",
      Outcome::Incorrect => "Good effort!",
    }
  }
}

/// Result of a successful submission, used for feedback display.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
  pub day: u32,
  pub outcome: Outcome,
  pub points: u32,
  pub score: u32,
  pub expected_answer: String,
  pub feedback: Option<String>,
  /// The grader's own solution for photo submissions, when it gave one.
  pub graded_answer: Option<String>,
  pub is_complete: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Medal {
  None,
  Bronze,
  Silver,
  Gold,
}

impl Medal {
  pub fn display_name(&self) -> &'static str {
    match self {
      Medal::None => "No medal yet",
      Medal::Bronze => "Bronze",
      Medal::Silver => "Silver",
      Medal::Gold => "Gold",
    }
  }
}

/// Threshold table mapping a percentage to a medal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedalTable {
  /// 80 / 65 / 50, with no medal below 50.
  #[default]
  Standard,
  /// 80 / 65, everything below 65 is Bronze.
  Legacy,
}

impl MedalTable {
  pub fn medal_for(&self, percentage: f64) -> Medal {
    match self {
      MedalTable::Standard => {
        if percentage >= 80.0 {
          Medal::Gold
        } else if percentage >= 65.0 {
          Medal::Silver
        } else if percentage >= 50.0 {
          Medal::Bronze
        } else {
          Medal::None
        }
      }
      MedalTable::Legacy => {
        if percentage >= 80.0 {
          Medal::Gold
        } else if percentage >= 65.0 {
          Medal::Silver
        } else {
          Medal::Bronze
        }
      }
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
  pub total_days: u32,
  pub current_day: u32,
  pub completed_days: u32,
  pub score: u32,
  pub max_points: u32,
  pub percentage: f64,
  pub progress_percentage: f64,
  pub medal: Medal,
  pub is_complete: bool,
  pub done_today: bool,
  pub current_streak: u32,
  pub best_streak: u32,
}
