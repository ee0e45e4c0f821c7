//! Loading app configuration (rules, grading prompts, optional problem bank) from TOML.
//!
//! See `AppConfig`, `RulesCfg` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::MedalTable;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub rules: RulesCfg,
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub problems: Vec<ProblemCfg>,
  /// Keep the built-in problems next to the bank (default true).
  #[serde(default = "default_true")]
  pub include_builtin_problems: bool,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      rules: RulesCfg::default(),
      prompts: Prompts::default(),
      problems: Vec::new(),
      include_builtin_problems: true,
    }
  }
}

fn default_true() -> bool { true }

/// Challenge rules. Durations outside `min_days..=max_days` are refused.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RulesCfg {
  pub min_days: u32,
  pub max_days: u32,
  /// Durations the client offers as quick picks.
  pub offered_durations: Vec<u32>,
  pub medal_table: MedalTable,
  /// Award participation credit for photos when no grader is configured.
  pub allow_ungraded_photos: bool,
}

impl Default for RulesCfg {
  fn default() -> Self {
    Self {
      min_days: 7,
      max_days: 30,
      offered_durations: vec![7, 14, 21, 30],
      medal_table: MedalTable::Standard,
      allow_ungraded_photos: false,
    }
  }
}

/// Problem entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ProblemCfg {
  #[serde(default)] pub key: Option<String>,
  pub topic: String,
  pub question: String,
  #[serde(alias = "answer")]
  pub expected_answer: String,
}

/// Prompts used by the photo grader. `{question}` is replaced with the problem text.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub grading_system: String,
  pub grading_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      grading_system: "You are an expert math teacher for 10th-grade German Realschule students. Respond ONLY with strict JSON.".into(),
      grading_user_template: "The student was asked to solve the following problem: '{question}'. The student has provided their handwritten solution in the attached image. Please analyze it carefully. Respond in JSON with the structure {\"isCorrect\": boolean, \"feedback\": string, \"correctAnswer\": string}. In your feedback, be encouraging. If wrong, gently point out where the mistake might be without giving the answer. If correct, praise their work.".into(),
    }
  }
}

pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("APP_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "mathe_backend", %path, problems = cfg.problems.len(), "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mathe_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathe_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = parse_app_config("").unwrap();
    assert_eq!(cfg.rules.min_days, 7);
    assert_eq!(cfg.rules.max_days, 30);
    assert_eq!(cfg.rules.medal_table, MedalTable::Standard);
    assert!(cfg.include_builtin_problems);
    assert!(cfg.prompts.grading_user_template.contains("{question}"));
  }

  #[test]
  fn parses_rules_and_bank() {
    let cfg = parse_app_config(
      r#"
include_builtin_problems = false

[rules]
max_days = 21
medal_table = "legacy"
allow_ungraded_photos = true

[[problems]]
topic = "Bruchrechnung"
question = "Berechne: 1/2 + 1/4"
answer = "3/4"
"#,
    )
    .unwrap();
    assert_eq!(cfg.rules.max_days, 21);
    assert_eq!(cfg.rules.min_days, 7);
    assert_eq!(cfg.rules.medal_table, MedalTable::Legacy);
    assert!(cfg.rules.allow_ungraded_photos);
    assert!(!cfg.include_builtin_problems);
    assert_eq!(cfg.problems[0].expected_answer, "3/4");
    assert!(cfg.problems[0].key.is_none());
  }

  #[test]
  fn unknown_medal_table_is_an_error() {
    assert!(parse_app_config("[rules]\nmedal_table = \"platinum\"\n").is_err());
  }
}
