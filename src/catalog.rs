//! Read-only problem catalog, built from the config bank and the built-in seeds.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProblemCfg;
use crate::domain::ProblemTemplate;
use crate::error::CatalogError;
use crate::seeds::builtin_problems;

#[derive(Clone, Debug)]
pub struct Catalog {
  problems: Vec<ProblemTemplate>,
}

/// Problems of one topic, as listed by the catalog endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct TopicGroup {
  pub topic: String,
  pub questions: Vec<String>,
}

impl Catalog {
  /// Strict constructor: the list must be non-empty and keys unique.
  pub fn new(problems: Vec<ProblemTemplate>) -> Result<Self, CatalogError> {
    if problems.is_empty() {
      return Err(CatalogError::Empty);
    }
    let mut seen = HashSet::new();
    for p in &problems {
      if !seen.insert(p.key.as_str()) {
        return Err(CatalogError::DuplicateKey(p.key.clone()));
      }
    }
    Ok(Self { problems })
  }

  /// Config bank entries first, then built-in seeds. Later duplicates are skipped
  /// so a bank entry can shadow a seed with the same key.
  pub fn from_bank(bank: &[ProblemCfg], include_builtin: bool) -> Result<Self, CatalogError> {
    let mut out: Vec<ProblemTemplate> = Vec::new();
    let mut seen = HashSet::<String>::new();

    for (i, cfg) in bank.iter().enumerate() {
      let question = cfg.question.trim();
      let expected = cfg.expected_answer.trim();
      if question.is_empty() || expected.is_empty() {
        warn!(target: "challenge", index = i, "Skipping bank problem: missing question or answer.");
        continue;
      }
      let key = cfg.key.clone().unwrap_or_else(|| format!("bank-{}", i + 1));
      if !seen.insert(key.clone()) {
        warn!(target: "challenge", %key, "Skipping bank problem: duplicate key.");
        continue;
      }
      out.push(ProblemTemplate {
        key,
        topic: cfg.topic.clone(),
        question: question.to_string(),
        expected_answer: expected.to_string(),
      });
    }
    let from_bank = out.len();

    if include_builtin {
      for p in builtin_problems() {
        if seen.insert(p.key.clone()) {
          out.push(p);
        }
      }
    }

    info!(target: "challenge", from_bank, total = out.len(), "Problem catalog assembled");
    Self::new(out)
  }

  pub fn builtin() -> Self {
    Self { problems: builtin_problems() }
  }

  pub fn problems(&self) -> &[ProblemTemplate] {
    &self.problems
  }

  pub fn len(&self) -> usize {
    self.problems.len()
  }

  pub fn is_empty(&self) -> bool {
    self.problems.is_empty()
  }

  pub fn get(&self, key: &str) -> Option<&ProblemTemplate> {
    self.problems.iter().find(|p| p.key == key)
  }

  /// Topics in alphabetical order with their questions in catalog order.
  pub fn by_topic(&self) -> Vec<TopicGroup> {
    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for p in &self.problems {
      groups.entry(p.topic.as_str()).or_default().push(p.question.clone());
    }
    groups
      .into_iter()
      .map(|(topic, questions)| TopicGroup { topic: topic.to_string(), questions })
      .collect()
  }
}
