//! Message templates for sharing today's problem (e-mail, messenger).

use serde::Serialize;

use crate::domain::ProblemTemplate;
use crate::util::fill_template;

const SUBJECT_TPL: &str = "Math challenge – day {day} of {total}";
const BODY_TPL: &str = "Hi!\n\nThis is my math problem for day {day} of my {total}-day challenge:\n\n[{topic}]\n{question}\n\nCan you solve it too?";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShareMessage {
  pub subject: String,
  pub body: String,
}

/// Compose a share text. The expected answer is never included.
pub fn compose(problem: &ProblemTemplate, day: u32, total_days: u32) -> ShareMessage {
  let day = day.to_string();
  let total = total_days.to_string();
  let pairs = [
    ("day", day.as_str()),
    ("total", total.as_str()),
    ("topic", problem.topic.as_str()),
    ("question", problem.question.as_str()),
  ];
  ShareMessage {
    subject: fill_template(SUBJECT_TPL, &pairs),
    body: fill_template(BODY_TPL, &pairs),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn body_contains_problem_but_not_solution() {
    let problem = ProblemTemplate {
      key: "percent-1".into(),
      topic: "Prozentrechnung".into(),
      question: "Wie viel sind 15% von 200 €?".into(),
      expected_answer: "30".into(),
    };
    let msg = compose(&problem, 3, 14);
    assert_eq!(msg.subject, "Math challenge – day 3 of 14");
    assert!(msg.body.contains("[Prozentrechnung]\nWie viel sind 15% von 200 €?"));
    assert!(msg.body.contains("14-day challenge"));
    assert!(!msg.body.contains("30"));
  }
}
