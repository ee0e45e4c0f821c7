//! Built-in problem catalog. Guarantees the app is useful without any config file.

use crate::domain::ProblemTemplate;

fn p(key: &str, topic: &str, question: &str, expected_answer: &str) -> ProblemTemplate {
  ProblemTemplate {
    key: key.into(),
    topic: topic.into(),
    question: question.into(),
    expected_answer: expected_answer.into(),
  }
}

/// Grade 7 style drill problems (German curriculum, short exact answers).
pub fn seed_problems() -> Vec<ProblemTemplate> {
  const RATIONAL: &str = "Rationale Zahlen – Addition & Subtraktion";
  const TERMS: &str = "Terme – Vereinfachen & Werte berechnen";
  vec![
    p("rat-add-1", RATIONAL, "Berechne: (-7) + 12 = ?", "5"),
    p("rat-sub-1", RATIONAL, "Berechne: 15 - (-4) = ?", "19"),
    p("rat-add-2", RATIONAL, "Berechne: (-9) + (-6) = ?", "-15"),
    p("term-simplify-1", TERMS, "Vereinfache den Term: 3x + 5y - x + 2y", "2x + 7y"),
    p("term-eval-1", TERMS, "Berechne den Wert des Terms 2a - 3b für a = 4 und b = -2.", "14"),
    p("percent-1", "Prozentrechnung – Grundaufgaben", "Wie viel sind 15% von 200 €?", "30"),
    p("linear-eq-1", "Lineare Gleichungen – Lösen", "Löse nach x auf: 3x + 7 = 22", "5"),
    p(
      "linear-fn-1",
      "Lineare Funktionen – Grundlagen",
      "Ist der Punkt P(3|5) ein Punkt der Funktion y = 2x - 1? (Ja/Nein)",
      "Ja",
    ),
    p(
      "interest-1",
      "Zinsrechnung",
      "Wie viel Zinsen erhält man für 1500 € bei einem Zinssatz von 2% pro Jahr nach einem Jahr?",
      "30",
    ),
  ]
}

/// Grade 10 Realschule problems. These are mostly handed in as photos of a
/// handwritten solution, so their expected answers are reference values.
pub fn realschule_problems() -> Vec<ProblemTemplate> {
  vec![
    p(
      "quad-vertex-1",
      "Quadratic Functions",
      "Find the vertex (Scheitelpunkt) of the parabola given by the equation y = 2(x - 3)² + 5.",
      "S(3|5)",
    ),
    p(
      "quad-pq-1",
      "Quadratic Functions",
      "Solve the quadratic equation x² - 5x + 6 = 0 using the p-q-formula.",
      "x1=2, x2=3",
    ),
    p(
      "binomial-1",
      "Algebra",
      "Simplify the following term using the binomial formulas: (2a + 4b)²",
      "4a² + 16ab + 16b²",
    ),
    p(
      "pythagoras-1",
      "Geometry (Pythagoras)",
      "In a right-angled triangle, the two shorter sides are a = 6 cm and b = 8 cm. What is the length of the hypotenuse c?",
      "10",
    ),
    p(
      "cylinder-1",
      "Solid Geometry",
      "A cylinder has a radius of 4 cm and a height of 10 cm. Calculate its volume. Use π ≈ 3.14.",
      "502.4",
    ),
    p(
      "probability-1",
      "Probability",
      "A bag contains 5 red balls and 3 blue balls. You draw one ball without looking. What is the probability of drawing a red ball?",
      "5/8",
    ),
  ]
}

/// Everything shipped with the binary.
pub fn builtin_problems() -> Vec<ProblemTemplate> {
  let mut all = seed_problems();
  all.extend(realschule_problems());
  all
}
