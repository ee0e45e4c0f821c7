//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Canonical form used for answer comparison: outer whitespace trimmed, lowercased.
pub fn normalize_answer(s: &str) -> String {
  s.trim().to_lowercase()
}

/// Log-safe truncation for large strings, cut on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_all_placeholders() {
    let out = fill_template("Solve '{question}' ({question})", &[("question", "3x = 9")]);
    assert_eq!(out, "Solve '3x = 9' (3x = 9)");
  }

  #[test]
  fn normalizes_case_and_outer_whitespace_only() {
    assert_eq!(normalize_answer("  JA \n"), "ja");
    assert_eq!(normalize_answer("2x + 7y"), "2x + 7y");
    assert_ne!(normalize_answer("2x+7y"), normalize_answer("2x + 7y"));
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ääää";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('ä'));
    assert!(t.contains("8 bytes total"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
