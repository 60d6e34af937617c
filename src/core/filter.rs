// LogSieve - core/filter.rs
//
// Line filter engine. All enabled rules are AND-combined; a disabled
// (blank) rule is never stored in a RuleSet and so contributes no
// constraint.
// Core layer: pure logic, no I/O.

use crate::core::model::{FilterRule, RuleKind, RuleSet};

/// Returns true if `line` satisfies every enabled rule in `rules`.
///
/// An empty rule set accepts every line.
pub fn evaluate(line: &str, rules: &RuleSet) -> bool {
    rules.rules().iter().all(|rule| rule_accepts(line, rule))
}

/// Returns true if at least one of `lines` is accepted.
pub fn any_line_matches<I, S>(lines: I, rules: &RuleSet) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines.into_iter().any(|l| evaluate(l.as_ref(), rules))
}

/// Evaluate a single rule.
fn rule_accepts(line: &str, rule: &FilterRule) -> bool {
    // Rules built outside a RuleSet may be blank.
    if !rule.is_enabled() {
        return true;
    }
    let pattern = rule.pattern.as_str();

    match rule.kind {
        RuleKind::StartsOrEndsWith => line.starts_with(pattern) || line.ends_with(pattern),
        RuleKind::OrContains => line.contains(pattern),
        RuleKind::AndContainsToken => line.split_whitespace().any(|token| token == pattern),
        RuleKind::AndNotContains => !line.contains(pattern),
    }
}
