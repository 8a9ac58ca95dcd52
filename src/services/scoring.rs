use std::collections::HashSet;

/// All-or-nothing grading for objective questions: the selection must match
/// the correct option set exactly. A superset or subset of the correct
/// options earns nothing.
pub(crate) fn grade_objective(selected: &[String], correct: &[String]) -> bool {
    if correct.is_empty() {
        return false;
    }
    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let correct: HashSet<&str> = correct.iter().map(String::as_str).collect();
    selected == correct
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Aggregate {
    pub(crate) total_score: f64,
    pub(crate) percentage: f64,
    pub(crate) passed: bool,
}

/// Sums awarded marks into the attempt-level result. Ungraded essays count as
/// zero here; the result is re-aggregated whenever an essay grade lands.
/// `pass_mark` is a percentage threshold, compared against the percentage.
pub(crate) fn aggregate(awarded: &[f64], total_marks: f64, pass_mark: f64) -> Aggregate {
    let total_score: f64 = awarded.iter().sum();
    let percentage = if total_marks > 0.0 { total_score / total_marks * 100.0 } else { 0.0 };
    let passed = percentage >= pass_mark;
    Aggregate { total_score, percentage, passed }
}
