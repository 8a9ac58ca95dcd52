use time::PrimitiveDateTime;

/// Whole days late, rounded up. Any overshoot past the deadline counts as a
/// full day, so one minute late is one day late.
pub(crate) fn late_days(deadline: PrimitiveDateTime, submitted_at: PrimitiveDateTime) -> i32 {
    if submitted_at <= deadline {
        return 0;
    }
    let late_seconds = (submitted_at - deadline).whole_seconds();
    let days = (late_seconds + 86_399) / 86_400;
    days.max(1) as i32
}

/// Applies the per-day percentage penalty to a raw score. The penalty is
/// capped at 100%, so a very late submission bottoms out at zero rather than
/// going negative.
pub(crate) fn effective_score(raw_score: f64, penalty_percentage: f64, days_late: i32) -> f64 {
    if days_late <= 0 {
        return raw_score;
    }
    let penalty_fraction = (penalty_percentage * days_late as f64 / 100.0).min(1.0);
    raw_score * (1.0 - penalty_fraction)
}

/// Converts a penalised score into continuous-assessment marks proportional
/// to the assignment's CA allocation.
pub(crate) fn ca_marks(effective: f64, max_score: f64, allocated_marks: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    effective / max_score * allocated_marks
}
