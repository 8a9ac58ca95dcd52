use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Hard deadline of an attempt: started_at plus the per-attempt duration.
/// Deliberately not clamped to the test's end_time; an attempt already in
/// progress keeps its full allotted window even if the test window closes.
pub(crate) fn attempt_deadline(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
) -> PrimitiveDateTime {
    started_at + Duration::minutes(i64::from(duration_minutes))
}

pub(crate) fn remaining_seconds(deadline: PrimitiveDateTime, now: PrimitiveDateTime) -> i64 {
    let remaining = deadline.assume_utc().unix_timestamp() - now.assume_utc().unix_timestamp();
    remaining.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time};

    fn at(hour: u8, minute: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::March, 10).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0).unwrap())
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        let value = PrimitiveDateTime::new(date, time);
        assert_eq!(format_primitive(value), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn attempt_deadline_adds_duration() {
        assert_eq!(attempt_deadline(at(9, 0), 90), at(10, 30));
    }

    #[test]
    fn remaining_seconds_counts_down_and_floors_at_zero() {
        assert_eq!(remaining_seconds(at(10, 0), at(9, 59)), 60);
        assert_eq!(remaining_seconds(at(10, 0), at(10, 0)), 0);
        assert_eq!(remaining_seconds(at(10, 0), at(11, 0)), 0);
    }
}
