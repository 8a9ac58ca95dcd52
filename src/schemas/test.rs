use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption, Test};
use crate::db::types::QuestionType;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct OptionCreate {
    #[serde(alias = "optionText")]
    #[validate(length(min = 1, message = "option_text must not be empty"))]
    pub(crate) option_text: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[serde(alias = "questionType")]
    pub(crate) question_type: QuestionType,
    #[serde(alias = "questionText")]
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: String,
    #[validate(range(exclusive_min = 0.0, message = "marks must be positive"))]
    pub(crate) marks: f64,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Vec<OptionCreate>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TestCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "totalMarks")]
    #[validate(range(exclusive_min = 0.0, message = "total_marks must be positive"))]
    pub(crate) total_marks: f64,
    #[serde(alias = "passMark")]
    #[validate(range(min = 0.0, max = 100.0, message = "pass_mark must be a percentage"))]
    pub(crate) pass_mark: f64,
    #[serde(default)]
    #[serde(alias = "allocatedMarks")]
    #[validate(range(min = 0.0, message = "allocated_marks must be non-negative"))]
    pub(crate) allocated_marks: f64,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(alias = "startTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(alias = "endTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) end_time: OffsetDateTime,
    #[serde(default)]
    #[serde(alias = "shuffleQuestions")]
    pub(crate) shuffle_questions: bool,
    #[serde(default)]
    #[serde(alias = "shuffleOptions")]
    pub(crate) shuffle_options: bool,
    #[serde(default = "default_max_attempts")]
    #[serde(alias = "maxAttempts")]
    #[validate(range(min = 1, message = "max_attempts must be positive"))]
    pub(crate) max_attempts: i32,
    #[serde(default)]
    #[serde(alias = "accessCost")]
    #[validate(range(min = 0.0, message = "access_cost must be non-negative"))]
    pub(crate) access_cost: f64,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) id: String,
    pub(crate) option_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

impl OptionResponse {
    /// Student-facing view; correctness flags stay hidden.
    pub(crate) fn public(option: &QuestionOption) -> Self {
        Self { id: option.id.clone(), option_text: option.option_text.clone(), is_correct: None }
    }

    pub(crate) fn authoring(option: &QuestionOption) -> Self {
        Self {
            id: option.id.clone(),
            option_text: option.option_text.clone(),
            is_correct: Some(option.is_correct),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) question_text: String,
    pub(crate) marks: f64,
    pub(crate) options: Vec<OptionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TestResponse {
    pub(crate) id: String,
    pub(crate) created_by: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) total_marks: f64,
    pub(crate) pass_mark: f64,
    pub(crate) allocated_marks: f64,
    pub(crate) duration_minutes: i32,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) shuffle_questions: bool,
    pub(crate) shuffle_options: bool,
    pub(crate) max_attempts: i32,
    pub(crate) access_cost: f64,
    pub(crate) is_published: bool,
    pub(crate) question_count: i64,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl TestResponse {
    pub(crate) fn from_db(test: Test, question_count: i64) -> Self {
        Self {
            id: test.id,
            created_by: test.created_by,
            title: test.title,
            description: test.description,
            total_marks: test.total_marks,
            pass_mark: test.pass_mark,
            allocated_marks: test.allocated_marks,
            duration_minutes: test.duration_minutes,
            start_time: format_primitive(test.start_time),
            end_time: format_primitive(test.end_time),
            shuffle_questions: test.shuffle_questions,
            shuffle_options: test.shuffle_options,
            max_attempts: test.max_attempts,
            access_cost: test.access_cost,
            is_published: test.is_published,
            question_count,
            created_at: format_primitive(test.created_at),
            updated_at: format_primitive(test.updated_at),
        }
    }
}

pub(crate) fn question_response(
    question: &Question,
    options: Vec<OptionResponse>,
) -> QuestionResponse {
    QuestionResponse {
        id: question.id.clone(),
        question_type: question.question_type,
        question_text: question.question_text.clone(),
        marks: question.marks,
        options,
    }
}

fn default_max_attempts() -> i32 {
    1
}

pub(crate) fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Frontend's datetime-local often sends without timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

pub(crate) fn deserialize_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let value = parse_offset_datetime_flexible("2024-01-10T00:00:00Z").expect("datetime");
        assert_eq!(value.unix_timestamp(), 1_704_844_800);
    }

    #[test]
    fn parses_datetime_local_without_timezone() {
        assert!(parse_offset_datetime_flexible("2024-01-10T08:30").is_some());
        assert!(parse_offset_datetime_flexible("2024-01-10T08:30:15").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_offset_datetime_flexible("next tuesday").is_none());
    }
}
