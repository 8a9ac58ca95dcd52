use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Lecturer,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Essay,
}

impl QuestionType {
    pub(crate) fn is_objective(self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submittrigger", rename_all = "lowercase")]
pub(crate) enum SubmitTrigger {
    Manual,
    Deadline,
}

impl SubmitTrigger {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::Deadline => "deadline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submissionstatus", rename_all = "lowercase")]
pub(crate) enum SubmissionStatus {
    Submitted,
    Graded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "transactionkind", rename_all = "lowercase")]
pub(crate) enum TransactionKind {
    Credit,
    Debit,
}
