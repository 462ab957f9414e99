use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption, Task};
use crate::db::types::QuestionKind;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionOptionCreate {
    #[validate(length(min = 1, message = "option text must not be empty"))]
    pub(crate) text: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    pub(crate) position: i32,
    pub(crate) kind: QuestionKind,
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub(crate) prompt: String,
    #[validate(range(exclusive_min = 0.0, message = "points must be positive"))]
    pub(crate) points: f64,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Vec<QuestionOptionCreate>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TaskCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "dueDate", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) due_date: OffsetDateTime,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

/// Body of a question-set replacement. Carries the full new set; the old
/// questions are dropped wholesale.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionSetReplace {
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TaskUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(
        default,
        alias = "dueDate",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) due_date: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionOptionResponse {
    pub(crate) id: String,
    pub(crate) position: i32,
    pub(crate) text: String,
    /// `None` in student views so the key never leaks the answer.
    pub(crate) is_correct: Option<bool>,
}

impl QuestionOptionResponse {
    pub(crate) fn from_db(option: QuestionOption, include_correct: bool) -> Self {
        Self {
            id: option.id,
            position: option.position,
            text: option.text,
            is_correct: include_correct.then_some(option.is_correct),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) position: i32,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) options: Vec<QuestionOptionResponse>,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question, options: Vec<QuestionOptionResponse>) -> Self {
        Self {
            id: question.id,
            position: question.position,
            kind: question.kind,
            prompt: question.prompt,
            points: question.points,
            options,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskResponse {
    pub(crate) id: String,
    pub(crate) class_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) points: f64,
    pub(crate) due_date: String,
    pub(crate) published: bool,
    pub(crate) published_at: Option<String>,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) questions: Vec<QuestionResponse>,
}

impl TaskResponse {
    pub(crate) fn from_db(task: Task, questions: Vec<QuestionResponse>) -> Self {
        Self {
            id: task.id,
            class_id: task.class_id,
            title: task.title,
            description: task.description,
            points: task.points,
            due_date: format_primitive(task.due_date),
            published: task.published,
            published_at: task.published_at.map(format_primitive),
            created_by: task.created_by,
            created_at: format_primitive(task.created_at),
            updated_at: format_primitive(task.updated_at),
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskListItem {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) points: f64,
    pub(crate) due_date: String,
    pub(crate) published: bool,
    pub(crate) created_at: String,
}

impl TaskListItem {
    pub(crate) fn from_db(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            points: task.points,
            due_date: format_primitive(task.due_date),
            published: task.published,
            created_at: format_primitive(task.created_at),
        }
    }
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
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

    // Fallback for explicit format "YYYY-MM-DDTHH:MM[:SS]"
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

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}
