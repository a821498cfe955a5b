//! Simplified views of student classifications.
//!
//! The portal exchanges grades as flat lists of
//! `StudentClassificationPreviewDto` records. For scripting it is easier to
//! work with nested maps, keyed either student first (`StudentsToTasks`)
//! or task first (`TasksToStudents`). The functions here convert between
//! the two shapes.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::api::Result;
use crate::models::StudentClassificationPreviewDto;

/// student username -> classification identifier -> value
pub type StudentsToTasks = BTreeMap<String, BTreeMap<String, Value>>;

/// classification identifier -> student username -> value
pub type TasksToStudents = BTreeMap<String, BTreeMap<String, Value>>;

/// Flatten a student-first matrix into save-request records.
///
/// A student with no grades produces no record and is absent from any
/// matrix rebuilt from the result.
pub fn save_request_from_s2t(student_to_tasks: &StudentsToTasks) -> Vec<StudentClassificationPreviewDto> {
    student_to_tasks
        .iter()
        .flat_map(|(username, grades)| {
            grades.iter().map(move |(task, value)| {
                StudentClassificationPreviewDto::new(task.as_str(), username.as_str(), value.clone())
            })
        })
        .collect()
}

/// Flatten a task-first matrix into save-request records
pub fn save_request_from_t2s(task_to_students: &TasksToStudents) -> Vec<StudentClassificationPreviewDto> {
    task_to_students
        .iter()
        .flat_map(|(task, grades)| {
            grades.iter().map(move |(username, value)| {
                StudentClassificationPreviewDto::new(task.as_str(), username.as_str(), value.clone())
            })
        })
        .collect()
}

/// (student, task, value) of a record, if it names both keys.
/// A record without a value maps to `null`.
fn triple(preview: &StudentClassificationPreviewDto) -> Option<(&str, &str, Value)> {
    let student = preview.student_username.as_deref()?;
    let task = preview.classification_identifier.as_deref()?;
    Some((student, task, preview.value.clone().unwrap_or(Value::Null)))
}

pub fn s2t_from_previews(previews: &[StudentClassificationPreviewDto]) -> StudentsToTasks {
    let mut result = StudentsToTasks::new();
    for (student, task, value) in previews.iter().filter_map(triple) {
        result
            .entry(student.to_string())
            .or_default()
            .insert(task.to_string(), value);
    }
    result
}

pub fn t2s_from_previews(previews: &[StudentClassificationPreviewDto]) -> TasksToStudents {
    let mut result = TasksToStudents::new();
    for (student, task, value) in previews.iter().filter_map(triple) {
        result
            .entry(task.to_string())
            .or_default()
            .insert(student.to_string(), value);
    }
    result
}

fn previews_from_response(body: &Value) -> Result<Vec<StudentClassificationPreviewDto>> {
    let previews: Vec<StudentClassificationPreviewDto> = serde_json::from_value(body.clone())?;
    debug!(count = previews.len(), "Parsed student classifications");
    Ok(previews)
}

/// Student-first matrix from a group classifications response body
pub fn s2t_from_response(body: &Value) -> Result<StudentsToTasks> {
    Ok(s2t_from_previews(&previews_from_response(body)?))
}

/// Task-first matrix from a group classifications response body
pub fn t2s_from_response(body: &Value) -> Result<TasksToStudents> {
    Ok(t2s_from_previews(&previews_from_response(body)?))
}
