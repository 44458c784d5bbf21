//! Row ↔ entity translation
//!
//! Remote rows use snake_case keys, entities use their Rust field names. Reading
//! is total: absent or null text becomes `""`, absent or null dates become
//! `None`, absent or null lists become empty, and an unrecognised status falls
//! back to the kind's initial status. Custom sections are never read from a
//! row.

use serde_json::Value;

use crate::store::Row;
use crate::types::{Issue, NewIssue, NewProject, NewTask, Project, Task};

fn text(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        // numeric ids (bigint primary keys) still become opaque strings
        Some(other) => other.to_string(),
    }
}

fn optional_text(row: &Row, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::Null) | None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn text_list(row: &Row, key: &str) -> Vec<String> {
    match row.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn status<S: std::str::FromStr + Default>(row: &Row, key: &str) -> S {
    row.get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn opt_value(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn list_value(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

fn string(value: &str) -> Value {
    Value::String(value.to_string())
}

pub fn map_project(row: &Row) -> Project {
    Project {
        id: text(row, "id"),
        name: text(row, "name"),
        description: text(row, "description"),
        status: status(row, "status"),
        due_date: optional_text(row, "due_date"),
        completion_date: optional_text(row, "completion_date"),
        tech_stack: text_list(row, "tech_stack"),
        tags: text_list(row, "tags"),
        custom_sections: Vec::new(),
        created_at: text(row, "created_at"),
        updated_at: text(row, "updated_at"),
    }
}

pub fn map_task(row: &Row) -> Task {
    Task {
        id: text(row, "id"),
        project_id: text(row, "project_id"),
        title: text(row, "title"),
        description: text(row, "description"),
        status: status(row, "status"),
        due_date: optional_text(row, "due_date"),
        created_at: text(row, "created_at"),
        updated_at: text(row, "updated_at"),
    }
}

pub fn map_issue(row: &Row) -> Issue {
    Issue {
        id: text(row, "id"),
        project_id: text(row, "project_id"),
        title: text(row, "title"),
        description: text(row, "description"),
        status: status(row, "status"),
        labels: text_list(row, "labels"),
        created_at: text(row, "created_at"),
        updated_at: text(row, "updated_at"),
    }
}

pub fn project_insert_row(draft: &NewProject) -> Row {
    let mut row = Row::new();
    row.insert("name".into(), string(&draft.name));
    row.insert("description".into(), string(&draft.description));
    row.insert("status".into(), string(draft.status.as_str()));
    row.insert("due_date".into(), opt_value(&draft.due_date));
    row.insert("completion_date".into(), opt_value(&draft.completion_date));
    row.insert("tech_stack".into(), list_value(&draft.tech_stack));
    row.insert("tags".into(), list_value(&draft.tags));
    row
}

/// Mutable project fields plus the new `updated_at`.
pub fn project_update_row(project: &Project, updated_at: &str) -> Row {
    let mut row = Row::new();
    row.insert("name".into(), string(&project.name));
    row.insert("description".into(), string(&project.description));
    row.insert("status".into(), string(project.status.as_str()));
    row.insert("due_date".into(), opt_value(&project.due_date));
    row.insert("completion_date".into(), opt_value(&project.completion_date));
    row.insert("tech_stack".into(), list_value(&project.tech_stack));
    row.insert("tags".into(), list_value(&project.tags));
    row.insert("updated_at".into(), string(updated_at));
    row
}

pub fn task_insert_row(draft: &NewTask) -> Row {
    let mut row = Row::new();
    row.insert("project_id".into(), string(&draft.project_id));
    row.insert("title".into(), string(&draft.title));
    row.insert("description".into(), string(&draft.description));
    row.insert("status".into(), string(draft.status.as_str()));
    row.insert("due_date".into(), opt_value(&draft.due_date));
    row
}

pub fn task_update_row(task: &Task, updated_at: &str) -> Row {
    let mut row = Row::new();
    row.insert("title".into(), string(&task.title));
    row.insert("description".into(), string(&task.description));
    row.insert("status".into(), string(task.status.as_str()));
    row.insert("due_date".into(), opt_value(&task.due_date));
    row.insert("updated_at".into(), string(updated_at));
    row
}

pub fn issue_insert_row(draft: &NewIssue) -> Row {
    let mut row = Row::new();
    row.insert("project_id".into(), string(&draft.project_id));
    row.insert("title".into(), string(&draft.title));
    row.insert("description".into(), string(&draft.description));
    row.insert("status".into(), string(draft.status.as_str()));
    row.insert("labels".into(), list_value(&draft.labels));
    row
}

pub fn issue_update_row(issue: &Issue, updated_at: &str) -> Row {
    let mut row = Row::new();
    row.insert("title".into(), string(&issue.title));
    row.insert("description".into(), string(&issue.description));
    row.insert("status".into(), string(issue.status.as_str()));
    row.insert("labels".into(), list_value(&issue.labels));
    row.insert("updated_at".into(), string(updated_at));
    row
}
