//! Terminal rendering for boards and detail views.
//!
//! Every function returns the text instead of printing it, so the shell and
//! one-shot commands share them and tests can look at the output.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::board::{self, IssueBoard, TaskBoard};
use crate::error::ServiceError;
use crate::types::{
    CustomSection, Issue, IssueStatus, Project, ProjectStatus, SectionType, Task,
    TaskStatus,
};

const MAX_TECH_SHOWN: usize = 3;
const MAX_TAGS_SHOWN: usize = 2;

fn project_status(status: ProjectStatus) -> ColoredString {
    match status {
        ProjectStatus::Active => status.as_str().green(),
        ProjectStatus::Planned => status.as_str().yellow(),
        ProjectStatus::Completed => status.as_str().dimmed(),
    }
}

fn task_status(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Todo => status.as_str().normal(),
        TaskStatus::InProgress => status.as_str().blue(),
        TaskStatus::Done => status.as_str().green(),
    }
}

fn issue_status(status: IssueStatus) -> ColoredString {
    match status {
        IssueStatus::Open => status.as_str().red(),
        IssueStatus::InProgress => status.as_str().blue(),
        IssueStatus::Resolved => status.as_str().green(),
        IssueStatus::Closed => status.as_str().dimmed(),
    }
}

pub fn section_label(section_type: SectionType) -> &'static str {
    match section_type {
        SectionType::Text => "text",
        SectionType::Link => "link",
        SectionType::Markdown => "markdown",
        SectionType::File => "file reference",
    }
}

/// `a, b, c +2` style summary of a list.
fn truncated(items: &[String], max: usize) -> String {
    let mut out = items
        .iter()
        .take(max)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > max {
        let _ = write!(out, " +{}", items.len() - max);
    }
    out
}

fn short_date(value: &str) -> String {
    board::parse_date(value)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| value.to_string())
}

pub fn project_card(project: &Project, tasks: &[Task], issues: &[Issue]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {} {} [{}]",
        project.name.bold(),
        format!("({})", project.id).dimmed(),
        project_status(project.status)
    );
    if !project.description.is_empty() {
        let _ = writeln!(out, "    {}", project.description);
    }
    if !project.tech_stack.is_empty() {
        let _ = writeln!(out, "    tech: {}", truncated(&project.tech_stack, MAX_TECH_SHOWN));
    }
    if !project.tags.is_empty() {
        let _ = writeln!(out, "    tags: {}", truncated(&project.tags, MAX_TAGS_SHOWN));
    }
    if let Some(due) = &project.due_date {
        let _ = writeln!(out, "    due: {}", short_date(due));
    }
    let task_board = TaskBoard::new(board::tasks_for_project(tasks, &project.id));
    let issue_board = IssueBoard::new(board::issues_for_project(issues, &project.id));
    let _ = writeln!(
        out,
        "    tasks: {}/{} done, issues: {} open",
        task_board.done.len(),
        task_board.len(),
        issue_board.open.len() + issue_board.in_progress.len()
    );
    out
}

pub fn dashboard(projects: &[Project], tasks: &[Task], issues: &[Issue]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Project Dashboard".bold().underline());
    if projects.is_empty() {
        let _ = writeln!(out, "No projects yet. Create one with `project create <name>`.");
        return out;
    }

    let groups = board::group_projects(projects);
    for (title, bucket) in [
        ("Active", &groups.active),
        ("Planned", &groups.planned),
        ("Completed", &groups.completed),
    ] {
        if bucket.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{} ({})", title.bold(), bucket.len());
        for project in bucket {
            out.push_str(&project_card(project, tasks, issues));
        }
    }
    out
}

pub fn project_list(projects: &[Project]) -> String {
    let mut out = String::new();
    for project in projects {
        let _ = writeln!(
            out,
            "{}  {}  [{}]",
            project.id.dimmed(),
            project.name,
            project_status(project.status)
        );
    }
    if projects.is_empty() {
        out.push_str("No projects.\n");
    }
    out
}

fn section_block(section: &CustomSection) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {} {}",
        section.title.bold(),
        format!("({})", section_label(section.kind())).dimmed()
    );
    for line in section.content.lines() {
        let _ = writeln!(out, "    {}", line);
    }
    out
}

pub fn project_detail(
    project: &Project,
    tasks: &[Task],
    issues: &[Issue],
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", project.name.bold().underline());
    let _ = writeln!(out, "id: {}", project.id);
    let _ = writeln!(out, "status: {}", project_status(project.status));
    if !project.description.is_empty() {
        let _ = writeln!(out, "{}", project.description);
    }
    if let Some(due) = &project.due_date {
        let _ = writeln!(out, "due: {}", short_date(due));
    }
    if let Some(done) = &project.completion_date {
        let _ = writeln!(out, "completed: {}", short_date(done));
    }
    if !project.tech_stack.is_empty() {
        let _ = writeln!(out, "tech: {}", project.tech_stack.join(", "));
    }
    if !project.tags.is_empty() {
        let _ = writeln!(out, "tags: {}", project.tags.join(", "));
    }
    let _ = writeln!(out, "created: {}  updated: {}", project.created_at, project.updated_at);

    let project_tasks = board::tasks_for_project(tasks, &project.id);
    let _ = writeln!(out, "\n{}", "Tasks".bold());
    out.push_str(&task_columns(&TaskBoard::new(project_tasks), now));

    let project_issues = board::issues_for_project(issues, &project.id);
    let _ = writeln!(out, "\n{}", "Issues".bold());
    out.push_str(&issue_columns(&IssueBoard::new(project_issues)));

    let _ = writeln!(out, "\n{}", "Custom sections".bold());
    if project.custom_sections.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for section in &project.custom_sections {
        out.push_str(&section_block(section));
    }
    out
}

fn task_line(task: &Task, now: DateTime<Utc>) -> String {
    let mut line = format!("    {} {}", task.id.dimmed(), task.title);
    if let Some(due) = &task.due_date {
        let _ = write!(line, "  due {}", short_date(due));
    }
    if board::is_overdue(task, now) {
        let _ = write!(line, " {}", "OVERDUE".red().bold());
    }
    line
}

fn task_columns(board: &TaskBoard<'_>, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for (status, column) in [
        (TaskStatus::Todo, &board.todo),
        (TaskStatus::InProgress, &board.in_progress),
        (TaskStatus::Done, &board.done),
    ] {
        let _ = writeln!(out, "  {} ({})", task_status(status), column.len());
        for task in column {
            let _ = writeln!(out, "{}", task_line(task, now));
        }
    }
    out
}

fn issue_columns(board: &IssueBoard<'_>) -> String {
    let mut out = String::new();
    for (title, column) in [
        ("open", &board.open),
        ("in-progress", &board.in_progress),
        ("closed", &board.closed),
    ] {
        let _ = writeln!(out, "  {} ({})", title.bold(), column.len());
        for issue in column {
            let mut line = format!("    {} {} [{}]", issue.id.dimmed(), issue.title, issue_status(issue.status));
            if !issue.labels.is_empty() {
                let _ = write!(line, "  {}", issue.labels.join(", ").cyan());
            }
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

/// Task board across projects, one block per project.
pub fn task_board(projects: &[Project], tasks: &[Task], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Task Board".bold().underline());
    for (name, project_tasks) in per_project(projects, tasks, |t| &t.project_id) {
        let _ = writeln!(out, "\n{}", name.bold());
        out.push_str(&task_columns(&TaskBoard::new(project_tasks), now));
    }
    out
}

pub fn issue_board(projects: &[Project], issues: &[Issue]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Issue Board".bold().underline());
    for (name, project_issues) in per_project(projects, issues, |i| &i.project_id) {
        let _ = writeln!(out, "\n{}", name.bold());
        out.push_str(&issue_columns(&IssueBoard::new(project_issues)));
    }
    out
}

/// Group `items` under their project's name, in project order. Items whose
/// project is gone end up under "(unknown project)".
fn per_project<'a, T>(
    projects: &'a [Project],
    items: &'a [T],
    project_of: impl Fn(&T) -> &String,
) -> Vec<(String, Vec<&'a T>)> {
    let mut groups: Vec<(String, Vec<&'a T>)> = projects
        .iter()
        .map(|p| {
            let mine: Vec<&T> = items.iter().filter(|i| project_of(*i) == &p.id).collect();
            (p.name.clone(), mine)
        })
        .filter(|(_, mine)| !mine.is_empty())
        .collect();

    let orphans: Vec<&T> = items
        .iter()
        .filter(|i| board::project_name(projects, project_of(*i)).is_none())
        .collect();
    if !orphans.is_empty() {
        groups.push(("(unknown project)".to_string(), orphans));
    }
    groups
}

/// One-line error report; fetch failures get a hint about `retry`.
pub fn error(err: &ServiceError) -> String {
    let mut out = format!("{} {}", "error:".red().bold(), err);
    if let ServiceError::Fetch { kind, .. } = err {
        let _ = write!(
            out,
            "\n{} cached {kind} stay marked as failed until `retry` (inside `shell`) or the next run",
            "hint:".yellow()
        );
    } else if err.is_transport() {
        let _ = write!(out, "\n{} is the store reachable? check `project-board status`", "hint:".yellow());
    }
    out
}
