//! Board view-models: grouping, filtering and status changes.

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{Issue, IssueStatus, Project, ProjectStatus, Task, TaskStatus};

/// Projects split by lifecycle, each bucket keeping the input order.
#[derive(Debug, Default)]
pub struct ProjectGroups<'a> {
    pub active: Vec<&'a Project>,
    pub planned: Vec<&'a Project>,
    pub completed: Vec<&'a Project>,
}

pub fn group_projects(projects: &[Project]) -> ProjectGroups<'_> {
    let mut groups = ProjectGroups::default();
    for project in projects {
        match project.status {
            ProjectStatus::Active => groups.active.push(project),
            ProjectStatus::Planned => groups.planned.push(project),
            ProjectStatus::Completed => groups.completed.push(project),
        }
    }
    groups
}

pub fn tasks_for_project<'a>(tasks: &'a [Task], project_id: &str) -> Vec<&'a Task> {
    tasks.iter().filter(|t| t.project_id == project_id).collect()
}

pub fn issues_for_project<'a>(issues: &'a [Issue], project_id: &str) -> Vec<&'a Issue> {
    issues.iter().filter(|i| i.project_id == project_id).collect()
}

/// Name of the referenced project, if it still exists.
pub fn project_name<'a>(projects: &'a [Project], project_id: &str) -> Option<&'a str> {
    projects
        .iter()
        .find(|p| p.id == project_id)
        .map(|p| p.name.as_str())
}

#[derive(Debug, Default)]
pub struct TaskBoard<'a> {
    pub todo: Vec<&'a Task>,
    pub in_progress: Vec<&'a Task>,
    pub done: Vec<&'a Task>,
}

impl<'a> TaskBoard<'a> {
    pub fn new<I: IntoIterator<Item = &'a Task>>(tasks: I) -> Self {
        let mut board = TaskBoard::default();
        for task in tasks {
            match task.status {
                TaskStatus::Todo => board.todo.push(task),
                TaskStatus::InProgress => board.in_progress.push(task),
                TaskStatus::Done => board.done.push(task),
            }
        }
        board
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Issue columns; resolved and closed issues share the last column.
#[derive(Debug, Default)]
pub struct IssueBoard<'a> {
    pub open: Vec<&'a Issue>,
    pub in_progress: Vec<&'a Issue>,
    pub closed: Vec<&'a Issue>,
}

impl<'a> IssueBoard<'a> {
    pub fn new<I: IntoIterator<Item = &'a Issue>>(issues: I) -> Self {
        let mut board = IssueBoard::default();
        for issue in issues {
            match issue.status {
                IssueStatus::Open => board.open.push(issue),
                IssueStatus::InProgress => board.in_progress.push(issue),
                IssueStatus::Resolved | IssueStatus::Closed => board.closed.push(issue),
            }
        }
        board
    }

    pub fn len(&self) -> usize {
        self.open.len() + self.in_progress.len() + self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    if task.status == TaskStatus::Done {
        return false;
    }
    task.due_date
        .as_deref()
        .and_then(parse_date)
        .is_some_and(|due| due < now)
}

/// Copy of `project` in `status`; completing stamps the completion date.
pub fn project_with_status(project: &Project, status: ProjectStatus, now: &str) -> Project {
    let mut updated = project.clone();
    updated.status = status;
    if status == ProjectStatus::Completed {
        updated.completion_date = Some(now.to_string());
    }
    updated
}

pub fn task_with_status(task: &Task, status: TaskStatus) -> Task {
    Task {
        status,
        ..task.clone()
    }
}

pub fn issue_with_status(issue: &Issue, status: IssueStatus) -> Issue {
    Issue {
        status,
        ..issue.clone()
    }
}

/// Split a comma-separated flag value, dropping blanks.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, project: &str, status: TaskStatus, due: Option<&str>) -> Task {
        Task {
            id: id.into(),
            project_id: project.into(),
            title: id.into(),
            description: String::new(),
            status,
            due_date: due.map(str::to_string),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn issue(id: &str, status: IssueStatus) -> Issue {
        Issue {
            id: id.into(),
            project_id: "p1".into(),
            title: id.into(),
            description: String::new(),
            status,
            labels: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn project(id: &str, status: ProjectStatus) -> Project {
        Project {
            id: id.into(),
            name: format!("Project {id}"),
            description: String::new(),
            status,
            due_date: None,
            completion_date: None,
            tech_stack: vec![],
            tags: vec![],
            custom_sections: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_group_projects_keeps_order() {
        let projects = vec![
            project("a", ProjectStatus::Active),
            project("b", ProjectStatus::Planned),
            project("c", ProjectStatus::Active),
            project("d", ProjectStatus::Completed),
        ];
        let groups = group_projects(&projects);
        let active: Vec<&str> = groups.active.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(active, vec!["a", "c"]);
        assert_eq!(groups.planned.len(), 1);
        assert_eq!(groups.completed.len(), 1);
        assert_eq!(project_name(&projects, "d"), Some("Project d"));
        assert_eq!(project_name(&projects, "zz"), None);
    }

    #[test]
    fn test_issue_board_merges_resolved_and_closed() {
        let issues = vec![
            issue("1", IssueStatus::Open),
            issue("2", IssueStatus::Resolved),
            issue("3", IssueStatus::Closed),
            issue("4", IssueStatus::InProgress),
        ];
        let board = IssueBoard::new(&issues);
        assert_eq!(board.open.len(), 1);
        assert_eq!(board.in_progress.len(), 1);
        assert_eq!(board.closed.len(), 2);
        assert_eq!(board.len(), 4);
    }

    #[test]
    fn test_task_board_for_one_project() {
        let tasks = vec![
            task("1", "p1", TaskStatus::Todo, None),
            task("2", "p2", TaskStatus::Done, None),
            task("3", "p1", TaskStatus::Done, None),
        ];
        let board = TaskBoard::new(tasks_for_project(&tasks, "p1"));
        assert_eq!(board.todo.len(), 1);
        assert_eq!(board.done.len(), 1);
        assert!(board.in_progress.is_empty());
    }

    #[test]
    fn test_overdue_rules() {
        let now = parse_date("2024-06-15T12:00:00Z").unwrap();
        assert!(is_overdue(&task("1", "p", TaskStatus::Todo, Some("2024-06-01")), now));
        assert!(!is_overdue(&task("2", "p", TaskStatus::Done, Some("2024-06-01")), now));
        assert!(!is_overdue(&task("3", "p", TaskStatus::Todo, Some("2024-07-01")), now));
        assert!(!is_overdue(&task("4", "p", TaskStatus::Todo, Some("soon")), now));
        assert!(!is_overdue(&task("5", "p", TaskStatus::InProgress, None), now));
        assert!(is_overdue(
            &task("6", "p", TaskStatus::InProgress, Some("2024-06-15T11:59:59+00:00")),
            now
        ));
    }

    #[test]
    fn test_completing_a_project_stamps_completion_date() {
        let p = project("a", ProjectStatus::Active);
        let done = project_with_status(&p, ProjectStatus::Completed, "2024-06-15T00:00:00.000Z");
        assert_eq!(done.completion_date.as_deref(), Some("2024-06-15T00:00:00.000Z"));

        let planned = project_with_status(&p, ProjectStatus::Planned, "ignored");
        assert_eq!(planned.completion_date, None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" rust, ,postgres ,"), vec!["rust", "postgres"]);
        assert!(parse_list("").is_empty());
    }
}
