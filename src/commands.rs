//! Command handlers.
//!
//! Each handler runs against a shared [`ProjectData`] and returns the text to
//! show, so one-shot invocations and `shell` behave the same way.

use std::path::Path;

use chrono::Utc;
use dialoguer::{Input, Password};
use serde::Serialize;
use tracing::debug;

use crate::board;
use crate::cli::{
    Command, IssueCommand, IssueCreateArgs, IssueUpdateArgs, ProjectCommand, ProjectCreateArgs,
    ProjectUpdateArgs, SectionCommand, TaskCommand, TaskCreateArgs, TaskUpdateArgs,
};
use crate::config::Settings;
use crate::data::{self, ProjectData, Resource};
use crate::error::{ServiceError, ServiceResult};
use crate::metadata::{PKG_NAME, PKG_VERSION};
use crate::render;
use crate::sections;
use crate::types::{Issue, NewIssue, NewProject, NewTask, Project, Task};

/// Run a command that needs the store.
pub async fn run(data: &ProjectData, command: Command) -> ServiceResult<String> {
    debug!(?command, "running command");
    match command {
        Command::Dashboard => dashboard(data).await,
        Command::Project(cmd) => project(data, cmd).await,
        Command::Task(cmd) => task(data, cmd).await,
        Command::Issue(cmd) => issue(data, cmd).await,
        Command::Retry => retry(data).await,
        Command::Shell | Command::Status | Command::Config | Command::Version => Err(
            ServiceError::InvalidInput("this command does not talk to the store".to_string()),
        ),
    }
}

/// Current collection of `R`, or the fetch error it is stuck in.
async fn loaded<R: Resource>(data: &ProjectData) -> ServiceResult<Vec<R>> {
    let snapshot = data.list::<R>().await;
    match snapshot.error {
        Some(source) => Err(ServiceError::Fetch {
            kind: R::KIND,
            source,
        }),
        None => Ok(snapshot.data),
    }
}

async fn find<R: Resource>(data: &ProjectData, id: &str) -> ServiceResult<R> {
    loaded::<R>(data)
        .await?
        .into_iter()
        .find(|item| item.id() == id)
        .ok_or_else(|| ServiceError::NotFound(format!("{} '{id}'", R::KIND)))
}

fn required(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn due_date(value: Option<String>) -> ServiceResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(raw) if board::parse_date(&raw).is_some() => Ok(Some(raw.trim().to_string())),
        Some(raw) => Err(ServiceError::InvalidInput(format!(
            "'{raw}' is not a date (use YYYY-MM-DD or RFC 3339)"
        ))),
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> ServiceResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

async fn dashboard(data: &ProjectData) -> ServiceResult<String> {
    let (projects, tasks, issues) = futures::join!(
        loaded::<Project>(data),
        loaded::<Task>(data),
        loaded::<Issue>(data)
    );
    Ok(render::dashboard(&projects?, &tasks?, &issues?))
}

async fn retry(data: &ProjectData) -> ServiceResult<String> {
    data.retry_all();
    let (projects, tasks, issues) = futures::join!(data.projects(), data.tasks(), data.issues());
    let failed: Vec<String> = [
        projects.error.map(|e| format!("projects: {e}")),
        tasks.error.map(|e| format!("tasks: {e}")),
        issues.error.map(|e| format!("issues: {e}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if failed.is_empty() {
        Ok(format!(
            "reloaded {} projects, {} tasks, {} issues",
            projects.data.len(),
            tasks.data.len(),
            issues.data.len()
        ))
    } else {
        Err(ServiceError::Other(format!("still failing: {}", failed.join("; "))))
    }
}

async fn project(data: &ProjectData, command: ProjectCommand) -> ServiceResult<String> {
    match command {
        ProjectCommand::List { json: as_json } => {
            let projects = loaded::<Project>(data).await?;
            if as_json {
                json(&projects)
            } else {
                Ok(render::project_list(&projects))
            }
        }
        ProjectCommand::Show { id, json: as_json } => {
            let project = find::<Project>(data, &id).await?;
            if as_json {
                return json(&project);
            }
            let (tasks, issues) = futures::join!(loaded::<Task>(data), loaded::<Issue>(data));
            Ok(render::project_detail(&project, &tasks?, &issues?, Utc::now()))
        }
        ProjectCommand::Create(args) => {
            let created = data.create_project(&new_project(args)?).await?;
            Ok(format!("created project {} ({})", created.name, created.id))
        }
        ProjectCommand::Update(args) => {
            let current = find::<Project>(data, &args.id).await?;
            let updated = data
                .update_project(&apply_project_update(current, args)?)
                .await?;
            Ok(format!("updated project {}", updated.id))
        }
        ProjectCommand::Status { id, status } => {
            let current = find::<Project>(data, &id).await?;
            let changed = board::project_with_status(&current, status, &data::timestamp());
            data.update_project(&changed).await?;
            Ok(format!("project {id} is now {status}"))
        }
        ProjectCommand::Delete { id } => {
            data.delete_project(&id).await?;
            Ok(format!("deleted project {id}"))
        }
        ProjectCommand::Section(cmd) => section(data, cmd).await,
    }
}

async fn section(data: &ProjectData, command: SectionCommand) -> ServiceResult<String> {
    let now = data::timestamp();
    let (project, message) = match command {
        SectionCommand::Add {
            project,
            title,
            content,
            section_type,
        } => {
            let current = find::<Project>(data, &project).await?;
            let updated = sections::add_section(&current, &title, &content, section_type, &now)?;
            let id = updated
                .custom_sections
                .last()
                .map(|s| s.id.clone())
                .unwrap_or_default();
            (updated, format!("added section {id} to project {project}"))
        }
        SectionCommand::Edit {
            project,
            section,
            title,
            content,
            section_type,
        } => {
            let current = find::<Project>(data, &project).await?;
            let existing = current
                .custom_sections
                .iter()
                .find(|s| s.id == section)
                .ok_or_else(|| ServiceError::NotFound(format!("section {section}")))?;
            let title = title.unwrap_or_else(|| existing.title.clone());
            let content = content.unwrap_or_else(|| existing.content.clone());
            let updated =
                sections::edit_section(&current, &section, &title, &content, section_type, &now)?;
            (updated, format!("updated section {section}"))
        }
        SectionCommand::Remove { project, section } => {
            let current = find::<Project>(data, &project).await?;
            let updated = sections::remove_section(&current, &section)?;
            (updated, format!("removed section {section}"))
        }
    };
    data.update_sections(&project).await?;
    Ok(message)
}

fn new_project(args: ProjectCreateArgs) -> ServiceResult<NewProject> {
    Ok(NewProject {
        name: required("project name", &args.name)?,
        description: args.description,
        status: args.status,
        due_date: due_date(args.due)?,
        completion_date: None,
        tech_stack: args.tech.as_deref().map(board::parse_list).unwrap_or_default(),
        tags: args.tags.as_deref().map(board::parse_list).unwrap_or_default(),
    })
}

fn apply_project_update(mut project: Project, args: ProjectUpdateArgs) -> ServiceResult<Project> {
    if let Some(name) = args.name {
        project.name = required("project name", &name)?;
    }
    if let Some(description) = args.description {
        project.description = description;
    }
    if let Some(status) = args.status {
        project = board::project_with_status(&project, status, &data::timestamp());
    }
    if args.clear_due {
        project.due_date = None;
    } else if let Some(due) = due_date(args.due)? {
        project.due_date = Some(due);
    }
    if let Some(tech) = args.tech {
        project.tech_stack = board::parse_list(&tech);
    }
    if let Some(tags) = args.tags {
        project.tags = board::parse_list(&tags);
    }
    Ok(project)
}

async fn task(data: &ProjectData, command: TaskCommand) -> ServiceResult<String> {
    match command {
        TaskCommand::List {
            project,
            json: as_json,
        } => {
            let (projects, tasks) = futures::join!(loaded::<Project>(data), loaded::<Task>(data));
            let projects = projects?;
            let mut tasks = tasks?;
            if let Some(project_id) = project {
                tasks.retain(|t| t.project_id == project_id);
            }
            if as_json {
                json(&tasks)
            } else {
                Ok(render::task_board(&projects, &tasks, Utc::now()))
            }
        }
        TaskCommand::Create(args) => {
            let created = data.create_task(&new_task(args)?).await?;
            Ok(format!("created task {} ({})", created.title, created.id))
        }
        TaskCommand::Update(args) => {
            let current = find::<Task>(data, &args.id).await?;
            let updated = data.update_task(&apply_task_update(current, args)?).await?;
            Ok(format!("updated task {}", updated.id))
        }
        TaskCommand::Status { id, status } => {
            let current = find::<Task>(data, &id).await?;
            data.update_task(&board::task_with_status(&current, status))
                .await?;
            Ok(format!("task {id} is now {status}"))
        }
        TaskCommand::Delete { id } => {
            data.delete_task(&id).await?;
            Ok(format!("deleted task {id}"))
        }
    }
}

fn new_task(args: TaskCreateArgs) -> ServiceResult<NewTask> {
    Ok(NewTask {
        project_id: required("project", &args.project)?,
        title: required("task title", &args.title)?,
        description: args.description,
        status: args.status,
        due_date: due_date(args.due)?,
    })
}

fn apply_task_update(mut task: Task, args: TaskUpdateArgs) -> ServiceResult<Task> {
    if let Some(title) = args.title {
        task.title = required("task title", &title)?;
    }
    if let Some(description) = args.description {
        task.description = description;
    }
    if let Some(status) = args.status {
        task.status = status;
    }
    if args.clear_due {
        task.due_date = None;
    } else if let Some(due) = due_date(args.due)? {
        task.due_date = Some(due);
    }
    Ok(task)
}

async fn issue(data: &ProjectData, command: IssueCommand) -> ServiceResult<String> {
    match command {
        IssueCommand::List {
            project,
            json: as_json,
        } => {
            let (projects, issues) =
                futures::join!(loaded::<Project>(data), loaded::<Issue>(data));
            let projects = projects?;
            let mut issues = issues?;
            if let Some(project_id) = project {
                issues.retain(|i| i.project_id == project_id);
            }
            if as_json {
                json(&issues)
            } else {
                Ok(render::issue_board(&projects, &issues))
            }
        }
        IssueCommand::Create(args) => {
            let created = data.create_issue(&new_issue(args)?).await?;
            Ok(format!("opened issue {} ({})", created.title, created.id))
        }
        IssueCommand::Update(args) => {
            let current = find::<Issue>(data, &args.id).await?;
            let updated = data
                .update_issue(&apply_issue_update(current, args)?)
                .await?;
            Ok(format!("updated issue {}", updated.id))
        }
        IssueCommand::Status { id, status } => {
            let current = find::<Issue>(data, &id).await?;
            data.update_issue(&board::issue_with_status(&current, status))
                .await?;
            Ok(format!("issue {id} is now {status}"))
        }
        IssueCommand::Delete { id } => {
            data.delete_issue(&id).await?;
            Ok(format!("deleted issue {id}"))
        }
    }
}

fn new_issue(args: IssueCreateArgs) -> ServiceResult<NewIssue> {
    Ok(NewIssue {
        project_id: required("project", &args.project)?,
        title: required("issue title", &args.title)?,
        description: args.description,
        status: args.status,
        labels: args.labels.as_deref().map(board::parse_list).unwrap_or_default(),
    })
}

fn apply_issue_update(mut issue: Issue, args: IssueUpdateArgs) -> ServiceResult<Issue> {
    if let Some(title) = args.title {
        issue.title = required("issue title", &title)?;
    }
    if let Some(description) = args.description {
        issue.description = description;
    }
    if let Some(status) = args.status {
        issue.status = status;
    }
    if let Some(labels) = args.labels {
        issue.labels = board::parse_list(&labels);
    }
    Ok(issue)
}

// commands that never touch the store

pub fn version() -> String {
    format!("{PKG_NAME} {PKG_VERSION}")
}

pub fn status(settings: &Settings, settings_path: Option<&Path>, memory: bool) -> String {
    let backend = if memory { "memory" } else { "rest" };
    let url = settings.store_url.as_deref().unwrap_or("(unset)");
    let path = settings_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let validity = match settings.validate() {
        Ok(()) => "ok".to_string(),
        Err(err) if memory => format!("ignored in memory mode ({err})"),
        Err(err) => err.to_string(),
    };
    format!(
        "backend:  {backend}\nstore:    {url}\napi key:  {}\ntimeout:  {}s\nsettings: {path}\nconfig:   {validity}",
        settings.masked_api_key(),
        settings.timeout_secs,
    )
}

/// Prompt for each setting, starting from what is on disk, and save.
pub fn configure(path: &Path) -> ServiceResult<String> {
    let current = Settings::load(path)?;
    let prompt_err = |e: dialoguer::Error| ServiceError::Other(format!("prompt failed: {e}"));

    let store_url: String = Input::new()
        .with_prompt("Store URL")
        .with_initial_text(current.store_url.clone().unwrap_or_default())
        .interact_text()
        .map_err(prompt_err)?;
    let api_key = Password::new()
        .with_prompt("API key (leave empty to keep the current one)")
        .allow_empty_password(true)
        .interact()
        .map_err(prompt_err)?;
    let timeout_secs: u64 = Input::new()
        .with_prompt("Timeout (seconds)")
        .default(current.timeout_secs)
        .interact_text()
        .map_err(prompt_err)?;

    let settings = Settings {
        store_url: Some(store_url.trim().to_string()).filter(|u| !u.is_empty()),
        api_key: if api_key.is_empty() {
            current.api_key
        } else {
            Some(api_key)
        },
        timeout_secs,
    };
    settings.validate()?;
    settings.save(path)?;
    Ok(format!("saved {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{MemoryStore, StoreOp};
    use crate::types::{ProjectStatus, TaskStatus};

    fn setup() -> (Arc<MemoryStore>, ProjectData) {
        colored::control::set_override(false);
        let store = Arc::new(MemoryStore::new());
        let data = ProjectData::new(store.clone());
        (store, data)
    }

    fn create_project(name: &str) -> Command {
        Command::Project(ProjectCommand::Create(ProjectCreateArgs {
            name: name.into(),
            description: String::new(),
            status: ProjectStatus::Planned,
            due: None,
            tech: Some("rust, , tokio".into()),
            tags: None,
        }))
    }

    #[tokio::test]
    async fn test_create_parses_lists_and_rejects_blank_names() {
        let (store, data) = setup();
        run(&data, create_project("Site")).await.unwrap();
        let rows = store.rows("projects");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["tech_stack"], serde_json::json!(["rust", "tokio"]));

        let err = run(&data, create_project("   ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(store.calls(StoreOp::Insert, "projects"), 1);
    }

    #[tokio::test]
    async fn test_completing_a_project_stamps_completion_date() {
        let (store, data) = setup();
        store.push_next_id("p1");
        run(&data, create_project("Site")).await.unwrap();

        run(
            &data,
            Command::Project(ProjectCommand::Status {
                id: "p1".into(),
                status: ProjectStatus::Completed,
            }),
        )
        .await
        .unwrap();

        let project = find::<Project>(&data, "p1").await.unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
        assert!(project.completion_date.is_some());
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_not_found() {
        let (store, data) = setup();
        let err = run(
            &data,
            Command::Task(TaskCommand::Status {
                id: "nope".into(),
                status: TaskStatus::Done,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(store.calls(StoreOp::Update, "tasks"), 0);
    }

    #[tokio::test]
    async fn test_task_update_clears_due_date() {
        let (store, data) = setup();
        store.push_next_id("t1");
        data.create_task(&NewTask {
            project_id: "p1".into(),
            title: "write docs".into(),
            due_date: Some("2024-01-01".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        run(
            &data,
            Command::Task(TaskCommand::Update(TaskUpdateArgs {
                id: "t1".into(),
                title: None,
                description: None,
                status: None,
                due: None,
                clear_due: true,
            })),
        )
        .await
        .unwrap();
        assert_eq!(store.rows("tasks")[0]["due_date"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_bad_due_date_is_rejected() {
        let (_store, data) = setup();
        let err = run(
            &data,
            Command::Task(TaskCommand::Create(TaskCreateArgs {
                title: "x".into(),
                project: "p1".into(),
                description: String::new(),
                status: TaskStatus::Todo,
                due: Some("next week".into()),
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_until_retry() {
        let (store, data) = setup();
        store.fail_next(StoreOp::Select, "connection refused");
        let err = run(&data, Command::Dashboard).await.unwrap_err();
        assert!(matches!(err, ServiceError::Fetch { .. }));
        assert!(err.is_transport());

        // still failed from cache, no new select
        let selects = store.calls(StoreOp::Select, "projects");
        assert!(run(&data, Command::Project(ProjectCommand::List { json: false })).await.is_err());
        assert_eq!(store.calls(StoreOp::Select, "projects"), selects);

        let out = run(&data, Command::Retry).await.unwrap();
        assert_eq!(out, "reloaded 0 projects, 0 tasks, 0 issues");
    }

    #[tokio::test]
    async fn test_list_json_is_camel_case() {
        let (_store, data) = setup();
        data.create_issue(&NewIssue {
            project_id: "p1".into(),
            title: "crash".into(),
            labels: vec!["bug".into()],
            ..Default::default()
        })
        .await
        .unwrap();
        let out = run(
            &data,
            Command::Issue(IssueCommand::List {
                project: Some("p1".into()),
                json: true,
            }),
        )
        .await
        .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["projectId"], "p1");
        assert_eq!(parsed[0]["labels"][0], "bug");
    }

    #[tokio::test]
    async fn test_section_commands_within_one_session() {
        let (store, data) = setup();
        store.push_next_id("p1");
        run(&data, create_project("Site")).await.unwrap();

        let out = run(
            &data,
            Command::Project(ProjectCommand::Section(SectionCommand::Add {
                project: "p1".into(),
                title: " Docs ".into(),
                content: "https://example.com".into(),
                section_type: Some(crate::types::SectionType::Link),
            })),
        )
        .await
        .unwrap();
        assert!(out.starts_with("added section "));

        let project = find::<Project>(&data, "p1").await.unwrap();
        assert_eq!(project.custom_sections.len(), 1);
        let section_id = project.custom_sections[0].id.clone();
        assert_eq!(project.custom_sections[0].title, "Docs");

        run(
            &data,
            Command::Project(ProjectCommand::Section(SectionCommand::Edit {
                project: "p1".into(),
                section: section_id.clone(),
                title: None,
                content: Some("https://docs.example.com".into()),
                section_type: None,
            })),
        )
        .await
        .unwrap();
        let project = find::<Project>(&data, "p1").await.unwrap();
        assert_eq!(project.custom_sections[0].title, "Docs");
        assert_eq!(project.custom_sections[0].content, "https://docs.example.com");

        let err = run(
            &data,
            Command::Project(ProjectCommand::Section(SectionCommand::Remove {
                project: "p1".into(),
                section: "missing".into(),
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        run(
            &data,
            Command::Project(ProjectCommand::Section(SectionCommand::Remove {
                project: "p1".into(),
                section: section_id,
            })),
        )
        .await
        .unwrap();
        let project = find::<Project>(&data, "p1").await.unwrap();
        assert!(project.custom_sections.is_empty());
        assert_eq!(store.calls(StoreOp::Update, "projects"), 3);
    }

    #[test]
    fn test_status_masks_key() {
        let settings = Settings {
            store_url: Some("https://abc.supabase.co".into()),
            api_key: Some("secret-key".into()),
            timeout_secs: 30,
        };
        let out = status(&settings, None, false);
        assert!(out.contains("secr…"));
        assert!(!out.contains("secret-key"));
        assert!(out.contains("config:   ok"));
    }
}
