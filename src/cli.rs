use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;
use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};
use crate::types::{IssueStatus, ProjectStatus, SectionType, TaskStatus};

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log filter used when RUST_LOG is unset (e.g. `debug`, `project_board=trace`)
    #[arg(long, global = true, env = "PROJECT_BOARD_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Store base URL (PostgREST / Supabase project URL)
    #[arg(long, global = true, env = "PROJECT_BOARD_URL")]
    pub url: Option<String>,

    /// API key sent as `apikey` and bearer token
    #[arg(long, global = true, env = "PROJECT_BOARD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "PROJECT_BOARD_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Settings file (defaults to <config dir>/project-board/settings.json)
    #[arg(long, global = true, env = "PROJECT_BOARD_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Use an empty in-process store instead of the remote one
    #[arg(long, global = true, default_value_t = false)]
    pub memory: bool,
}

impl ConnectionArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            store_url: self.url.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Projects grouped by status, with task and issue counts
    Dashboard,
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage issues
    #[command(subcommand)]
    Issue(IssueCommand),
    /// Re-fetch every collection after a failure
    Retry,
    /// Interactive session sharing one cache across commands
    Shell,
    /// Show the resolved connection settings
    Status,
    /// Edit settings.json interactively
    Config,
    /// Print version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectCommand {
    /// List projects, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one project with its tasks, issues and sections
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Create a project
    Create(ProjectCreateArgs),
    /// Change fields of a project
    Update(ProjectUpdateArgs),
    /// Set a project's status (completing stamps the completion date)
    Status { id: String, status: ProjectStatus },
    /// Delete a project
    Delete { id: String },
    /// Edit a project's custom sections (kept for the current session only)
    #[command(subcommand)]
    Section(SectionCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum SectionCommand {
    /// Add a titled block to a project
    Add {
        project: String,
        title: String,
        content: String,
        /// text, link, markdown or file
        #[arg(long = "type")]
        section_type: Option<SectionType>,
    },
    /// Change a section; omitted fields keep their value
    Edit {
        project: String,
        section: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long = "type")]
        section_type: Option<SectionType>,
    },
    /// Remove a section
    Remove { project: String, section: String },
}

#[derive(Args, Debug, Clone)]
pub struct ProjectCreateArgs {
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value_t = ProjectStatus::Planned)]
    pub status: ProjectStatus,
    /// Due date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub due: Option<String>,
    /// Comma-separated technologies
    #[arg(long)]
    pub tech: Option<String>,
    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<ProjectStatus>,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
    #[arg(long)]
    pub tech: Option<String>,
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Task board: todo, in progress, done
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Create a task in a project
    Create(TaskCreateArgs),
    /// Change fields of a task
    Update(TaskUpdateArgs),
    /// Move a task to another column
    Status { id: String, status: TaskStatus },
    /// Delete a task
    Delete { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct TaskCreateArgs {
    pub title: String,
    #[arg(long)]
    pub project: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value_t = TaskStatus::Todo)]
    pub status: TaskStatus,
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TaskUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum IssueCommand {
    /// Issue board: open, in progress, closed
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Open an issue against a project
    Create(IssueCreateArgs),
    /// Change fields of an issue
    Update(IssueUpdateArgs),
    /// Move an issue to another status
    Status { id: String, status: IssueStatus },
    /// Delete an issue
    Delete { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct IssueCreateArgs {
    pub title: String,
    #[arg(long)]
    pub project: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value_t = IssueStatus::Open)]
    pub status: IssueStatus,
    /// Comma-separated labels
    #[arg(long)]
    pub labels: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IssueUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<IssueStatus>,
    #[arg(long)]
    pub labels: Option<String>,
}

/// One line typed inside `shell`.
#[derive(Parser, Debug, Clone)]
#[command(no_binary_name = true, name = "shell")]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}
