use serde::{Deserialize, Serialize};
use std::fmt;

/// The three collections the board keeps cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Task,
    Issue,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Project, EntityKind::Task, EntityKind::Issue];

    /// Remote collection (table) name.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Project => "projects",
            EntityKind::Task => "tasks",
            EntityKind::Issue => "issues",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

// The first variant of each status is the default (initial) status.
status_enum!(
    /// Lifecycle of a project.
    ProjectStatus {
        Planned => "planned",
        Active => "active",
        Completed => "completed",
    }
);

status_enum!(
    TaskStatus {
        Todo => "todo",
        InProgress => "in-progress",
        Done => "done",
    }
);

status_enum!(
    IssueStatus {
        Open => "open",
        InProgress => "in-progress",
        Resolved => "resolved",
        Closed => "closed",
    }
);

status_enum!(
    /// How a custom section's content is meant to be read.
    SectionType {
        Text => "text",
        Link => "link",
        Markdown => "markdown",
        File => "file",
    }
);

/// A freeform titled block attached to a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSection {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    pub created_at: String,
    pub updated_at: String,
}

impl CustomSection {
    /// Effective content type; absent means plain text.
    pub fn kind(&self) -> SectionType {
        self.section_type.unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<String>,
    pub tech_stack: Vec<String>,
    pub tags: Vec<String>,
    pub custom_sections: Vec<CustomSection>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub labels: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create a project. The store assigns id and timestamps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub due_date: Option<String>,
    pub completion_date: Option<String>,
    pub tech_stack: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub due_date: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub labels: Vec<String>,
}
