//! Custom section editing.
//!
//! Sections have no endpoint of their own: every edit produces a new
//! [`Project`] whose whole `custom_sections` list is rewritten, to be handed
//! to `ProjectData::update_project`.

use ulid::Ulid;

use crate::error::{ServiceError, ServiceResult};
use crate::types::{CustomSection, Project, SectionType};

fn require(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!("section {field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn add_section(
    project: &Project,
    title: &str,
    content: &str,
    section_type: Option<SectionType>,
    now: &str,
) -> ServiceResult<Project> {
    let section = CustomSection {
        id: Ulid::new().to_string(),
        title: require("title", title)?,
        content: require("content", content)?,
        section_type: Some(section_type.unwrap_or_default()),
        created_at: now.to_string(),
        updated_at: now.to_string(),
    };
    let mut updated = project.clone();
    updated.custom_sections.push(section);
    Ok(updated)
}

/// Replace title, content and type of one section; bumps its `updated_at`.
pub fn edit_section(
    project: &Project,
    section_id: &str,
    title: &str,
    content: &str,
    section_type: Option<SectionType>,
    now: &str,
) -> ServiceResult<Project> {
    let title = require("title", title)?;
    let content = require("content", content)?;
    let mut updated = project.clone();
    let section = updated
        .custom_sections
        .iter_mut()
        .find(|s| s.id == section_id)
        .ok_or_else(|| ServiceError::NotFound(format!("section {section_id}")))?;
    section.title = title;
    section.content = content;
    if section_type.is_some() {
        section.section_type = section_type;
    }
    section.updated_at = now.to_string();
    Ok(updated)
}

pub fn remove_section(project: &Project, section_id: &str) -> ServiceResult<Project> {
    let mut updated = project.clone();
    let before = updated.custom_sections.len();
    updated.custom_sections.retain(|s| s.id != section_id);
    if updated.custom_sections.len() == before {
        return Err(ServiceError::NotFound(format!("section {section_id}")));
    }
    Ok(updated)
}
