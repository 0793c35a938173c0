use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::parse_column;
use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, EnumIter, AsRefStr, ToSchema,
)]
pub enum ProjectStatus {
    Planning,
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    #[serde(rename = "On Hold")]
    #[strum(serialize = "On Hold")]
    OnHold,
    Completed,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub employees: Json<Vec<u64>>,
    pub created_by: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Website relaunch")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    /// member employee ids
    pub employees: Vec<u64>,
    pub created_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            status: parse_column(&row.status, "projects.status", row.id)?,
            employees: row.employees.0,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProjectSummaryRow {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Compact projection used by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: u64,
    pub name: String,
    pub status: ProjectStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ProjectSummaryRow> for ProjectSummary {
    type Error = AppError;

    fn try_from(row: ProjectSummaryRow) -> Result<Self, Self::Error> {
        Ok(ProjectSummary {
            id: row.id,
            name: row.name,
            status: parse_column(&row.status, "projects.status", row.id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentProjects {
    pub count: usize,
    pub projects: Vec<ProjectSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total_projects: usize,
    pub active_projects: usize,
    pub recent_quarter_projects: RecentProjects,
}

/// Midnight UTC on Jan 1, Apr 1, Jul 1 or Oct 1 of `now`'s year.
pub fn quarter_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first_month = (now.month0() / 3) * 3 + 1;
    Utc.with_ymd_and_hms(now.year(), first_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

impl ProjectStats {
    pub fn compute(projects: Vec<ProjectSummary>, now: DateTime<Utc>) -> Self {
        let total_projects = projects.len();
        let active_projects = projects
            .iter()
            .filter(|p| p.status == ProjectStatus::InProgress)
            .count();

        let since = quarter_start(now);
        let recent: Vec<ProjectSummary> = projects
            .into_iter()
            .filter(|p| p.created_at >= since)
            .collect();

        ProjectStats {
            total_projects,
            active_projects,
            recent_quarter_projects: RecentProjects {
                count: recent.len(),
                projects: recent,
            },
        }
    }
}
