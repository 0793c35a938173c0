use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::{MySqlPool, types::Json};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::project::{Project, ProjectRow, ProjectStats, ProjectStatus, ProjectSummary, ProjectSummaryRow},
    utils::db_utils::{
        Field, build_update_sql, date_field, ensure_enum_field, ensure_field_shape,
        execute_update, optional_date_field,
    },
};

const PROJECT_COLUMNS: &str =
    "id, name, description, start_date, end_date, status, employees, created_by, created_at, updated_at";

const PROJECT_FIELDS: &[Field] = &[
    ("name", "name"),
    ("description", "description"),
    ("startDate", "start_date"),
    ("endDate", "end_date"),
    ("status", "status"),
    ("employees", "employees"),
];

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    #[schema(example = "Website relaunch")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "2026-04-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub employees: Vec<u64>,
}

async fn fetch_project(pool: &MySqlPool, project_id: u64) -> AppResult<Project> {
    sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .map(Project::try_from)
    .transpose()?
    .ok_or_else(|| AppError::not_found("Project not found"))
}

/// Trimmed name when the patch sets one.
fn patched_name(payload: &Value) -> AppResult<Option<String>> {
    match payload.get("name") {
        None => Ok(None),
        Some(Value::String(name)) if !name.trim().is_empty() => Ok(Some(name.trim().to_string())),
        Some(_) => Err(AppError::bad_request("name is required")),
    }
}

/// Start and end after the patch, falling back to the stored dates it leaves alone.
fn patched_schedule(
    payload: &Value,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> AppResult<(NaiveDate, Option<NaiveDate>)> {
    let start = date_field(payload, "startDate", start_date)?;
    let end = optional_date_field(payload, "endDate", end_date)?;

    if end.is_some_and(|end| end < start) {
        return Err(AppError::bad_request("endDate cannot be before startDate"));
    }
    Ok((start, end))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Bad request"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProject>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    if let Some(end) = payload.end_date {
        if end < payload.start_date {
            return Err(AppError::bad_request("endDate cannot be before startDate"));
        }
    }

    let status = payload.status.unwrap_or(ProjectStatus::Planning);

    let result = sqlx::query(
        r#"
        INSERT INTO projects (name, description, start_date, end_date, status, employees, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(payload.description.as_deref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(status.as_ref())
    .bind(Json(&payload.employees))
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await?;

    let project = fetch_project(pool.get_ref(), result.last_insert_id()).await?;
    tracing::info!(project_id = project.id, created_by = auth.user_id, "Project created");

    Ok(HttpResponse::Created().json(project))
}

#[utoipa::path(
    get,
    path = "/api/projects",
    responses((status = 200, description = "All projects", body = [Project])),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn list_projects(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let projects = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
    ))
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(Project::try_from)
    .collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(projects))
}

#[utoipa::path(
    get,
    path = "/api/projects/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, body = Project),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn get_project(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let project = fetch_project(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[utoipa::path(
    put,
    path = "/api/projects/{project_id}",
    request_body = Object,
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Unknown field, bad value or endDate before startDate"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn update_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    mut body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let project_id = path.into_inner();

    if let Some(name) = patched_name(&body)? {
        body["name"] = Value::String(name);
    }

    ensure_enum_field::<ProjectStatus>(&body, "status")?;
    ensure_field_shape::<Vec<u64>>(&body, "employees")?;
    ensure_field_shape::<NaiveDate>(&body, "startDate")?;
    ensure_field_shape::<Option<NaiveDate>>(&body, "endDate")?;
    let update = build_update_sql("projects", &body, PROJECT_FIELDS, "id", project_id)?;

    // existence check first: an UPDATE that changes nothing reports 0 rows on MySQL
    let current = fetch_project(pool.get_ref(), project_id).await?;
    patched_schedule(&body, current.start_date, current.end_date)?;
    execute_update(pool.get_ref(), update).await?;

    let project = fetch_project(pool.get_ref(), project_id).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted", body = Object, example = json!({
            "message": "Project deleted"
        })),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn delete_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let project_id = path.into_inner();
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Project not found"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Project deleted" })))
}

/// Totals, active count and the projects created so far this quarter.
#[utoipa::path(
    get,
    path = "/api/projects/stats",
    responses((status = 200, body = ProjectStats)),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn project_stats(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let projects = sqlx::query_as::<_, ProjectSummaryRow>(
        "SELECT id, name, status, created_at FROM projects ORDER BY created_at DESC",
    )
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(ProjectSummary::try_from)
    .collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(ProjectStats::compute(projects, Utc::now())))
}
