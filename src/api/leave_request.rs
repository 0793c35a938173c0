use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        enum_values,
        leave_request::{LeaveRequest, LeaveRow, LeaveStatus, LeaveType, ReviewDecision},
    },
    utils::db_utils::{
        Field, build_update_sql, date_field, ensure_enum_field, execute_update, page_offset,
    },
};

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, reason, status, \
     approved_by, reviewed_at, notes, created_at, updated_at";

/// Fields an existing request may change through `PUT /leaves/{id}`.
const LEAVE_FIELDS: &[Field] = &[
    ("leaveType", "leave_type"),
    ("startDate", "start_date"),
    ("endDate", "end_date"),
    ("reason", "reason"),
];

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    /// Defaults to the caller's own employee profile
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Flu")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewLeave {
    /// `Approved` or `Rejected`
    #[schema(example = "Approved")]
    pub status: Option<String>,
    #[schema(example = "Enjoy the break")]
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveFilter {
    /// Filter by employee ID
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "Pending")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u64>,
    #[schema(example = 10)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> AppResult<LeaveRequest> {
    sqlx::query_as::<_, LeaveRow>(&format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ?"))
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .map(LeaveRequest::try_from)
        .transpose()?
        .ok_or_else(|| AppError::not_found("Leave not found"))
}

fn ensure_date_order(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::bad_request("startDate cannot be after endDate"));
    }
    Ok(())
}

/// Storage the review and cancel flows run against.
pub(crate) trait LeaveStore {
    async fn find(&self, leave_id: u64) -> AppResult<LeaveRequest>;

    /// Rows deleted; 0 when the request is no longer pending.
    async fn delete_pending(&self, leave_id: u64) -> AppResult<u64>;

    /// Rows updated; 0 when another reviewer got there first.
    async fn review_pending(
        &self,
        leave_id: u64,
        next: LeaveStatus,
        reviewer: u64,
        notes: Option<&str>,
    ) -> AppResult<u64>;
}

impl LeaveStore for MySqlPool {
    async fn find(&self, leave_id: u64) -> AppResult<LeaveRequest> {
        fetch_leave(self, leave_id).await
    }

    async fn delete_pending(&self, leave_id: u64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM leaves WHERE id = ? AND status = ?")
            .bind(leave_id)
            .bind(LeaveStatus::Pending.as_ref())
            .execute(self)
            .await?;
        Ok(result.rows_affected())
    }

    async fn review_pending(
        &self,
        leave_id: u64,
        next: LeaveStatus,
        reviewer: u64,
        notes: Option<&str>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE leaves
            SET status = ?, approved_by = ?, reviewed_at = ?, notes = COALESCE(?, notes)
            WHERE id = ?
            AND status = ?
            "#,
        )
        .bind(next.as_ref())
        .bind(reviewer)
        .bind(Utc::now())
        .bind(notes)
        .bind(leave_id)
        .bind(LeaveStatus::Pending.as_ref())
        .execute(self)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Moves a pending request to the reviewer's decision and returns the stored result.
pub(crate) async fn review_request<S: LeaveStore>(
    store: &S,
    reviewer: u64,
    leave_id: u64,
    decision: ReviewDecision,
    notes: Option<&str>,
) -> AppResult<LeaveRequest> {
    let current = store.find(leave_id).await?;
    let next = current.status.review(decision)?;

    // lost a race with another reviewer
    if store.review_pending(leave_id, next, reviewer, notes).await? == 0 {
        return Err(AppError::bad_request(
            "Leave request not found or already processed",
        ));
    }

    tracing::info!(leave_id, status = %next, by = reviewer, "Leave reviewed");
    store.find(leave_id).await
}

/// Deletes a request its owner (or a manager) withdraws while it is pending.
pub(crate) async fn cancel_request<S: LeaveStore>(
    store: &S,
    auth: &AuthUser,
    leave_id: u64,
) -> AppResult<()> {
    let current = store.find(leave_id).await?;

    auth.require_self_or_manager(current.employee_id)?;
    current.status.ensure_cancellable()?;

    if store.delete_pending(leave_id).await? == 0 {
        return Err(AppError::bad_request(
            "Cannot cancel a processed leave request",
        ));
    }

    tracing::info!(leave_id, by = auth.user_id, "Leave cancelled");
    Ok(())
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body = CreateLeave,
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Filing for someone else without HR/Admin role")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> AppResult<HttpResponse> {
    let employee_id = match payload.employee_id {
        Some(id) => {
            auth.require_self_or_manager(id)?;
            id
        }
        None => auth.require_employee_id()?,
    };

    ensure_date_order(payload.start_date, payload.end_date)?;

    let result = sqlx::query(
        r#"
        INSERT INTO leaves (employee_id, leave_type, start_date, end_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.reason.as_deref().map(str::trim))
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    let leave = fetch_leave(pool.get_ref(), result.last_insert_id()).await?;
    tracing::info!(leave_id = leave.id, employee_id, "Leave request submitted");

    Ok(HttpResponse::Created().json(leave))
}

/* =========================
Review leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}/approve",
    request_body = ReviewLeave,
    params(("leave_id" = u64, Path, description = "ID of the leave request to review")),
    responses(
        (status = 200, description = "Leave reviewed", body = LeaveRequest),
        (status = 400, description = "Invalid status or already processed", body = Object, example = json!({
            "success": false,
            "error": "Invalid status"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<ReviewLeave>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let decision = body
        .status
        .as_deref()
        .and_then(|s| s.parse::<ReviewDecision>().ok())
        .ok_or_else(|| AppError::bad_request("Invalid status"))?;

    let notes = body
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let leave = review_request(
        pool.get_ref(),
        auth.user_id,
        path.into_inner(),
        decision,
        notes,
    )
    .await?;

    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Cancel leave (owner or HR/Admin, pending only)
========================= */
#[utoipa::path(
    delete,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to cancel")),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave request cancelled successfully"
        })),
        (status = 400, description = "Leave already processed", body = Object, example = json!({
            "success": false,
            "error": "Cannot cancel a processed leave request"
        })),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    cancel_request(pool.get_ref(), &auth, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request cancelled successfully"
    })))
}

/* =========================
Edit leave request
========================= */
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}",
    request_body = Object,
    params(("leave_id" = u64, Path, description = "ID of the leave request to edit")),
    responses(
        (status = 200, description = "Leave updated", body = LeaveRequest),
        (status = 400, description = "Unknown field, bad value, or leave already processed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    let leave_id = path.into_inner();

    ensure_enum_field::<LeaveType>(&body, "leaveType")?;
    let update = build_update_sql("leaves", &body, LEAVE_FIELDS, "id", leave_id)?;

    let current = fetch_leave(pool.get_ref(), leave_id).await?;
    auth.require_self_or_manager(current.employee_id)?;

    // owners may only edit while the request is still open
    if !auth.role.is_manager() && current.status != LeaveStatus::Pending {
        return Err(AppError::bad_request("Cannot edit a processed leave request"));
    }

    let start = date_field(&body, "startDate", current.start_date)?;
    let end = date_field(&body, "endDate", current.end_date)?;
    ensure_date_order(start, end)?;

    execute_update(pool.get_ref(), update).await?;

    let leave = fetch_leave(pool.get_ref(), leave_id).await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_manager(leave.employee_id)?;

    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/leaves/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Leaves of one employee, newest first", body = [LeaveRequest]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn employee_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    auth.require_self_or_manager(employee_id)?;

    let leaves = sqlx::query_as::<_, LeaveRow>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leaves WHERE employee_id = ? ORDER BY created_at DESC"
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(LeaveRequest::try_from)
    .collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(leaves))
}

/// Managers see every request; everyone else only their own.
#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> AppResult<HttpResponse> {
    let employee_id = if auth.role.is_manager() {
        query.employee_id
    } else {
        Some(auth.require_employee_id()?)
    };

    let status = match query.status.as_deref() {
        Some(raw) => Some(raw.parse::<LeaveStatus>().map_err(|_| {
            AppError::bad_request(format!(
                "Invalid status. Must be one of: {}.",
                enum_values::<LeaveStatus>()
            ))
        })?),
        None => None,
    };

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = page_offset(page, per_page)?;

    let push_filters = |qb: &mut QueryBuilder<'_, MySql>| {
        qb.push(" WHERE 1=1");
        if let Some(id) = employee_id {
            qb.push(" AND employee_id = ").push_bind(id);
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_ref().to_string());
        }
    };

    let mut count_q = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM leaves");
    push_filters(&mut count_q);
    let total = count_q
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data_q = QueryBuilder::<MySql>::new(format!("SELECT {LEAVE_COLUMNS} FROM leaves"));
    push_filters(&mut data_q);
    data_q
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);

    let data = data_q
        .build_query_as::<LeaveRow>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
