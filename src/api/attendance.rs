use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::attendance::{Attendance, AttendanceEntry},
};
use actix_web::{HttpResponse, web};
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use utoipa::IntoParams;

const HISTORY_LIMIT: i64 = 30;
const REPORT_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ClockNote {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceRange {
    /// Inclusive, `YYYY-MM-DD`
    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    /// Inclusive, `YYYY-MM-DD`
    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    /// Report only
    pub employee_id: Option<u64>,
}

impl AttendanceRange {
    fn push_filters(&self, qb: &mut QueryBuilder<'_, MySql>) -> AppResult<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(AppError::bad_request("startDate cannot be after endDate"));
            }
        }
        if let Some(start) = self.start_date {
            qb.push(" AND clock_in >= ").push_bind(start);
        }
        if let Some(end) = self.end_date {
            // whole end day
            let next = end
                .checked_add_days(Days::new(1))
                .ok_or_else(|| AppError::bad_request("endDate out of range"))?;
            qb.push(" AND clock_in < ").push_bind(next);
        }
        Ok(())
    }
}

async fn open_record(pool: &MySqlPool, employee_id: u64) -> AppResult<Option<Attendance>> {
    let record = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, employee_id, clock_in, clock_out, notes
        FROM attendance
        WHERE employee_id = ? AND clock_out IS NULL
        ORDER BY clock_in DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

async fn fetch_record(pool: &MySqlPool, id: u64) -> AppResult<Attendance> {
    sqlx::query_as::<_, Attendance>(
        "SELECT id, employee_id, clock_in, clock_out, notes FROM attendance WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Attendance record not found"))
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    responses(
        (status = 201, description = "Clocked in", body = AttendanceEntry),
        (status = 400, description = "Already clocked in", body = Object, example = json!({
            "success": false,
            "error": "Already clocked in"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: Option<web::Json<ClockNote>>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee_id()?;

    if open_record(pool.get_ref(), employee_id).await?.is_some() {
        return Err(AppError::bad_request("Already clocked in"));
    }

    let notes = body.and_then(|b| b.into_inner().notes);
    let result = sqlx::query(
        "INSERT INTO attendance (employee_id, clock_in, notes) VALUES (?, UTC_TIMESTAMP(), ?)",
    )
    .bind(employee_id)
    .bind(notes)
    .execute(pool.get_ref())
    .await?;

    let record = fetch_record(pool.get_ref(), result.last_insert_id()).await?;
    tracing::info!(employee_id, attendance_id = record.id, "Clocked in");

    Ok(HttpResponse::Created().json(AttendanceEntry::from(record)))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    responses(
        (status = 200, description = "Clocked out", body = AttendanceEntry),
        (status = 400, description = "No active clock-in found", body = Object, example = json!({
            "success": false,
            "error": "No active clock-in found"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: Option<web::Json<ClockNote>>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee_id()?;

    let open = open_record(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::bad_request("No active clock-in found"))?;

    let notes = body.and_then(|b| b.into_inner().notes);
    sqlx::query(
        r#"
        UPDATE attendance
        SET clock_out = UTC_TIMESTAMP(), notes = COALESCE(?, notes)
        WHERE id = ? AND clock_out IS NULL
        "#,
    )
    .bind(notes)
    .bind(open.id)
    .execute(pool.get_ref())
    .await?;

    let record = fetch_record(pool.get_ref(), open.id).await?;
    tracing::info!(employee_id, attendance_id = record.id, "Clocked out");

    Ok(HttpResponse::Ok().json(AttendanceEntry::from(record)))
}

#[utoipa::path(
    get,
    path = "/api/attendance/status",
    responses(
        (status = 200, body = Object, example = json!({ "clockedIn": true })),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee_id()?;
    let open = open_record(pool.get_ref(), employee_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "clockedIn": open.is_some(),
        "record": open.map(AttendanceEntry::from),
    })))
}

/// The caller's own records, newest first.
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(AttendanceRange),
    responses(
        (status = 200, body = [AttendanceEntry]),
        (status = 400, description = "Bad date range"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    range: web::Query<AttendanceRange>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee_id()?;

    let mut qb = QueryBuilder::<MySql>::new(
        "SELECT id, employee_id, clock_in, clock_out, notes FROM attendance WHERE employee_id = ",
    );
    qb.push_bind(employee_id);
    range.push_filters(&mut qb)?;
    qb.push(" ORDER BY clock_in DESC LIMIT ").push_bind(HISTORY_LIMIT);

    let entries: Vec<AttendanceEntry> = qb
        .build_query_as::<Attendance>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(AttendanceEntry::from)
        .collect();

    Ok(HttpResponse::Ok().json(entries))
}

/// Attendance across employees (HR/Admin).
#[utoipa::path(
    get,
    path = "/api/attendance/report",
    params(AttendanceRange),
    responses(
        (status = 200, body = [AttendanceEntry]),
        (status = 400, description = "Bad date range"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    range: web::Query<AttendanceRange>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let mut qb = QueryBuilder::<MySql>::new(
        "SELECT id, employee_id, clock_in, clock_out, notes FROM attendance WHERE 1=1",
    );
    if let Some(employee_id) = range.employee_id {
        qb.push(" AND employee_id = ").push_bind(employee_id);
    }
    range.push_filters(&mut qb)?;
    qb.push(" ORDER BY clock_in DESC LIMIT ").push_bind(REPORT_LIMIT);

    let entries: Vec<AttendanceEntry> = qb
        .build_query_as::<Attendance>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(AttendanceEntry::from)
        .collect();

    Ok(HttpResponse::Ok().json(entries))
}
