use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        enum_values,
        employee::{Department, Employee, EmployeeRow, EmployeeStatus, RecentEmployee},
    },
    utils::db_utils::{
        Field, build_update_sql, ensure_enum_field, ensure_field_shape, execute_update,
        page_offset,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const EMPLOYEE_COLUMNS: &str = "id, first_name, last_name, email, phone, department, position, \
     hire_date, status, sick_leave_balance, vacation_leave_balance, personal_leave_balance, \
     created_by, created_at, updated_at";

const EMPLOYEE_FIELDS: &[Field] = &[
    ("firstName", "first_name"),
    ("lastName", "last_name"),
    ("email", "email"),
    ("phone", "phone"),
    ("department", "department"),
    ("position", "position"),
    ("hireDate", "hire_date"),
    ("status", "status"),
];

#[derive(Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployee {
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "+8801712345678")]
    pub phone: Option<String>,
    pub department: Department,
    #[schema(example = "Backend Engineer")]
    pub position: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    pub status: Option<EmployeeStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    /// Page number
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
    /// Filter by department
    pub department: Option<String>,
    /// Filter by status
    pub status: Option<String>,
    /// Search by name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

fn validate_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::bad_request("Invalid email address")),
    }
}

fn parse_filter<T: std::str::FromStr + strum::IntoEnumIterator + std::fmt::Display>(
    raw: Option<&str>,
    name: &str,
) -> AppResult<Option<T>> {
    raw.map(|s| {
        s.parse::<T>().map_err(|_| {
            AppError::bad_request(format!(
                "Invalid {name}. Must be one of: {}.",
                enum_values::<T>()
            ))
        })
    })
    .transpose()
}

async fn fetch_employee(pool: &MySqlPool, employee_id: u64) -> AppResult<Employee> {
    sqlx::query_as::<_, EmployeeRow>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await?
    .map(Employee::try_from)
    .transpose()?
    .ok_or_else(|| AppError::not_found("Employee not found"))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Employee),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Email already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let email = validate_email(&payload.email)?;
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(AppError::bad_request("firstName and lastName are required"));
    }

    let status = payload.status.unwrap_or(EmployeeStatus::Active);

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (first_name, last_name, email, phone, department, position, hire_date, status, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&email)
    .bind(payload.phone.as_deref())
    .bind(payload.department.as_ref())
    .bind(payload.position.trim())
    .bind(payload.hire_date)
    .bind(status.as_ref())
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if AppError::is_duplicate_key(&e) => {
            return Err(AppError::Conflict("Email already in use".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let employee = fetch_employee(pool.get_ref(), result.last_insert_id()).await?;
    info!(employee_id = employee.id, created_by = auth.user_id, "Employee created");

    Ok(HttpResponse::Created().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 400, description = "Unknown department or status filter")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    let department = parse_filter::<Department>(query.department.as_deref(), "department")?;
    let status = parse_filter::<EmployeeStatus>(query.status.as_deref(), "status")?;
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page_offset(page.into(), per_page.into())?;

    let push_filters = |qb: &mut QueryBuilder<'_, MySql>| {
        qb.push(" WHERE 1=1");
        if let Some(department) = department {
            qb.push(" AND department = ").push_bind(department.as_ref().to_string());
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_ref().to_string());
        }
        if let Some(like) = &search {
            qb.push(" AND (first_name LIKE ")
                .push_bind(like.clone())
                .push(" OR last_name LIKE ")
                .push_bind(like.clone())
                .push(" OR email LIKE ")
                .push_bind(like.clone())
                .push(")");
        }
    };

    let mut count_q = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM employees");
    push_filters(&mut count_q);
    let total = count_q
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data_q = QueryBuilder::<MySql>::new(format!("SELECT {EMPLOYEE_COLUMNS} FROM employees"));
    push_filters(&mut data_q);
    data_q
        .push(" ORDER BY id DESC LIMIT ")
        .push_bind(per_page as i64)
        .push(" OFFSET ")
        .push_bind(offset);

    debug!(sql = data_q.sql(), page, per_page, offset, "Fetching employees");

    let data = data_q
        .build_query_as::<EmployeeRow>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(Employee::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "success": false,
            "error": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee = fetch_employee(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated successfully", body = Employee),
        (status = 400, description = "Unknown field or bad value"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Email already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();
    let mut body = body.into_inner();

    ensure_enum_field::<Department>(&body, "department")?;
    ensure_enum_field::<EmployeeStatus>(&body, "status")?;
    ensure_field_shape::<NaiveDate>(&body, "hireDate")?;
    if let Some(raw) = body.get("email") {
        let email = raw
            .as_str()
            .ok_or_else(|| AppError::bad_request("Invalid email address"))
            .and_then(validate_email)?;
        body["email"] = Value::String(email);
    }

    let update = build_update_sql("employees", &body, EMPLOYEE_FIELDS, "id", employee_id)?;

    fetch_employee(pool.get_ref(), employee_id).await?;
    match execute_update(pool.get_ref(), update).await {
        Ok(_) => {}
        Err(e) if AppError::is_duplicate_key(&e) => {
            return Err(AppError::Conflict("Email already in use".into()));
        }
        Err(e) => return Err(e.into()),
    }

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Employee not found"));
    }

    info!(employee_id, by = auth.user_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Employees who joined in the last seven days, newest first.
#[utoipa::path(
    get,
    path = "/api/employees/stats",
    responses((status = 200, description = "Recently joined", body = [RecentEmployee])),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn recent_employees(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let now = Utc::now();

    let rows = sqlx::query_as::<_, EmployeeRow>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE created_at >= ? ORDER BY created_at DESC"
    ))
    .bind(now - Duration::days(7))
    .fetch_all(pool.get_ref())
    .await?;

    let recent: Vec<RecentEmployee> = rows
        .iter()
        .map(|row| RecentEmployee::from_row(row, now))
        .collect();

    Ok(HttpResponse::Ok().json(recent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::role::Role, test_support};
    use actix_web::{http::StatusCode, test as actix_test};

    #[test]
    fn email_is_normalised() {
        assert_eq!(validate_email("  John@Mail.COM ").unwrap(), "john@mail.com");
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("@mail.com").is_err());
    }

    #[actix_web::test]
    async fn last_addressable_page_does_not_overflow() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::get())
            .uri("/api/employees?page=4294967295&perPage=100")
            .insert_header(test_support::bearer(Role::Admin, None))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Database error");
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(
            parse_filter::<Department>(Some("IT"), "department").unwrap(),
            Some(Department::It)
        );
        assert_eq!(parse_filter::<Department>(None, "department").unwrap(), None);
        let err = parse_filter::<EmployeeStatus>(Some("Retired"), "status").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status. Must be one of: Active, On Leave, Terminated."
        );
    }

    #[actix_web::test]
    async fn employees_cannot_create_profiles() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::post())
            .uri("/api/employees")
            .insert_header(test_support::bearer(Role::Employee, Some(3)))
            .set_json(json!({
                "firstName": "Jane",
                "lastName": "Roe",
                "email": "jane@corp.com",
                "department": "IT",
                "position": "QA",
                "hireDate": "2026-02-01"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn unknown_department_is_rejected() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::put())
            .uri("/api/employees/4")
            .insert_header(test_support::bearer(Role::Hr, None))
            .set_json(json!({ "department": "Legal" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(
            body["error"],
            "Invalid department. Must be one of: HR, IT, Finance, Marketing, Operations."
        );
    }

    #[actix_web::test]
    async fn leave_balances_are_not_patchable() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::put())
            .uri("/api/employees/4")
            .insert_header(test_support::bearer(Role::Admin, None))
            .set_json(json!({ "sickLeaveBalance": 99 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_rejects_unknown_status_filter() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::get())
            .uri("/api/employees?status=Retired")
            .insert_header(test_support::bearer(Role::Employee, Some(3)))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
