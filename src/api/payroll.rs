use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder, types::Json};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        enum_values,
        payroll::{LineItem, PayPeriod, Payroll, PayrollRow, PayrollStatus, net_pay},
    },
    utils::db_utils::page_offset,
};

const PAYROLL_COLUMNS: &str = "id, employee_id, pay_period_start, pay_period_end, basic_salary, \
     allowances, deductions, net_pay, status, payment_date, created_at";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,

    pub pay_period: PayPeriod,

    #[schema(example = 5000.0)]
    pub basic_salary: f64,

    #[serde(default)]
    pub allowances: Vec<LineItem>,

    #[serde(default)]
    pub deductions: Vec<LineItem>,
}

/// Partial replace of a payroll's inputs. `netPay` is computed once, at
/// creation, and is left as stored. Any other key is rejected.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePayroll {
    pub pay_period: Option<PayPeriod>,

    #[schema(example = 5200.0)]
    pub basic_salary: Option<f64>,

    pub allowances: Option<Vec<LineItem>>,

    pub deductions: Option<Vec<LineItem>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayrollStatus {
    #[schema(example = "Paid")]
    pub status: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 1001)]
    pub employee_id: Option<u64>,

    #[schema(example = "Pending")]
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PayrollEnvelope {
    pub success: bool,
    pub data: Payroll,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedPayrollResponse {
    pub success: bool,
    pub data: Vec<Payroll>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl UpdatePayroll {
    fn is_empty(&self) -> bool {
        self.pay_period.is_none()
            && self.basic_salary.is_none()
            && self.allowances.is_none()
            && self.deductions.is_none()
    }

    /// `current` with the supplied inputs swapped in; status and net pay stay as stored.
    fn apply_to(self, mut current: Payroll) -> Payroll {
        if let Some(period) = self.pay_period {
            current.pay_period = period;
        }
        if let Some(salary) = self.basic_salary {
            current.basic_salary = salary;
        }
        if let Some(allowances) = self.allowances {
            current.allowances = allowances;
        }
        if let Some(deductions) = self.deductions {
            current.deductions = deductions;
        }
        current
    }
}

fn envelope(payroll: Payroll) -> serde_json::Value {
    json!({ "success": true, "data": payroll })
}

async fn fetch_payroll(pool: &MySqlPool, payroll_id: u64) -> AppResult<Option<Payroll>> {
    let row = sqlx::query_as::<_, PayrollRow>(&format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE id = ?"
    ))
    .bind(payroll_id)
    .fetch_optional(pool)
    .await?;

    row.map(Payroll::try_from).transpose()
}

async fn require_payroll(pool: &MySqlPool, payroll_id: u64) -> AppResult<Payroll> {
    fetch_payroll(pool, payroll_id)
        .await?
        .ok_or_else(|| AppError::not_found("Payroll not found."))
}

fn parse_status(raw: Option<&str>) -> AppResult<PayrollStatus> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("Payroll ID and status are required."))?;

    raw.parse::<PayrollStatus>().map_err(|_| {
        AppError::bad_request(format!(
            "Invalid status. Must be one of: {}.",
            enum_values::<PayrollStatus>()
        ))
    })
}

#[utoipa::path(
    post,
    path = "/api/payrolls",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created", body = PayrollEnvelope),
        (status = 400, description = "Invalid pay period"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    if !payload.pay_period.is_ordered() {
        return Err(AppError::bad_request(
            "payPeriod.startDate cannot be after payPeriod.endDate",
        ));
    }

    let net = net_pay(payload.basic_salary, &payload.allowances, &payload.deductions);

    let result = sqlx::query(
        r#"
        INSERT INTO payrolls
        (employee_id, pay_period_start, pay_period_end, basic_salary, allowances, deductions, net_pay, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.pay_period.start_date)
    .bind(payload.pay_period.end_date)
    .bind(payload.basic_salary)
    .bind(Json(&payload.allowances))
    .bind(Json(&payload.deductions))
    .bind(net)
    .bind(PayrollStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    let payroll_id = result.last_insert_id();
    tracing::info!(payroll_id, employee_id = payload.employee_id, net_pay = net, "Payroll created");

    let payroll = require_payroll(pool.get_ref(), payroll_id).await?;
    Ok(HttpResponse::Created().json(envelope(payroll)))
}

#[utoipa::path(
    get,
    path = "/api/payrolls",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse),
        (status = 400, description = "Unknown status filter")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let status = query
        .status
        .as_deref()
        .map(|s| parse_status(Some(s)))
        .transpose()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = page_offset(page.into(), per_page.into())?;

    let push_filters = |qb: &mut QueryBuilder<'_, MySql>| {
        qb.push(" WHERE 1=1");
        if let Some(employee_id) = query.employee_id {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_ref().to_string());
        }
    };

    let mut count_q = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM payrolls");
    push_filters(&mut count_q);
    let total = count_q
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data_q = QueryBuilder::<MySql>::new(format!("SELECT {PAYROLL_COLUMNS} FROM payrolls"));
    push_filters(&mut data_q);
    data_q
        .push(" ORDER BY pay_period_start DESC, id DESC LIMIT ")
        .push_bind(per_page as i64)
        .push(" OFFSET ")
        .push_bind(offset);

    let data = data_q
        .build_query_as::<PayrollRow>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(Payroll::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        success: true,
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payrolls/{payroll_id}",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, body = PayrollEnvelope),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let payroll = require_payroll(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_manager(payroll.employee_id)?;

    Ok(HttpResponse::Ok().json(envelope(payroll)))
}

#[utoipa::path(
    get,
    path = "/api/payrolls/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Payrolls of one employee, newest period first"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn employee_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    auth.require_self_or_manager(employee_id)?;

    let data = sqlx::query_as::<_, PayrollRow>(&format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE employee_id = ? ORDER BY pay_period_start DESC"
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(Payroll::try_from)
    .collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

#[utoipa::path(
    put,
    path = "/api/payrolls/{payroll_id}",
    request_body = UpdatePayroll,
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll updated, netPay unchanged", body = PayrollEnvelope),
        (status = 400, description = "Empty body, unknown field or invalid pay period"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdatePayroll>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    if body.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }
    if let Some(period) = &body.pay_period {
        if !period.is_ordered() {
            return Err(AppError::bad_request(
                "payPeriod.startDate cannot be after payPeriod.endDate",
            ));
        }
    }

    let payroll_id = path.into_inner();
    let body = body.into_inner();
    let current = require_payroll(pool.get_ref(), payroll_id).await?;
    let updated = body.apply_to(current);

    sqlx::query(
        r#"
        UPDATE payrolls
        SET pay_period_start = ?, pay_period_end = ?, basic_salary = ?, allowances = ?, deductions = ?
        WHERE id = ?
        "#,
    )
    .bind(updated.pay_period.start_date)
    .bind(updated.pay_period.end_date)
    .bind(updated.basic_salary)
    .bind(Json(&updated.allowances))
    .bind(Json(&updated.deductions))
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await?;

    let payroll = require_payroll(pool.get_ref(), payroll_id).await?;
    Ok(HttpResponse::Ok().json(envelope(payroll)))
}

#[utoipa::path(
    put,
    path = "/api/payrolls/{payroll_id}/status",
    request_body = UpdatePayrollStatus,
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Status updated", body = PayrollEnvelope),
        (status = 400, description = "Missing or invalid status", body = Object, example = json!({
            "success": false,
            "error": "Invalid status. Must be one of: Pending, Approved, Paid, Rejected."
        })),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdatePayrollStatus>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let status = parse_status(body.status.as_deref())?;
    let payroll_id = path.into_inner();
    let current = require_payroll(pool.get_ref(), payroll_id).await?;

    let payment_date = status.payment_date_on_entry(current.payment_date, Utc::now());

    sqlx::query("UPDATE payrolls SET status = ?, payment_date = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(payment_date)
        .bind(payroll_id)
        .execute(pool.get_ref())
        .await?;

    tracing::info!(
        payroll_id,
        from = %current.status,
        to = %status,
        by = auth.user_id,
        "Payroll status changed"
    );

    let payroll = require_payroll(pool.get_ref(), payroll_id).await?;
    Ok(HttpResponse::Ok().json(envelope(payroll)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::role::Role, test_support};
    use actix_web::{http::StatusCode, test as actix_test};

    #[test]
    fn status_is_required() {
        let err = parse_status(None).unwrap_err();
        assert_eq!(err.to_string(), "Payroll ID and status are required.");
        assert!(parse_status(Some("  ")).is_err());
    }

    #[test]
    fn status_must_be_known() {
        let err = parse_status(Some("Cancelled")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status. Must be one of: Pending, Approved, Paid, Rejected."
        );
        assert_eq!(parse_status(Some("Approved")).unwrap(), PayrollStatus::Approved);
    }

    fn stored_payroll() -> Payroll {
        let allowances = vec![LineItem { name: "Transport".into(), amount: 500.0 }];
        let deductions = vec![LineItem { name: "Tax".into(), amount: 100.0 }];
        Payroll {
            id: 7,
            employee_id: 3,
            pay_period: PayPeriod {
                start_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            },
            basic_salary: 5000.0,
            net_pay: net_pay(5000.0, &allowances, &deductions),
            allowances,
            deductions,
            status: PayrollStatus::Approved,
            payment_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn update_keeps_net_pay_and_status() {
        let update: UpdatePayroll =
            serde_json::from_value(json!({ "basicSalary": 6000.0, "deductions": [] })).unwrap();

        let updated = update.apply_to(stored_payroll());

        assert_eq!(updated.basic_salary, 6000.0);
        assert!(updated.deductions.is_empty());
        assert_eq!(updated.allowances.len(), 1);
        assert_eq!(updated.net_pay, 5400.0);
        assert_eq!(updated.status, PayrollStatus::Approved);
    }

    #[test]
    fn update_rejects_derived_and_unknown_keys() {
        for body in [
            json!({ "netPay": 1.0 }),
            json!({ "status": "Paid" }),
            json!({ "basicSalary": 1.0, "paymentDate": "2026-01-31" }),
        ] {
            assert!(serde_json::from_value::<UpdatePayroll>(body).is_err());
        }
        let empty: UpdatePayroll = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());
    }

    #[actix_web::test]
    async fn update_without_inputs_is_bad_request() {
        let app = actix_test::init_service(test_support::app()).await;

        for (body, error) in [
            (json!({}), Some("No fields provided for update")),
            (json!({ "netPay": 1.0 }), None),
            (json!({ "status": "Paid" }), None),
        ] {
            let req = test_support::request(actix_test::TestRequest::put())
                .uri("/api/payrolls/7")
                .insert_header(test_support::bearer(Role::Hr, None))
                .set_json(&body)
                .to_request();
            let resp = actix_test::call_service(&app, req).await;

            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
            let json: serde_json::Value = actix_test::read_body_json(resp).await;
            assert_eq!(json["success"], false);
            if let Some(error) = error {
                assert_eq!(json["error"], error);
            }
        }
    }

    #[actix_web::test]
    async fn last_addressable_page_does_not_overflow() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::get())
            .uri("/api/payrolls?page=4294967295&perPage=100")
            .insert_header(test_support::bearer(Role::Hr, None))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        // offset is computed, then the unreachable store answers
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Database error");
    }

    #[actix_web::test]
    async fn invalid_status_is_rejected_before_touching_the_store() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::put())
            .uri("/api/payrolls/7/status")
            .insert_header(test_support::bearer(Role::Hr, None))
            .set_json(json!({ "status": "Cancelled" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "Invalid status. Must be one of: Pending, Approved, Paid, Rejected."
        );
    }

    #[actix_web::test]
    async fn missing_status_is_bad_request() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::put())
            .uri("/api/payrolls/7/status")
            .insert_header(test_support::bearer(Role::Admin, None))
            .set_json(json!({}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_create_payrolls() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::post())
            .uri("/api/payrolls")
            .insert_header(test_support::bearer(Role::Employee, Some(3)))
            .set_json(json!({
                "employeeId": 3,
                "payPeriod": { "startDate": "2026-01-01", "endDate": "2026-01-31" },
                "basicSalary": 5000.0
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn reversed_pay_period_is_bad_request() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::post())
            .uri("/api/payrolls")
            .insert_header(test_support::bearer(Role::Hr, None))
            .set_json(json!({
                "employeeId": 3,
                "payPeriod": { "startDate": "2026-02-01", "endDate": "2026-01-31" },
                "basicSalary": 5000.0,
                "allowances": [{ "name": "Transport", "amount": 500.0 }],
                "deductions": []
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn malformed_body_gets_json_error() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::post())
            .uri("/api/payrolls")
            .insert_header(test_support::bearer(Role::Hr, None))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{ not json")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn unreachable_store_is_internal_error() {
        let app = actix_test::init_service(test_support::app()).await;

        let req = test_support::request(actix_test::TestRequest::get())
            .uri("/api/payrolls/7")
            .insert_header(test_support::bearer(Role::Hr, None))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Database error");
    }
}
