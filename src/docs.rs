use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse, ReviewLeave};
use crate::api::payroll::{
    CreatePayroll, PaginatedPayrollResponse, PayrollEnvelope, PayrollQuery, UpdatePayroll,
    UpdatePayrollStatus,
};
use crate::api::project::CreateProject;
use crate::model::attendance::{Attendance, AttendanceEntry};
use crate::model::employee::{Department, Employee, EmployeeStatus, LeaveBalances, RecentEmployee};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::{LineItem, PayPeriod, Payroll, PayrollStatus};
use crate::model::project::{Project, ProjectStats, ProjectStatus, ProjectSummary, RecentProjects};
use crate::models::{AssignUserReq, LoginReqDto, RegisterReq, TokenPair};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Employee Management API",
        version = "1.0.0",
        description = r#"
## Employee Management System

JSON API for the day-to-day records of a small organisation.

### Key Features
- **Employees**: directory with departments, status and leave balances
- **Payroll**: net pay computed from salary, allowances and deductions, with a
  Pending / Approved / Paid / Rejected workflow
- **Leave**: requests reviewed by HR or Admin, cancellable while pending
- **Projects**: membership, status and quarterly statistics
- **Attendance**: clock in / clock out and history

### Security
Everything under `/api` requires a **JWT Bearer** access token from
`/auth/login`. HR and Admin roles manage payroll, leave reviews and the
directory.

### Response Format
Errors are `{"success": false, "error": "..."}`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::handlers::assign_user,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::recent_employees,

        crate::api::payroll::create_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,
        crate::api::payroll::employee_payrolls,
        crate::api::payroll::update_payroll,
        crate::api::payroll::update_payroll_status,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::employee_leaves,
        crate::api::leave_request::update_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::approve_leave,

        crate::api::project::create_project,
        crate::api::project::list_projects,
        crate::api::project::get_project,
        crate::api::project::update_project,
        crate::api::project::delete_project,
        crate::api::project::project_stats,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::attendance_status,
        crate::api::attendance::attendance_history,
        crate::api::attendance::attendance_report
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            AssignUserReq,
            TokenPair,
            CreateEmployee,
            Employee,
            EmployeeListResponse,
            Department,
            EmployeeStatus,
            LeaveBalances,
            RecentEmployee,
            CreatePayroll,
            UpdatePayroll,
            UpdatePayrollStatus,
            Payroll,
            PayrollStatus,
            PayPeriod,
            LineItem,
            PayrollEnvelope,
            PaginatedPayrollResponse,
            PayrollQuery,
            CreateLeave,
            ReviewLeave,
            LeaveRequest,
            LeaveStatus,
            LeaveType,
            LeaveFilter,
            LeaveListResponse,
            CreateProject,
            Project,
            ProjectStatus,
            ProjectStats,
            ProjectSummary,
            RecentProjects,
            Attendance,
            AttendanceEntry
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication and user roles"),
        (name = "Employee", description = "Employee directory APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Project", description = "Project management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/auth/login",
            "/api/employees/stats",
            "/api/payrolls/{payroll_id}/status",
            "/api/leaves/{leave_id}/approve",
            "/api/projects/stats",
            "/api/attendance/report",
        ] {
            assert!(paths.contains_key(path), "{path} missing from OpenAPI");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
