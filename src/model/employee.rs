use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::parse_column;
use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, EnumIter, AsRefStr, ToSchema,
)]
pub enum Department {
    #[serde(rename = "HR")]
    #[strum(serialize = "HR")]
    Hr,
    #[serde(rename = "IT")]
    #[strum(serialize = "IT")]
    It,
    Finance,
    Marketing,
    Operations,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, EnumIter, AsRefStr, ToSchema,
)]
pub enum EmployeeStatus {
    Active,
    #[serde(rename = "On Leave")]
    #[strum(serialize = "On Leave")]
    OnLeave,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaveBalances {
    #[schema(example = 10)]
    pub sick: i32,
    #[schema(example = 15)]
    pub vacation: i32,
    #[schema(example = 5)]
    pub personal: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct EmployeeRow {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    pub position: String,
    pub hire_date: NaiveDate,
    pub status: String,
    pub sick_leave_balance: i32,
    pub vacation_leave_balance: i32,
    pub personal_leave_balance: i32,
    pub created_by: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": 1,
        "firstName": "John",
        "lastName": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department": "IT",
        "position": "Backend Engineer",
        "hireDate": "2024-01-01",
        "status": "Active",
        "leaveBalances": { "sick": 10, "vacation": 15, "personal": 5 },
        "createdBy": 1,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
)]
pub struct Employee {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Department,
    pub position: String,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
    pub leave_balances: LeaveBalances,
    pub created_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = AppError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            department: parse_column(&row.department, "employees.department", row.id)?,
            position: row.position,
            hire_date: row.hire_date,
            status: parse_column(&row.status, "employees.status", row.id)?,
            leave_balances: LeaveBalances {
                sick: row.sick_leave_balance,
                vacation: row.vacation_leave_balance,
                personal: row.personal_leave_balance,
            },
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Entry of the "recently joined" feed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecentEmployee {
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "Backend Engineer")]
    pub role: String,
    #[schema(example = "2 days ago")]
    pub joined: String,
}

impl RecentEmployee {
    pub fn from_row(row: &EmployeeRow, now: DateTime<Utc>) -> Self {
        RecentEmployee {
            name: format!("{} {}", row.first_name, row.last_name),
            role: row.position.clone(),
            joined: format_join_date(row.created_at, now),
        }
    }
}

pub fn format_join_date(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - created_at).num_days();
    match days {
        d if d <= 0 => "Today".to_string(),
        1 => "1 day ago".to_string(),
        d if d < 7 => format!("{d} days ago"),
        d if d < 14 => "1 week ago".to_string(),
        d => format!("{} weeks ago", d / 7),
    }
}
