use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::parse_column;
use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, EnumIter, AsRefStr, ToSchema,
)]
pub enum LeaveType {
    Sick,
    Vacation,
    Personal,
    #[serde(rename = "Maternity/Paternity")]
    #[strum(serialize = "Maternity/Paternity")]
    MaternityPaternity,
    Bereavement,
    Other,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, EnumIter, AsRefStr, ToSchema,
)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// Outcome a reviewer may give a pending request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumString, Display, EnumIter)]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for LeaveStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => LeaveStatus::Approved,
            ReviewDecision::Rejected => LeaveStatus::Rejected,
        }
    }
}

impl LeaveStatus {
    /// Pending is the only state that can be reviewed.
    pub fn review(self, decision: ReviewDecision) -> Result<LeaveStatus, AppError> {
        match self {
            LeaveStatus::Pending => Ok(decision.into()),
            _ => Err(AppError::bad_request(
                "Leave request not found or already processed",
            )),
        }
    }

    /// Pending is the only state that can be cancelled.
    pub fn ensure_cancellable(self) -> Result<(), AppError> {
        match self {
            LeaveStatus::Pending => Ok(()),
            _ => Err(AppError::bad_request(
                "Cannot cancel a processed leave request",
            )),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRow {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: String,
    pub approved_by: Option<u64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    /// user id of the reviewer
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type: parse_column(&row.leave_type, "leaves.leave_type", row.id)?,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            status: parse_column(&row.status, "leaves.status", row.id)?,
            approved_by: row.approved_by,
            reviewed_at: row.reviewed_at,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::enum_values;

    #[test]
    fn pending_can_be_approved_or_rejected() {
        assert_eq!(
            LeaveStatus::Pending.review(ReviewDecision::Approved).unwrap(),
            LeaveStatus::Approved
        );
        assert_eq!(
            LeaveStatus::Pending.review(ReviewDecision::Rejected).unwrap(),
            LeaveStatus::Rejected
        );
    }

    #[test]
    fn processed_leave_cannot_be_reviewed_again() {
        for status in [LeaveStatus::Approved, LeaveStatus::Rejected] {
            assert!(matches!(
                status.review(ReviewDecision::Approved),
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn only_pending_is_cancellable() {
        assert!(LeaveStatus::Pending.ensure_cancellable().is_ok());

        let err = LeaveStatus::Approved.ensure_cancellable().unwrap_err();
        assert_eq!(err.to_string(), "Cannot cancel a processed leave request");
        assert!(LeaveStatus::Rejected.ensure_cancellable().is_err());
    }

    #[test]
    fn pending_is_not_a_review_decision() {
        assert!("Pending".parse::<ReviewDecision>().is_err());
        assert_eq!(enum_values::<ReviewDecision>(), "Approved, Rejected");
    }

    #[test]
    fn leave_type_spelling() {
        assert_eq!(LeaveType::MaternityPaternity.to_string(), "Maternity/Paternity");
        assert_eq!(
            "Maternity/Paternity".parse::<LeaveType>().unwrap(),
            LeaveType::MaternityPaternity
        );
        let json = serde_json::to_string(&LeaveType::MaternityPaternity).unwrap();
        assert_eq!(json, "\"Maternity/Paternity\"");
    }
}
