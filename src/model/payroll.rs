use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::parse_column;
use crate::error::AppError;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
pub enum PayrollStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl PayrollStatus {
    /// Payment date a record carries after entering `self`.
    ///
    /// `Paid` always stamps `now`, even when the record was already paid;
    /// every other status keeps whatever date was there.
    pub fn payment_date_on_entry(
        self,
        current: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            PayrollStatus::Paid => Some(now),
            _ => current,
        }
    }
}

/// One named allowance or deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    #[serde(default)]
    #[schema(example = "Transport")]
    pub name: String,
    #[schema(example = 500.0)]
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayPeriod {
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-31", value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

impl PayPeriod {
    pub fn is_ordered(&self) -> bool {
        self.start_date <= self.end_date
    }
}

/// `basic + Σallowances − Σdeductions`, no rounding and no floor at zero.
pub fn net_pay(basic_salary: f64, allowances: &[LineItem], deductions: &[LineItem]) -> f64 {
    let total_allowances: f64 = allowances.iter().map(|a| a.amount).sum();
    let total_deductions: f64 = deductions.iter().map(|d| d.amount).sum();
    basic_salary + total_allowances - total_deductions
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollRow {
    pub id: u64,
    pub employee_id: u64,
    pub pay_period_start: NaiveDate,
    pub pay_period_end: NaiveDate,
    pub basic_salary: f64,
    pub allowances: Json<Vec<LineItem>>,
    pub deductions: Json<Vec<LineItem>>,
    pub net_pay: f64,
    pub status: String,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payroll {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    pub pay_period: PayPeriod,
    #[schema(example = 5000.0)]
    pub basic_salary: f64,
    pub allowances: Vec<LineItem>,
    pub deductions: Vec<LineItem>,
    #[schema(example = 5400.0)]
    pub net_pay: f64,
    pub status: PayrollStatus,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub payment_date: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PayrollRow> for Payroll {
    type Error = AppError;

    fn try_from(row: PayrollRow) -> Result<Self, Self::Error> {
        Ok(Payroll {
            id: row.id,
            employee_id: row.employee_id,
            pay_period: PayPeriod {
                start_date: row.pay_period_start,
                end_date: row.pay_period_end,
            },
            basic_salary: row.basic_salary,
            allowances: row.allowances.0,
            deductions: row.deductions.0,
            net_pay: row.net_pay,
            status: parse_column(&row.status, "payrolls.status", row.id)?,
            payment_date: row.payment_date,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::enum_values;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn item(amount: f64) -> LineItem {
        LineItem {
            name: String::new(),
            amount,
        }
    }

    #[test]
    fn net_pay_example() {
        let allowances = vec![item(500.0), item(200.0)];
        let deductions = vec![item(300.0)];
        assert_eq!(net_pay(5000.0, &allowances, &deductions), 5400.0);
    }

    #[test]
    fn net_pay_without_line_items_is_basic() {
        assert_eq!(net_pay(3200.5, &[], &[]), 3200.5);
    }

    #[test]
    fn net_pay_may_go_negative() {
        assert_eq!(net_pay(100.0, &[], &[item(250.0)]), -150.0);
    }

    #[test]
    fn paid_stamps_payment_date() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 3, 12, 0, 0).unwrap();

        assert_eq!(PayrollStatus::Paid.payment_date_on_entry(None, now), Some(now));
        // paying twice refreshes the stamp
        assert_eq!(
            PayrollStatus::Paid.payment_date_on_entry(Some(earlier), now),
            Some(now)
        );
    }

    #[test]
    fn other_statuses_keep_payment_date() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 3, 12, 0, 0).unwrap();

        for status in [
            PayrollStatus::Pending,
            PayrollStatus::Approved,
            PayrollStatus::Rejected,
        ] {
            assert_eq!(status.payment_date_on_entry(Some(earlier), now), Some(earlier));
            assert_eq!(status.payment_date_on_entry(None, now), None);
        }
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(enum_values::<PayrollStatus>(), "Pending, Approved, Paid, Rejected");
        assert_eq!("Paid".parse::<PayrollStatus>().unwrap(), PayrollStatus::Paid);
        assert!("paid".parse::<PayrollStatus>().is_err());
        assert!("Cancelled".parse::<PayrollStatus>().is_err());
    }

    #[test]
    fn line_item_name_is_optional() {
        let parsed: LineItem = serde_json::from_str(r#"{"amount": 12.5}"#).unwrap();
        assert_eq!(parsed, item(12.5));
    }

    #[test]
    fn pay_period_ordering() {
        let period = PayPeriod {
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
        };
        assert!(!period.is_ordered());
    }

    proptest! {
        #[test]
        fn net_pay_matches_definition(
            basic in 0.0f64..1_000_000.0,
            allowances in prop::collection::vec(0.0f64..10_000.0, 0..8),
            deductions in prop::collection::vec(0.0f64..10_000.0, 0..8),
        ) {
            let a: Vec<LineItem> = allowances.iter().copied().map(item).collect();
            let d: Vec<LineItem> = deductions.iter().copied().map(item).collect();
            let expected = basic + allowances.iter().sum::<f64>() - deductions.iter().sum::<f64>();
            prop_assert_eq!(net_pay(basic, &a, &d), expected);
        }

        #[test]
        fn non_paid_never_clears_payment_date(secs in 0i64..4_000_000_000, idx in 0usize..3) {
            let stamped = Utc.timestamp_opt(secs, 0).unwrap();
            let status = [PayrollStatus::Pending, PayrollStatus::Approved, PayrollStatus::Rejected][idx];
            prop_assert_eq!(status.payment_date_on_entry(Some(stamped), Utc::now()), Some(stamped));
        }
    }
}
