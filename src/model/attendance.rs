use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub clock_in: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_out: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Attendance {
    pub fn is_active(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Hours between clock-in and clock-out, `None` while still clocked in.
    pub fn duration_hours(&self) -> Option<f64> {
        self.clock_out
            .map(|out| (out - self.clock_in).num_milliseconds() as f64 / 3_600_000.0)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    #[serde(flatten)]
    pub record: Attendance,
    pub duration_hours: Option<f64>,
}

impl From<Attendance> for AttendanceEntry {
    fn from(record: Attendance) -> Self {
        let duration_hours = record.duration_hours();
        AttendanceEntry {
            record,
            duration_hours,
        }
    }
}
