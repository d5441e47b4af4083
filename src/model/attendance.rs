use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const SOURCE_CORRECTION: &str = "correction";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub employee_id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(example = "17:30:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    /// `clock` for regular check-in/out, `correction` once a correction was applied
    #[schema(example = "correction")]
    pub source: String,
    pub note: Option<String>,
}

/// Write produced by an approved correction request.
///
/// `None` time fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceUpsert {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub note: String,
}

impl Attendance {
    /// Applies an upsert on top of the existing record (if any).
    pub fn merged(existing: Option<Attendance>, upsert: &AttendanceUpsert) -> Attendance {
        let mut record = existing.unwrap_or(Attendance {
            employee_id: upsert.employee_id,
            date: upsert.date,
            check_in: None,
            check_out: None,
            source: SOURCE_CORRECTION.to_string(),
            note: None,
        });

        if upsert.check_in.is_some() {
            record.check_in = upsert.check_in;
        }
        if upsert.check_out.is_some() {
            record.check_out = upsert.check_out;
        }
        record.source = SOURCE_CORRECTION.to_string();
        record.note = Some(match record.note.take() {
            Some(previous) if !previous.is_empty() => format!("{}\n{}", previous, upsert.note),
            _ => upsert.note.clone(),
        });
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn upsert(check_in: Option<NaiveTime>, check_out: Option<NaiveTime>) -> AttendanceUpsert {
        AttendanceUpsert {
            employee_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            check_in,
            check_out,
            note: "correction request #1 applied".to_string(),
        }
    }

    #[test]
    fn check_in_only_keeps_existing_check_out() {
        let existing = Attendance {
            employee_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            check_in: Some(time(10, 15)),
            check_out: Some(time(18, 0)),
            source: "clock".to_string(),
            note: None,
        };

        let merged = Attendance::merged(Some(existing), &upsert(Some(time(9, 0)), None));

        assert_eq!(merged.check_in, Some(time(9, 0)));
        assert_eq!(merged.check_out, Some(time(18, 0)));
        assert_eq!(merged.source, SOURCE_CORRECTION);
    }

    #[test]
    fn repeated_merge_is_last_write_wins_on_times() {
        let once = Attendance::merged(None, &upsert(Some(time(9, 0)), Some(time(17, 0))));
        let twice = Attendance::merged(Some(once.clone()), &upsert(Some(time(9, 0)), Some(time(17, 0))));

        assert_eq!(once.check_in, twice.check_in);
        assert_eq!(once.check_out, twice.check_out);
        assert_eq!(
            twice.note.as_deref(),
            Some("correction request #1 applied\ncorrection request #1 applied")
        );
    }
}
