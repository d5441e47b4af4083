use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::errors::WorkflowError;
use crate::model::leave_balance::LeaveType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    Leave,
    Overtime,
    Correction,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Leave => "leave",
            RequestKind::Overtime => "overtime",
            RequestKind::Correction => "correction",
        }
    }
}

/// Lifecycle of an approvable request.
///
/// `ApprovedThrough(k)` is stored as `approved_n{k}`: levels `0..k` have
/// approved and level `k` is expected next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RequestStatus {
    Pending,
    ApprovedThrough(u32),
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Level whose approver is expected to act next.
    pub fn current_rank(&self) -> u32 {
        match self {
            RequestStatus::Pending => 0,
            RequestStatus::ApprovedThrough(k) => *k,
            RequestStatus::Approved | RequestStatus::Rejected => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    /// Status after level `level` approves, given whether a next level exists.
    pub fn after_approval(level: u32, has_next: bool) -> Self {
        if has_next {
            RequestStatus::ApprovedThrough(level + 1)
        } else {
            RequestStatus::Approved
        }
    }

    /// Lenient decoding for stored values: anything unrecognised is treated
    /// as `pending` so the request stays actionable at rank 0.
    pub fn from_stored(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(status = raw, "Unrecognised request status, treating as pending");
            RequestStatus::Pending
        })
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::ApprovedThrough(k) => write!(f, "approved_n{}", k),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => other
                .strip_prefix("approved_n")
                .and_then(|k| k.parse::<u32>().ok())
                .filter(|k| *k > 0)
                .map(RequestStatus::ApprovedThrough)
                .ok_or_else(|| format!("Invalid request status: {}", s)),
        }
    }
}

impl From<RequestStatus> for String {
    fn from(status: RequestStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for RequestStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kind-specific content of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestPayload {
    Leave {
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        days_requested: f64,
        reason: Option<String>,
    },
    Overtime {
        date: NaiveDate,
        hours: f64,
        reason: Option<String>,
    },
    Correction {
        date: NaiveDate,
        requested_check_in: Option<NaiveTime>,
        requested_check_out: Option<NaiveTime>,
        reason: String,
    },
}

impl RequestPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestPayload::Leave { .. } => RequestKind::Leave,
            RequestPayload::Overtime { .. } => RequestKind::Overtime,
            RequestPayload::Correction { .. } => RequestKind::Correction,
        }
    }

    /// Builds a leave payload, defaulting the day count to the inclusive span.
    pub fn leave(
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        days_requested: Option<f64>,
        reason: Option<String>,
    ) -> Self {
        let span = (end_date - start_date).num_days() + 1;
        RequestPayload::Leave {
            leave_type,
            start_date,
            end_date,
            days_requested: days_requested.unwrap_or(span as f64),
            reason,
        }
    }

    /// Checks the mandatory fields of the payload and normalises free text.
    pub fn validated(self) -> Result<Self, WorkflowError> {
        match self {
            RequestPayload::Leave {
                leave_type,
                start_date,
                end_date,
                days_requested,
                reason,
            } => {
                if start_date > end_date {
                    return Err(WorkflowError::Validation(
                        "start_date cannot be after end_date".into(),
                    ));
                }
                let span = ((end_date - start_date).num_days() + 1) as f64;
                if !(days_requested > 0.0) || days_requested > span {
                    return Err(WorkflowError::Validation(format!(
                        "days_requested must be greater than 0 and at most {}",
                        span
                    )));
                }
                Ok(RequestPayload::Leave {
                    leave_type,
                    start_date,
                    end_date,
                    days_requested,
                    reason: non_blank(reason),
                })
            }
            RequestPayload::Overtime {
                date,
                hours,
                reason,
            } => {
                if !(hours > 0.0 && hours <= 24.0) {
                    return Err(WorkflowError::Validation(
                        "hours must be greater than 0 and at most 24".into(),
                    ));
                }
                Ok(RequestPayload::Overtime {
                    date,
                    hours,
                    reason: non_blank(reason),
                })
            }
            RequestPayload::Correction {
                date,
                requested_check_in,
                requested_check_out,
                reason,
            } => {
                if requested_check_in.is_none() && requested_check_out.is_none() {
                    return Err(WorkflowError::Validation(
                        "requested_check_in or requested_check_out is required".into(),
                    ));
                }
                if let (Some(check_in), Some(check_out)) = (requested_check_in, requested_check_out)
                {
                    if check_in >= check_out {
                        return Err(WorkflowError::Validation(
                            "requested_check_in must be before requested_check_out".into(),
                        ));
                    }
                }
                let reason = non_blank(Some(reason))
                    .ok_or_else(|| WorkflowError::Validation("reason is required".into()))?;
                Ok(RequestPayload::Correction {
                    date,
                    requested_check_in,
                    requested_check_out,
                    reason,
                })
            }
        }
    }
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Approved => "approved",
            DecisionOutcome::Rejected => "rejected",
        }
    }
}

/// What one chain level decided, read off the request's decision rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub level: u32,
    pub outcome: DecisionOutcome,
    pub approver_user_id: u64,
    pub approver_employee_id: Option<u64>,
    /// Set when the decision went through the administrative override
    pub via_override: bool,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovableRequest {
    pub id: u64,
    pub employee_id: u64,
    pub payload: RequestPayload,
    pub status: RequestStatus,
    /// Ordered by level
    pub decisions: Vec<Decision>,
    pub created_at: DateTime<Utc>,
}

impl ApprovableRequest {
    pub fn kind(&self) -> RequestKind {
        self.payload.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Most recent decision taken by `user_id`, if any.
    pub fn decision_by(&self, user_id: u64) -> Option<&Decision> {
        self.decisions
            .iter()
            .rev()
            .find(|d| d.approver_user_id == user_id)
    }

    /// Decision slots form a gap-free prefix `0..n`.
    pub fn decisions_contiguous(&self) -> bool {
        self.decisions
            .iter()
            .enumerate()
            .all(|(i, d)| d.level as usize == i)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub employee_id: u64,
    pub payload: RequestPayload,
}
