use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;

use crate::errors::WorkflowError;
use crate::model::attendance::{Attendance, AttendanceUpsert};
use crate::model::leave_balance::LeaveType;
use crate::model::request::{ApprovableRequest, RequestKind, RequestPayload};

/// Writes a side effect may perform. Implementations are bound to the
/// transaction that also commits the terminal status.
#[async_trait]
pub trait EffectLedger: Send {
    async fn add_leave_taken(
        &mut self,
        employee_id: u64,
        leave_type: LeaveType,
        year: i32,
        days: f64,
    ) -> Result<(), WorkflowError>;

    async fn upsert_attendance(
        &mut self,
        upsert: &AttendanceUpsert,
    ) -> Result<Attendance, WorkflowError>;
}

/// Kind-specific action run when a request reaches `approved`.
#[async_trait]
pub trait SideEffectApplier: Send + Sync {
    fn kind(&self) -> RequestKind;

    /// Caps how many chain levels requests of this kind escalate through.
    fn max_levels(&self) -> Option<usize> {
        None
    }

    /// Whether the effect may be re-run on an already approved request.
    fn reapplicable(&self) -> bool {
        false
    }

    async fn apply(
        &self,
        request: &ApprovableRequest,
        ledger: &mut dyn EffectLedger,
    ) -> Result<(), WorkflowError>;
}

fn payload_mismatch(expected: RequestKind, request: &ApprovableRequest) -> WorkflowError {
    WorkflowError::Validation(format!(
        "{} applier cannot handle {} request #{}",
        expected,
        request.kind(),
        request.id
    ))
}

/// Books the approved days against the employee's yearly balance.
pub struct LeaveBalanceApplier;

#[async_trait]
impl SideEffectApplier for LeaveBalanceApplier {
    fn kind(&self) -> RequestKind {
        RequestKind::Leave
    }

    async fn apply(
        &self,
        request: &ApprovableRequest,
        ledger: &mut dyn EffectLedger,
    ) -> Result<(), WorkflowError> {
        let RequestPayload::Leave {
            leave_type,
            start_date,
            days_requested,
            ..
        } = &request.payload
        else {
            return Err(payload_mismatch(self.kind(), request));
        };

        ledger
            .add_leave_taken(
                request.employee_id,
                *leave_type,
                start_date.year(),
                *days_requested,
            )
            .await?;

        tracing::info!(
            request_id = request.id,
            employee_id = request.employee_id,
            leave_type = leave_type.as_str(),
            days = days_requested,
            "Leave balance updated"
        );
        Ok(())
    }
}

/// Writes the requested clock times into the daily attendance record.
pub struct AttendanceCorrectionApplier;

impl AttendanceCorrectionApplier {
    pub fn upsert_for(request: &ApprovableRequest) -> Option<AttendanceUpsert> {
        match &request.payload {
            RequestPayload::Correction {
                date,
                requested_check_in,
                requested_check_out,
                ..
            } => Some(AttendanceUpsert {
                employee_id: request.employee_id,
                date: *date,
                check_in: *requested_check_in,
                check_out: *requested_check_out,
                note: format!("correction request #{} applied", request.id),
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl SideEffectApplier for AttendanceCorrectionApplier {
    fn kind(&self) -> RequestKind {
        RequestKind::Correction
    }

    fn reapplicable(&self) -> bool {
        true
    }

    async fn apply(
        &self,
        request: &ApprovableRequest,
        ledger: &mut dyn EffectLedger,
    ) -> Result<(), WorkflowError> {
        let upsert =
            Self::upsert_for(request).ok_or_else(|| payload_mismatch(self.kind(), request))?;

        let record = ledger.upsert_attendance(&upsert).await?;

        tracing::info!(
            request_id = request.id,
            employee_id = request.employee_id,
            date = %record.date,
            "Attendance corrected"
        );
        Ok(())
    }
}

/// Overtime is consumed downstream from its approved status; nothing else
/// is written here.
pub struct OvertimeApplier;

#[async_trait]
impl SideEffectApplier for OvertimeApplier {
    fn kind(&self) -> RequestKind {
        RequestKind::Overtime
    }

    fn max_levels(&self) -> Option<usize> {
        Some(1)
    }

    async fn apply(
        &self,
        request: &ApprovableRequest,
        _ledger: &mut dyn EffectLedger,
    ) -> Result<(), WorkflowError> {
        let RequestPayload::Overtime { hours, date, .. } = &request.payload else {
            return Err(payload_mismatch(self.kind(), request));
        };

        tracing::info!(
            request_id = request.id,
            employee_id = request.employee_id,
            date = %date,
            hours,
            "Overtime approved"
        );
        Ok(())
    }
}

/// One applier per request kind.
#[derive(Clone)]
pub struct ApplierSet {
    leave: Arc<dyn SideEffectApplier>,
    overtime: Arc<dyn SideEffectApplier>,
    correction: Arc<dyn SideEffectApplier>,
}

impl ApplierSet {
    pub fn new(
        leave: Arc<dyn SideEffectApplier>,
        overtime: Arc<dyn SideEffectApplier>,
        correction: Arc<dyn SideEffectApplier>,
    ) -> Self {
        Self {
            leave,
            overtime,
            correction,
        }
    }

    pub fn standard() -> Self {
        Self::new(
            Arc::new(LeaveBalanceApplier),
            Arc::new(OvertimeApplier),
            Arc::new(AttendanceCorrectionApplier),
        )
    }

    pub fn for_kind(&self, kind: RequestKind) -> &dyn SideEffectApplier {
        match kind {
            RequestKind::Leave => self.leave.as_ref(),
            RequestKind::Overtime => self.overtime.as_ref(),
            RequestKind::Correction => self.correction.as_ref(),
        }
    }
}
