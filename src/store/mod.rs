use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::WorkflowError;
use crate::model::attendance::Attendance;
use crate::model::leave_balance::LeaveBalance;
use crate::model::manager_link::ManagerLink;
use crate::model::request::{
    ApprovableRequest, Decision, NewRequest, RequestKind, RequestStatus,
};
use crate::workflow::effects::SideEffectApplier;

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::{MySqlDirectory, MySqlRequestStore};

/// A single status move together with the decision that caused it.
pub struct Transition<'a> {
    /// Snapshot the engine decided on
    pub request: &'a ApprovableRequest,
    /// Status the stored row must still have for the write to land
    pub expected: RequestStatus,
    pub next: RequestStatus,
    pub decision: Decision,
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub employee_id: Option<u64>,
    pub status: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

impl RequestFilter {
    /// Rows to skip for `page` (1-based). Saturates, so an absurd page
    /// simply lands past the last row.
    pub fn offset(&self) -> u64 {
        self.page.max(1).saturating_sub(1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone)]
pub struct RequestPage {
    pub data: Vec<ApprovableRequest>,
    pub total: i64,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, new: NewRequest) -> Result<ApprovableRequest, WorkflowError>;

    async fn find(
        &self,
        kind: RequestKind,
        id: u64,
    ) -> Result<Option<ApprovableRequest>, WorkflowError>;

    async fn list(
        &self,
        kind: RequestKind,
        filter: &RequestFilter,
    ) -> Result<RequestPage, WorkflowError>;

    /// Every request not yet approved or rejected, oldest first.
    async fn list_open(
        &self,
        kind: Option<RequestKind>,
    ) -> Result<Vec<ApprovableRequest>, WorkflowError>;

    /// Terminal requests carrying a decision by `user_id`, most recently
    /// decided first.
    async fn list_decided_by(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<ApprovableRequest>, WorkflowError>;

    /// Writes the status move and its decision, then runs `effect` in the
    /// same atomic unit. Fails with `Conflict` when the stored status no
    /// longer equals `transition.expected`.
    async fn commit(
        &self,
        transition: Transition<'_>,
        effect: Option<&dyn SideEffectApplier>,
    ) -> Result<(), WorkflowError>;

    /// Re-runs `effect` for a request that must still be `approved`.
    async fn reapply(
        &self,
        request: &ApprovableRequest,
        effect: &dyn SideEffectApplier,
    ) -> Result<(), WorkflowError>;

    async fn leave_balances(
        &self,
        employee_id: u64,
        year: i32,
    ) -> Result<Vec<LeaveBalance>, WorkflowError>;

    async fn attendance(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<Attendance>, WorkflowError>;
}

/// Employees and the manager links HR maintains between them.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn employee_exists(&self, employee_id: u64) -> Result<bool, WorkflowError>;

    async fn display_name(&self, employee_id: u64) -> Result<Option<String>, WorkflowError>;

    /// Active links of `employee_id`
    async fn manager_links(&self, employee_id: u64) -> Result<Vec<ManagerLink>, WorkflowError>;

    /// Replaces any active link at (`employee_id`, `rank`) with a new one.
    async fn assign_manager(
        &self,
        employee_id: u64,
        manager_id: u64,
        rank: u32,
    ) -> Result<ManagerLink, WorkflowError>;

    /// Returns false when no active link has this id.
    async fn deactivate_link(&self, link_id: u64) -> Result<bool, WorkflowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(page: u64, per_page: u64) -> RequestFilter {
        RequestFilter {
            page,
            per_page,
            ..Default::default()
        }
    }

    #[test]
    fn offset_is_one_based_and_saturates() {
        assert_eq!(filter(0, 10).offset(), 0);
        assert_eq!(filter(1, 10).offset(), 0);
        assert_eq!(filter(3, 10).offset(), 20);
        assert_eq!(filter(u64::MAX, 100).offset(), u64::MAX);
    }
}
