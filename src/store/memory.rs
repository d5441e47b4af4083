//! In-memory `RequestStore` and `Directory` used by the engine and handler
//! tests. A commit stages every write on a copy of the state and swaps it in
//! only when the side effect succeeded.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::lock::Mutex;

use super::{Directory, RequestFilter, RequestPage, RequestStore, Transition};
use crate::errors::WorkflowError;
use crate::model::attendance::{Attendance, AttendanceUpsert};
use crate::model::employee::Employee;
use crate::model::leave_balance::LeaveType;
use crate::model::leave_balance::LeaveBalance;
use crate::model::manager_link::ManagerLink;
use crate::model::request::{ApprovableRequest, NewRequest, RequestKind, RequestStatus};
use crate::workflow::effects::{EffectLedger, SideEffectApplier};

#[derive(Clone, Default)]
struct MemoryState {
    next_request_id: u64,
    next_link_id: u64,
    requests: HashMap<(RequestKind, u64), ApprovableRequest>,
    employees: HashMap<u64, Employee>,
    links: Vec<ManagerLink>,
    balances: HashMap<(u64, LeaveType, i32), f64>,
    attendance: HashMap<(u64, NaiveDate), Attendance>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub async fn add_employee(&self, id: u64, first_name: &str, last_name: &str) {
        let mut state = self.state.lock().await;
        state.employees.insert(
            id,
            Employee {
                id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            },
        );
    }

    pub async fn put_attendance(&self, record: Attendance) {
        let mut state = self.state.lock().await;
        state
            .attendance
            .insert((record.employee_id, record.date), record);
    }

    pub async fn taken(&self, employee_id: u64, leave_type: LeaveType, year: i32) -> f64 {
        let state = self.state.lock().await;
        state
            .balances
            .get(&(employee_id, leave_type, year))
            .copied()
            .unwrap_or(0.0)
    }

    pub async fn snapshot(&self, kind: RequestKind, id: u64) -> Option<ApprovableRequest> {
        let state = self.state.lock().await;
        state.requests.get(&(kind, id)).cloned()
    }
}

struct MemoryLedger<'a> {
    state: &'a mut MemoryState,
}

#[async_trait]
impl EffectLedger for MemoryLedger<'_> {
    async fn add_leave_taken(
        &mut self,
        employee_id: u64,
        leave_type: LeaveType,
        year: i32,
        days: f64,
    ) -> Result<(), WorkflowError> {
        *self
            .state
            .balances
            .entry((employee_id, leave_type, year))
            .or_insert(0.0) += days;
        Ok(())
    }

    async fn upsert_attendance(
        &mut self,
        upsert: &AttendanceUpsert,
    ) -> Result<Attendance, WorkflowError> {
        let key = (upsert.employee_id, upsert.date);
        let merged = Attendance::merged(self.state.attendance.remove(&key), upsert);
        self.state.attendance.insert(key, merged.clone());
        Ok(merged)
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn insert(&self, new: NewRequest) -> Result<ApprovableRequest, WorkflowError> {
        let mut state = self.state.lock().await;
        state.next_request_id += 1;

        let request = ApprovableRequest {
            id: state.next_request_id,
            employee_id: new.employee_id,
            payload: new.payload,
            status: RequestStatus::Pending,
            decisions: Vec::new(),
            created_at: Utc::now(),
        };
        state
            .requests
            .insert((request.kind(), request.id), request.clone());
        Ok(request)
    }

    async fn find(
        &self,
        kind: RequestKind,
        id: u64,
    ) -> Result<Option<ApprovableRequest>, WorkflowError> {
        let state = self.state.lock().await;
        Ok(state.requests.get(&(kind, id)).cloned())
    }

    async fn list(
        &self,
        kind: RequestKind,
        filter: &RequestFilter,
    ) -> Result<RequestPage, WorkflowError> {
        let state = self.state.lock().await;
        let mut matching: Vec<ApprovableRequest> = state
            .requests
            .values()
            .filter(|r| r.kind() == kind)
            .filter(|r| filter.employee_id.is_none_or(|e| r.employee_id == e))
            .filter(|r| {
                filter
                    .status
                    .as_deref()
                    .is_none_or(|s| r.status.to_string() == s)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let data = matching
            .into_iter()
            .skip(offset)
            .take(filter.per_page as usize)
            .collect();
        Ok(RequestPage { data, total })
    }

    async fn list_open(
        &self,
        kind: Option<RequestKind>,
    ) -> Result<Vec<ApprovableRequest>, WorkflowError> {
        let state = self.state.lock().await;
        let mut open: Vec<ApprovableRequest> = state
            .requests
            .values()
            .filter(|r| !r.is_terminal())
            .filter(|r| kind.is_none_or(|k| r.kind() == k))
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(open)
    }

    async fn list_decided_by(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<ApprovableRequest>, WorkflowError> {
        let state = self.state.lock().await;
        let mut decided: Vec<ApprovableRequest> = state
            .requests
            .values()
            .filter(|r| r.is_terminal() && r.decision_by(user_id).is_some())
            .cloned()
            .collect();
        decided.sort_by_key(|r| std::cmp::Reverse(r.decision_by(user_id).map(|d| d.decided_at)));
        decided.truncate(limit);
        Ok(decided)
    }

    async fn commit(
        &self,
        transition: Transition<'_>,
        effect: Option<&dyn SideEffectApplier>,
    ) -> Result<(), WorkflowError> {
        let mut state = self.state.lock().await;
        let key = (transition.request.kind(), transition.request.id);

        let current = state
            .requests
            .get(&key)
            .ok_or_else(|| WorkflowError::NotFound(format!("Request #{} not found", key.1)))?;
        if current.status != transition.expected
            || current
                .decisions
                .iter()
                .any(|d| d.level == transition.decision.level)
        {
            return Err(WorkflowError::Conflict(format!(
                "Request #{} was changed by another approver",
                key.1
            )));
        }

        let mut staged = state.clone();
        if let Some(stored) = staged.requests.get_mut(&key) {
            stored.status = transition.next;
            stored.decisions.push(transition.decision);
        }
        if let Some(effect) = effect {
            let mut ledger = MemoryLedger {
                state: &mut staged,
            };
            effect.apply(transition.request, &mut ledger).await?;
        }

        *state = staged;
        Ok(())
    }

    async fn reapply(
        &self,
        request: &ApprovableRequest,
        effect: &dyn SideEffectApplier,
    ) -> Result<(), WorkflowError> {
        let mut state = self.state.lock().await;
        let status = state
            .requests
            .get(&(request.kind(), request.id))
            .map(|r| r.status);
        if status != Some(RequestStatus::Approved) {
            return Err(WorkflowError::State(format!(
                "Request #{} is no longer approved",
                request.id
            )));
        }

        let mut staged = state.clone();
        let mut ledger = MemoryLedger {
            state: &mut staged,
        };
        effect.apply(request, &mut ledger).await?;
        *state = staged;
        Ok(())
    }

    async fn leave_balances(
        &self,
        employee_id: u64,
        year: i32,
    ) -> Result<Vec<LeaveBalance>, WorkflowError> {
        let state = self.state.lock().await;
        let mut balances: Vec<LeaveBalance> = state
            .balances
            .iter()
            .filter(|((e, _, y), _)| *e == employee_id && *y == year)
            .map(|((e, leave_type, y), taken)| LeaveBalance {
                employee_id: *e,
                leave_type: *leave_type,
                year: *y,
                taken: *taken,
            })
            .collect();
        balances.sort_by_key(|b| b.leave_type.as_str());
        Ok(balances)
    }

    async fn attendance(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<Attendance>, WorkflowError> {
        let state = self.state.lock().await;
        Ok(state.attendance.get(&(employee_id, date)).cloned())
    }
}

#[async_trait]
impl Directory for InMemoryStore {
    async fn employee_exists(&self, employee_id: u64) -> Result<bool, WorkflowError> {
        let state = self.state.lock().await;
        Ok(state.employees.contains_key(&employee_id))
    }

    async fn display_name(&self, employee_id: u64) -> Result<Option<String>, WorkflowError> {
        let state = self.state.lock().await;
        Ok(state.employees.get(&employee_id).map(Employee::display_name))
    }

    async fn manager_links(&self, employee_id: u64) -> Result<Vec<ManagerLink>, WorkflowError> {
        let state = self.state.lock().await;
        Ok(state
            .links
            .iter()
            .filter(|l| l.employee_id == employee_id && l.active)
            .cloned()
            .collect())
    }

    async fn assign_manager(
        &self,
        employee_id: u64,
        manager_id: u64,
        rank: u32,
    ) -> Result<ManagerLink, WorkflowError> {
        let mut state = self.state.lock().await;
        for link in state
            .links
            .iter_mut()
            .filter(|l| l.employee_id == employee_id && l.rank == rank && l.active)
        {
            link.active = false;
        }

        state.next_link_id += 1;
        let link = ManagerLink {
            id: state.next_link_id,
            employee_id,
            manager_id,
            rank,
            active: true,
            created_at: Utc::now(),
        };
        state.links.push(link.clone());
        Ok(link)
    }

    async fn deactivate_link(&self, link_id: u64) -> Result<bool, WorkflowError> {
        let mut state = self.state.lock().await;
        match state.links.iter_mut().find(|l| l.id == link_id && l.active) {
            Some(link) => {
                link.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
