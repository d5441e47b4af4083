use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::errors::WorkflowError;
use crate::model::request::{
    ApprovableRequest, Decision, DecisionOutcome, NewRequest, RequestKind, RequestPayload,
    RequestStatus, non_blank,
};
use crate::store::{Directory, RequestStore, Transition};
use crate::workflow::chain::{ApprovalChain, ChainResolver};
use crate::workflow::effects::ApplierSet;
use crate::workflow::guard::{self, Actor, Clearance};

/// Result of a successful Approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Another level must approve; `next_level` is zero-based.
    Escalated { next_level: u32 },
    /// The request is `approved` and its side effect has been applied.
    Completed,
}

/// Multi-level approval state machine shared by every request kind.
pub struct WorkflowEngine {
    resolver: Arc<dyn ChainResolver>,
    directory: Arc<dyn Directory>,
    store: Arc<dyn RequestStore>,
    appliers: ApplierSet,
}

impl WorkflowEngine {
    pub fn new(
        resolver: Arc<dyn ChainResolver>,
        directory: Arc<dyn Directory>,
        store: Arc<dyn RequestStore>,
        appliers: ApplierSet,
    ) -> Self {
        Self {
            resolver,
            directory,
            store,
            appliers,
        }
    }

    pub fn store(&self) -> &dyn RequestStore {
        self.store.as_ref()
    }

    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    /// Chain that governs requests of `kind` submitted by `employee_id`.
    pub async fn chain_for(
        &self,
        kind: RequestKind,
        employee_id: u64,
    ) -> Result<ApprovalChain, WorkflowError> {
        let chain = self.resolver.resolve(employee_id).await?;
        Ok(match self.appliers.for_kind(kind).max_levels() {
            Some(max) => chain.truncated(max),
            None => chain,
        })
    }

    pub async fn load(&self, kind: RequestKind, id: u64) -> Result<ApprovableRequest, WorkflowError> {
        self.store
            .find(kind, id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("{} request #{} not found", kind, id)))
    }

    #[instrument(name = "submit_request", skip(self, actor, payload), fields(user_id = actor.user_id, kind = %payload.kind()))]
    pub async fn submit(
        &self,
        actor: &Actor,
        payload: RequestPayload,
    ) -> Result<ApprovableRequest, WorkflowError> {
        let employee_id = actor
            .employee_id
            .ok_or_else(|| WorkflowError::Authorization("No employee profile".into()))?;
        let payload = payload.validated()?;

        if !self.directory.employee_exists(employee_id).await? {
            return Err(WorkflowError::NotFound(format!(
                "Employee #{} not found",
                employee_id
            )));
        }

        let chain = self.chain_for(payload.kind(), employee_id).await?;
        if chain.is_empty() {
            return Err(WorkflowError::Configuration(format!(
                "No approval chain is configured for employee #{}",
                employee_id
            )));
        }

        let request = self
            .store
            .insert(NewRequest {
                employee_id,
                payload,
            })
            .await?;

        info!(
            request_id = request.id,
            employee_id,
            total_steps = chain.len(),
            "Request submitted"
        );
        Ok(request)
    }

    #[instrument(name = "approve_request", skip(self, actor, comment), fields(kind = %kind, request_id = id, user_id = actor.user_id))]
    pub async fn approve(
        &self,
        kind: RequestKind,
        id: u64,
        actor: &Actor,
        comment: Option<String>,
    ) -> Result<ApprovalOutcome, WorkflowError> {
        let request = self.load(kind, id).await?;
        ensure_open(&request)?;

        let chain = self.chain_for(kind, request.employee_id).await?;
        let level = request.status.current_rank();
        let clearance = guard::authorize(&chain, level, actor)?;

        let has_next = chain.has_level(level + 1);
        let next = RequestStatus::after_approval(level, has_next);
        let effect = if has_next {
            None
        } else {
            Some(self.appliers.for_kind(kind))
        };

        self.store
            .commit(
                Transition {
                    request: &request,
                    expected: request.status,
                    next,
                    decision: decision(level, DecisionOutcome::Approved, actor, clearance, non_blank(comment)),
                },
                effect,
            )
            .await?;

        info!(level, status = %next, "Request approved at level");

        Ok(if has_next {
            ApprovalOutcome::Escalated {
                next_level: level + 1,
            }
        } else {
            ApprovalOutcome::Completed
        })
    }

    #[instrument(name = "reject_request", skip(self, actor, comment), fields(kind = %kind, request_id = id, user_id = actor.user_id))]
    pub async fn reject(
        &self,
        kind: RequestKind,
        id: u64,
        actor: &Actor,
        comment: Option<String>,
    ) -> Result<(), WorkflowError> {
        let request = self.load(kind, id).await?;
        ensure_open(&request)?;

        let comment = non_blank(comment).ok_or_else(|| {
            WorkflowError::Validation("A comment is required to reject a request".into())
        })?;

        let chain = self.chain_for(kind, request.employee_id).await?;
        let level = request.status.current_rank();
        let clearance = guard::authorize(&chain, level, actor)?;

        self.store
            .commit(
                Transition {
                    request: &request,
                    expected: request.status,
                    next: RequestStatus::Rejected,
                    decision: decision(level, DecisionOutcome::Rejected, actor, clearance, Some(comment)),
                },
                None,
            )
            .await?;

        info!(level, "Request rejected");
        Ok(())
    }

    /// Re-runs the side effect of an approved request without touching its
    /// status or decisions.
    #[instrument(name = "reapply_request", skip(self, actor), fields(kind = %kind, request_id = id, user_id = actor.user_id))]
    pub async fn reapply(
        &self,
        kind: RequestKind,
        id: u64,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        let applier = self.appliers.for_kind(kind);
        if !applier.reapplicable() {
            return Err(WorkflowError::Validation(format!(
                "{} requests cannot be re-applied",
                kind
            )));
        }

        let request = self.load(kind, id).await?;
        if request.status != RequestStatus::Approved {
            return Err(WorkflowError::State(format!(
                "{} request #{} is {}; only approved requests can be re-applied",
                kind, id, request.status
            )));
        }

        self.store.reapply(&request, applier).await?;

        warn!(target: "audit", username = %actor.username, "Side effect re-applied");
        Ok(())
    }
}

fn ensure_open(request: &ApprovableRequest) -> Result<(), WorkflowError> {
    if request.is_terminal() {
        return Err(WorkflowError::State(format!(
            "{} request #{} is already {}",
            request.kind(),
            request.id,
            request.status
        )));
    }
    Ok(())
}

fn decision(
    level: u32,
    outcome: DecisionOutcome,
    actor: &Actor,
    clearance: Clearance,
    comment: Option<String>,
) -> Decision {
    Decision {
        level,
        outcome,
        approver_user_id: actor.user_id,
        approver_employee_id: actor.employee_id,
        via_override: clearance.via_override(),
        comment,
        decided_at: Utc::now(),
    }
}
