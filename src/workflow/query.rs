use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::errors::WorkflowError;
use crate::model::request::{ApprovableRequest, DecisionOutcome, RequestKind};
use crate::workflow::chain::ApprovalChain;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::guard::{self, Actor};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 100;

/// An open request together with where it sits in its chain. Nothing here
/// is stored; every field is recomputed from the current chain.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub request: ApprovableRequest,
    pub current_step: u32,
    pub total_steps: usize,
    pub next_approver_id: Option<u64>,
    pub next_approver_name: Option<String>,
    pub is_caller_next: bool,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub request: ApprovableRequest,
    pub level: u32,
    pub decision: DecisionOutcome,
    pub decided_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub via_override: bool,
}

impl WorkflowEngine {
    /// Open requests whose current level expects `actor`. Override holders
    /// see every open request.
    #[instrument(name = "list_pending", skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn list_pending(
        &self,
        actor: &Actor,
        kind: Option<RequestKind>,
    ) -> Result<Vec<PendingApproval>, WorkflowError> {
        let open = self.store().list_open(kind).await?;
        let mut chains: HashMap<(RequestKind, u64), ApprovalChain> = HashMap::new();
        let mut pending = Vec::new();

        for request in open {
            let key = (request.kind(), request.employee_id);
            let chain = match chains.get(&key).cloned() {
                Some(chain) => chain,
                None => {
                    let chain = self.chain_for(key.0, key.1).await?;
                    chains.insert(key, chain.clone());
                    chain
                }
            };

            let level = request.status.current_rank();
            let is_caller_next = guard::is_expected_approver(&chain, level, actor);
            if !is_caller_next && actor.override_grant.is_none() {
                continue;
            }

            let next_approver_id = chain.member_at(level).map(|m| m.manager_id);
            let next_approver_name = match next_approver_id {
                Some(manager_id) => self.directory().display_name(manager_id).await?,
                None => None,
            };

            pending.push(PendingApproval {
                current_step: level + 1,
                total_steps: chain.len(),
                next_approver_id,
                next_approver_name,
                is_caller_next,
                request,
            });
        }

        tracing::debug!(count = pending.len(), "Pending approvals listed");
        Ok(pending)
    }

    /// Terminal requests `actor` decided on, newest decision first.
    #[instrument(name = "list_history", skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn list_history(
        &self,
        actor: &Actor,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, WorkflowError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let decided = self.store().list_decided_by(actor.user_id, limit).await?;

        Ok(decided
            .into_iter()
            .filter_map(|request| {
                let decision = request.decision_by(actor.user_id)?.clone();
                Some(HistoryEntry {
                    level: decision.level,
                    decision: decision.outcome,
                    decided_at: decision.decided_at,
                    comment: decision.comment,
                    via_override: decision.via_override,
                    request,
                })
            })
            .collect())
    }
}
