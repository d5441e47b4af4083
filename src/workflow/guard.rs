use crate::errors::WorkflowError;
use crate::workflow::chain::ApprovalChain;

/// Administrative capability that bypasses the expected-approver check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideGrant {
    AdminRole,
}

impl OverrideGrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideGrant::AdminRole => "admin_role",
        }
    }
}

/// The caller acting on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub username: String,
    pub employee_id: Option<u64>,
    pub override_grant: Option<OverrideGrant>,
}

impl Actor {
    pub fn is(&self, employee_id: u64) -> bool {
        self.employee_id == Some(employee_id)
    }
}

/// How an actor was cleared to decide at a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    ExpectedApprover,
    Override(OverrideGrant),
}

impl Clearance {
    pub fn via_override(&self) -> bool {
        matches!(self, Clearance::Override(_))
    }
}

/// True when `actor` is the chain member expected at `level`.
pub fn is_expected_approver(chain: &ApprovalChain, level: u32, actor: &Actor) -> bool {
    chain
        .member_at(level)
        .map(|member| actor.is(member.manager_id))
        .unwrap_or(false)
}

/// Decides who may act on a request sitting at `level`.
///
/// Only the chain member at the current level qualifies; earlier or later
/// members and the submitter do not. The override is the single exception.
pub fn authorize(chain: &ApprovalChain, level: u32, actor: &Actor) -> Result<Clearance, WorkflowError> {
    if is_expected_approver(chain, level, actor) {
        return Ok(Clearance::ExpectedApprover);
    }

    if let Some(grant) = actor.override_grant {
        tracing::warn!(
            target: "audit",
            user_id = actor.user_id,
            username = %actor.username,
            level,
            grant = grant.as_str(),
            "Approval override used"
        );
        return Ok(Clearance::Override(grant));
    }

    match chain.member_at(level) {
        Some(_) => Err(WorkflowError::Authorization(format!(
            "You are not the approver expected at level {}",
            level + 1
        ))),
        None => Err(WorkflowError::Authorization(format!(
            "No approver is configured at level {}",
            level + 1
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(employee_id: Option<u64>, override_grant: Option<OverrideGrant>) -> Actor {
        Actor {
            user_id: 500,
            username: "tester".into(),
            employee_id,
            override_grant,
        }
    }

    #[test]
    fn only_member_at_current_level_is_cleared() {
        let chain = ApprovalChain::from_managers(&[10, 20]);

        assert_eq!(
            authorize(&chain, 0, &actor(Some(10), None)).unwrap(),
            Clearance::ExpectedApprover
        );
        assert!(matches!(
            authorize(&chain, 1, &actor(Some(10), None)),
            Err(WorkflowError::Authorization(_))
        ));
        assert!(matches!(
            authorize(&chain, 0, &actor(Some(20), None)),
            Err(WorkflowError::Authorization(_))
        ));
    }

    #[test]
    fn override_bypasses_even_missing_member() {
        let chain = ApprovalChain::default();
        let admin = actor(None, Some(OverrideGrant::AdminRole));

        let clearance = authorize(&chain, 0, &admin).unwrap();
        assert!(clearance.via_override());
    }

    #[test]
    fn expected_member_with_override_is_not_flagged_as_override() {
        let chain = ApprovalChain::from_managers(&[10]);
        let clearance = authorize(&chain, 0, &actor(Some(10), Some(OverrideGrant::AdminRole))).unwrap();

        assert_eq!(clearance, Clearance::ExpectedApprover);
    }

    #[test]
    fn actor_without_employee_profile_never_matches() {
        let chain = ApprovalChain::from_managers(&[10]);
        assert!(!is_expected_approver(&chain, 0, &actor(None, None)));
    }
}
