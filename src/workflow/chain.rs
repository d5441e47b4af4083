use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::WorkflowError;
use crate::model::manager_link::ManagerLink;
use crate::store::Directory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChainMember {
    #[schema(example = 7)]
    pub link_id: u64,
    /// Configured rank of the link this member came from
    #[schema(example = 0)]
    pub rank: u32,
    #[schema(example = 1001)]
    pub manager_id: u64,
}

/// Ordered approvers of one employee. Levels index this list, so level 0 is
/// the lowest active rank whatever its numeric value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalChain {
    members: Vec<ChainMember>,
}

impl ApprovalChain {
    /// Keeps active links only, ascending by rank. Should two active links
    /// share a rank the older one wins, so resolution stays deterministic.
    pub fn from_links(links: impl IntoIterator<Item = ManagerLink>) -> Self {
        let mut active: Vec<ManagerLink> = links.into_iter().filter(|l| l.active).collect();
        active.sort_by_key(|l| (l.rank, l.id));
        active.dedup_by_key(|l| l.rank);

        Self {
            members: active
                .into_iter()
                .map(|l| ChainMember {
                    link_id: l.id,
                    rank: l.rank,
                    manager_id: l.manager_id,
                })
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn from_managers(manager_ids: &[u64]) -> Self {
        Self {
            members: manager_ids
                .iter()
                .enumerate()
                .map(|(rank, manager_id)| ChainMember {
                    link_id: rank as u64,
                    rank: rank as u32,
                    manager_id: *manager_id,
                })
                .collect(),
        }
    }

    pub fn member_at(&self, level: u32) -> Option<&ChainMember> {
        self.members.get(level as usize)
    }

    pub fn has_level(&self, level: u32) -> bool {
        self.member_at(level).is_some()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, employee_id: u64) -> bool {
        self.members.iter().any(|m| m.manager_id == employee_id)
    }

    pub fn members(&self) -> &[ChainMember] {
        &self.members
    }

    pub fn truncated(mut self, max_levels: usize) -> Self {
        self.members.truncate(max_levels);
        self
    }
}

#[async_trait]
pub trait ChainResolver: Send + Sync {
    async fn resolve(&self, employee_id: u64) -> Result<ApprovalChain, WorkflowError>;
}

/// Resolves chains from the manager links held by the directory.
pub struct DirectoryChainResolver {
    directory: Arc<dyn Directory>,
}

impl DirectoryChainResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ChainResolver for DirectoryChainResolver {
    async fn resolve(&self, employee_id: u64) -> Result<ApprovalChain, WorkflowError> {
        let links = self.directory.manager_links(employee_id).await?;
        Ok(ApprovalChain::from_links(links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn link(id: u64, manager_id: u64, rank: u32, active: bool) -> ManagerLink {
        ManagerLink {
            id,
            employee_id: 1,
            manager_id,
            rank,
            active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn orders_by_rank_and_skips_inactive_links() {
        let chain = ApprovalChain::from_links(vec![
            link(1, 30, 2, true),
            link(2, 10, 0, true),
            link(3, 99, 1, false),
            link(4, 20, 1, true),
        ]);

        let managers: Vec<u64> = chain.members().iter().map(|m| m.manager_id).collect();
        assert_eq!(managers, vec![10, 20, 30]);
        assert_eq!(chain.member_at(1).map(|m| m.rank), Some(1));
        assert!(!chain.has_level(3));
    }

    #[test]
    fn rank_gaps_do_not_leave_empty_levels() {
        let chain = ApprovalChain::from_links(vec![link(1, 10, 0, true), link(2, 30, 5, true)]);

        assert_eq!(chain.member_at(1).map(|m| m.manager_id), Some(30));
        assert_eq!(chain.member_at(1).map(|m| m.rank), Some(5));
    }

    #[test]
    fn duplicate_rank_keeps_the_oldest_link() {
        let chain = ApprovalChain::from_links(vec![link(8, 40, 0, true), link(3, 10, 0, true)]);

        assert_eq!(chain.len(), 1);
        assert_eq!(chain.member_at(0).map(|m| m.manager_id), Some(10));
    }

    #[test]
    fn employee_without_links_has_empty_chain() {
        assert!(ApprovalChain::from_links(Vec::new()).is_empty());
    }
}
