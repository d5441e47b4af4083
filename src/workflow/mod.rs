//! Multi-level approval of employee requests.
//!
//! The chain resolver yields who approves, the guard decides who may act
//! now, the engine moves status and the kind's side-effect applier runs
//! once when the last level approves.

pub mod chain;
pub mod effects;
pub mod engine;
pub mod guard;
pub mod query;

pub use chain::{ApprovalChain, ChainResolver, DirectoryChainResolver};
pub use effects::ApplierSet;
pub use engine::{ApprovalOutcome, WorkflowEngine};
pub use guard::Actor;
