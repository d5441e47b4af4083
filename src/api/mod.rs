pub mod approval;
pub mod attendance;
pub mod correction;
pub mod leave_request;
pub mod manager_link;
pub mod overtime;
