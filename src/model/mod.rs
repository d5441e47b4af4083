pub mod attendance;
pub mod employee;
pub mod leave_balance;
pub mod manager_link;
pub mod request;
pub mod role;
