use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One escalation step configured by HR: `manager_id` approves for
/// `employee_id` at `rank` (0 approves first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ManagerLink {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 1001)]
    pub manager_id: u64,
    #[schema(example = 0)]
    #[sqlx(rename = "escalation_rank")]
    pub rank: u32,
    pub active: bool,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}
