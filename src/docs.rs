use crate::api::approval::{
    ApproveResponse, DecisionBody, DecisionResponse, HistoryQuery, HistoryResponse, PendingQuery,
    PendingResponse, RequestFilterQuery, RequestListResponse, RequestResponse,
};
use crate::api::attendance::AttendanceQuery;
use crate::api::correction::CreateCorrection;
use crate::api::leave_request::{BalanceQuery, CreateLeave, LeaveBalanceResponse};
use crate::api::manager_link::{AssignManager, ManagerLinkResponse};
use crate::api::overtime::CreateOvertime;
use crate::model::attendance::Attendance;
use crate::model::leave_balance::{LeaveBalance, LeaveType};
use crate::model::manager_link::ManagerLink;
use crate::model::request::{DecisionOutcome, RequestKind};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Approvals API",
        version = "1.0.0",
        description = r#"
## Multi-level approval workflow

Leave, overtime and attendance correction requests climb the requesting
employee's escalation chain one manager at a time.

### Key Features
- **Submission** of leave, overtime and correction requests
- **Approvals**: approve or reject the level a request is waiting on, see
  what is pending for you and what you already decided
- **Side effects** applied atomically with the final approval: leave
  balance bookkeeping and attendance corrections
- **Manager links**: HR maintains each employee's escalation chain

### Security
Every endpoint requires a **JWT Bearer** access token. Administrators may
decide any level; such decisions are flagged as overrides.

### Errors
Failures return `{"error": {"kind": "...", "message": "..."}}`.
"#,
    ),
    paths(
        crate::api::approval::list_pending,
        crate::api::approval::list_history,
        crate::api::approval::list_requests,
        crate::api::approval::get_request,
        crate::api::approval::approve,
        crate::api::approval::reject,
        crate::api::approval::reapply,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_balance,

        crate::api::overtime::create_overtime,
        crate::api::correction::create_correction,
        crate::api::attendance::get_attendance,

        crate::api::manager_link::list_managers,
        crate::api::manager_link::assign_manager,
        crate::api::manager_link::deactivate_link
    ),
    components(
        schemas(
            RequestKind,
            DecisionOutcome,
            LeaveType,
            DecisionResponse,
            RequestResponse,
            RequestListResponse,
            RequestFilterQuery,
            PendingResponse,
            PendingQuery,
            HistoryResponse,
            HistoryQuery,
            DecisionBody,
            ApproveResponse,
            CreateLeave,
            BalanceQuery,
            LeaveBalance,
            LeaveBalanceResponse,
            CreateOvertime,
            CreateCorrection,
            Attendance,
            AttendanceQuery,
            AssignManager,
            ManagerLink,
            ManagerLinkResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Approvals", description = "Approve, reject and track requests"),
        (name = "Leave", description = "Leave requests and balances"),
        (name = "Overtime", description = "Overtime requests"),
        (name = "Corrections", description = "Attendance correction requests"),
        (name = "Attendance", description = "Attendance records"),
        (name = "Manager links", description = "Escalation chain administration"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
