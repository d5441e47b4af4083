use crate::auth::auth::AuthUser;
use crate::errors::WorkflowError;
use crate::model::request::{ApprovableRequest, Decision, DecisionOutcome, RequestKind, RequestPayload};
use crate::store::RequestFilter;
use crate::workflow::query::{DEFAULT_HISTORY_LIMIT, HistoryEntry, PendingApproval};
use crate::workflow::{ApprovalOutcome, WorkflowEngine};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct DecisionResponse {
    /// zero-based chain level
    #[schema(example = 0)]
    pub level: u32,
    pub outcome: DecisionOutcome,
    #[schema(example = 7)]
    pub approver_user_id: u64,
    #[schema(example = 1001)]
    pub approver_employee_id: Option<u64>,
    pub via_override: bool,
    #[schema(example = "ok")]
    pub comment: Option<String>,
    #[schema(example = "2026-01-02T09:00:00Z", format = "date-time", value_type = String)]
    pub decided_at: DateTime<Utc>,
}

impl From<Decision> for DecisionResponse {
    fn from(d: Decision) -> Self {
        Self {
            level: d.level,
            outcome: d.outcome,
            approver_user_id: d.approver_user_id,
            approver_employee_id: d.approver_employee_id,
            via_override: d.via_override,
            comment: d.comment,
            decided_at: d.decided_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "kind": "leave",
    "employee_id": 1000,
    "status": "approved_n1",
    "payload": {
        "kind": "leave",
        "leave_type": "annual",
        "start_date": "2026-01-05",
        "end_date": "2026-01-07",
        "days_requested": 3.0,
        "reason": null
    },
    "decisions": [],
    "created_at": "2026-01-01T00:00:00Z"
}))]
pub struct RequestResponse {
    pub id: u64,
    pub kind: RequestKind,
    pub employee_id: u64,
    /// pending, approved_n{k}, approved or rejected
    pub status: String,
    #[schema(value_type = Object)]
    pub payload: RequestPayload,
    pub decisions: Vec<DecisionResponse>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<ApprovableRequest> for RequestResponse {
    fn from(r: ApprovableRequest) -> Self {
        Self {
            id: r.id,
            kind: r.kind(),
            employee_id: r.employee_id,
            status: r.status.to_string(),
            payload: r.payload,
            decisions: r.decisions.into_iter().map(DecisionResponse::from).collect(),
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PendingResponse {
    pub request: RequestResponse,
    /// one-based step the request is waiting on
    #[schema(example = 2)]
    pub current_step: u32,
    #[schema(example = 3)]
    pub total_steps: usize,
    pub next_approver_id: Option<u64>,
    #[schema(example = "John Doe")]
    pub next_approver_name: Option<String>,
    pub is_caller_next: bool,
}

impl From<PendingApproval> for PendingResponse {
    fn from(p: PendingApproval) -> Self {
        Self {
            request: p.request.into(),
            current_step: p.current_step,
            total_steps: p.total_steps,
            next_approver_id: p.next_approver_id,
            next_approver_name: p.next_approver_name,
            is_caller_next: p.is_caller_next,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub request: RequestResponse,
    pub level: u32,
    pub decision: DecisionOutcome,
    #[schema(format = "date-time", value_type = String)]
    pub decided_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub via_override: bool,
}

impl From<HistoryEntry> for HistoryResponse {
    fn from(h: HistoryEntry) -> Self {
        Self {
            request: h.request.into(),
            level: h.level,
            decision: h.decision,
            decided_at: h.decided_at,
            comment: h.comment,
            via_override: h.via_override,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RequestListResponse {
    pub data: Vec<RequestResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PendingQuery {
    /// Only requests of this kind
    pub kind: Option<RequestKind>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    /// Maximum entries to return (1-100, default 20)
    #[schema(example = 20)]
    pub limit: Option<usize>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct RequestFilterQuery {
    #[schema(example = 123)]
    /// Filter by employee ID (HR/Admin only)
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by status
    pub status: Option<String>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>, // 1-based
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>, // items per page
}

#[derive(Deserialize, ToSchema)]
pub struct DecisionBody {
    #[schema(example = "ok")]
    pub comment: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ApproveResponse {
    pub accepted: bool,
    pub terminal: bool,
    /// zero-based level now expected to act, absent once terminal
    pub next_level: Option<u32>,
    #[schema(example = "approved_n1")]
    pub status: String,
}

/// Pending approvals for the caller
#[utoipa::path(
    get,
    path = "/api/approvals/pending",
    params(PendingQuery),
    responses(
        (status = 200, description = "Requests waiting on the caller", body = Vec<PendingResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Approvals"
)]
pub async fn list_pending(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    query: web::Query<PendingQuery>,
) -> actix_web::Result<impl Responder> {
    match query.kind {
        Some(kind) => auth.require_approval_access(kind)?,
        None => {
            for kind in RequestKind::iter() {
                auth.require_approval_access(kind)?;
            }
        }
    }

    let pending = engine.list_pending(&auth.actor(), query.kind).await?;
    let body: Vec<PendingResponse> = pending.into_iter().map(PendingResponse::from).collect();

    Ok(HttpResponse::Ok().json(body))
}

/// Terminal requests the caller decided on
#[utoipa::path(
    get,
    path = "/api/approvals/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Caller's decisions, newest first", body = Vec<HistoryResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Approvals"
)]
pub async fn list_history(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    for kind in RequestKind::iter() {
        auth.require_approval_access(kind)?;
    }

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = engine.list_history(&auth.actor(), limit).await?;
    let body: Vec<HistoryResponse> = history.into_iter().map(HistoryResponse::from).collect();

    Ok(HttpResponse::Ok().json(body))
}

/// Approve the level a request is waiting on
#[utoipa::path(
    put,
    path = "/api/approvals/{kind}/{id}/approve",
    params(
        ("kind" = RequestKind, Path, description = "leave, overtime or correction"),
        ("id" = u64, Path, description = "ID of the request to approve")
    ),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Approval recorded", body = ApproveResponse),
        (status = 400, description = "Malformed body"),
        (status = 403, description = "Caller is not the expected approver"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already decided or changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Approvals"
)]
pub async fn approve(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<(RequestKind, u64)>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    let (kind, id) = path.into_inner();
    auth.require_approval_access(kind)?;

    let comment = decision_comment(&body)?;
    let outcome = engine.approve(kind, id, &auth.actor(), comment).await?;

    let response = match outcome {
        ApprovalOutcome::Escalated { next_level } => ApproveResponse {
            accepted: true,
            terminal: false,
            next_level: Some(next_level),
            status: format!("approved_n{}", next_level),
        },
        ApprovalOutcome::Completed => ApproveResponse {
            accepted: true,
            terminal: true,
            next_level: None,
            status: "approved".to_string(),
        },
    };

    Ok(HttpResponse::Ok().json(response))
}

/// The body is optional, but when one is sent it has to be a valid
/// `DecisionBody`.
fn decision_comment(body: &[u8]) -> Result<Option<String>, WorkflowError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let parsed: DecisionBody = serde_json::from_slice(body)
        .map_err(|e| WorkflowError::Validation(format!("Invalid request body: {}", e)))?;
    Ok(parsed.comment)
}

/// Reject a request at the level it is waiting on
#[utoipa::path(
    put,
    path = "/api/approvals/{kind}/{id}/reject",
    params(
        ("kind" = RequestKind, Path, description = "leave, overtime or correction"),
        ("id" = u64, Path, description = "ID of the request to reject")
    ),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Rejection recorded", body = Object, example = json!({
            "accepted": true,
            "status": "rejected"
        })),
        (status = 400, description = "Comment missing or malformed body"),
        (status = 403, description = "Caller is not the expected approver"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already decided or changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Approvals"
)]
pub async fn reject(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<(RequestKind, u64)>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    let (kind, id) = path.into_inner();
    auth.require_approval_access(kind)?;

    let comment = decision_comment(&body)?;
    engine.reject(kind, id, &auth.actor(), comment).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "accepted": true,
        "status": "rejected"
    })))
}

/// Re-run the attendance upsert of an approved correction (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/approvals/{kind}/{id}/reapply",
    params(
        ("kind" = RequestKind, Path, description = "must be correction"),
        ("id" = u64, Path, description = "ID of the approved request")
    ),
    responses(
        (status = 200, description = "Side effect re-applied", body = Object, example = json!({
            "message": "Correction re-applied"
        })),
        (status = 400, description = "Kind cannot be re-applied"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not approved")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Approvals"
)]
pub async fn reapply(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<(RequestKind, u64)>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (kind, id) = path.into_inner();

    engine.reapply(kind, id, &auth.actor()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Correction re-applied"
    })))
}

/// Request details with its decision trail
#[utoipa::path(
    get,
    path = "/api/approvals/{kind}/{id}",
    params(
        ("kind" = RequestKind, Path, description = "leave, overtime or correction"),
        ("id" = u64, Path, description = "ID of the request")
    ),
    responses(
        (status = 200, description = "Request found", body = RequestResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Approvals"
)]
pub async fn get_request(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<(RequestKind, u64)>,
) -> actix_web::Result<impl Responder> {
    let (kind, id) = path.into_inner();
    auth.require_approval_access(kind)?;

    let request = engine.load(kind, id).await?;

    let readable = auth.role.is_hr_or_admin()
        || auth.employee_id == Some(request.employee_id)
        || match auth.employee_id {
            Some(caller) => engine
                .chain_for(kind, request.employee_id)
                .await?
                .contains(caller),
            None => false,
        };
    if !readable {
        return Err(WorkflowError::Authorization(format!(
            "You may not view {} request #{}",
            kind, id
        ))
        .into());
    }

    Ok(HttpResponse::Ok().json(RequestResponse::from(request)))
}

/// Paginated requests of one kind
#[utoipa::path(
    get,
    path = "/api/approvals/{kind}",
    params(
        ("kind" = RequestKind, Path, description = "leave, overtime or correction"),
        RequestFilterQuery
    ),
    responses(
        (status = 200, description = "Paginated request list", body = RequestListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Approvals"
)]
pub async fn list_requests(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<RequestKind>,
    query: web::Query<RequestFilterQuery>,
) -> actix_web::Result<impl Responder> {
    let kind = path.into_inner();
    auth.require_approval_access(kind)?;

    // Employees only ever see their own requests
    let employee_id = if auth.role.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };

    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);

    let filter = RequestFilter {
        employee_id,
        status: query.status.clone(),
        page,
        per_page,
    };
    let result = engine.store().list(kind, &filter).await?;

    Ok(HttpResponse::Ok().json(RequestListResponse {
        data: result.data.into_iter().map(RequestResponse::from).collect(),
        page: u32::try_from(page).unwrap_or(u32::MAX),
        per_page: per_page as u32,
        total: result.total,
    }))
}
