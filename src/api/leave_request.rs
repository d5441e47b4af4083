use crate::auth::auth::AuthUser;
use crate::model::leave_balance::{LeaveBalance, LeaveType};
use crate::model::request::{RequestKind, RequestPayload};
use crate::workflow::WorkflowEngine;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    /// Defaults to the inclusive number of calendar days
    #[schema(example = 3.0)]
    pub days_requested: Option<f64>,
    #[schema(example = "family trip")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct BalanceQuery {
    /// Calendar year, defaults to the current one
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveBalanceResponse {
    #[schema(example = 2026)]
    pub year: i32,
    pub balances: Vec<LeaveBalance>,
}

/// Shared body for every submission endpoint.
pub(crate) fn submitted(kind: RequestKind, id: u64) -> HttpResponse {
    HttpResponse::Created().json(serde_json::json!({
        "message": format!("{} request submitted", kind),
        "id": id,
        "status": "pending"
    }))
}

/* =========================
Create leave request
========================= */
/// Swagger doc for create_leave endpoint
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "leave request submitted",
            "id": 1,
            "status": "pending"
         })
        ),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "No approval chain configured")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    auth.require_approval_access(RequestKind::Leave)?;
    auth.require_employee()?;

    let body = payload.into_inner();
    let request = engine
        .submit(
            &auth.actor(),
            RequestPayload::leave(
                body.leave_type,
                body.start_date,
                body.end_date,
                body.days_requested,
                body.reason,
            ),
        )
        .await?;

    Ok(submitted(RequestKind::Leave, request.id))
}

/// Leave days taken by the caller, per leave type
#[utoipa::path(
    get,
    path = "/api/leave/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Days taken per leave type", body = LeaveBalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_balance(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let year = query.year.unwrap_or_else(|| Utc::now().year());

    let balances = engine.store().leave_balances(employee_id, year).await?;

    Ok(HttpResponse::Ok().json(LeaveBalanceResponse { year, balances }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{app, bearer};
    use crate::model::role::Role;
    use crate::workflow::engine::tests::{EMPLOYEE, M0, M1, actor_for, two_level_setup};
    use actix_web::test;

    #[actix_web::test]
    async fn submit_then_balance_after_full_approval() {
        let (store, engine) = two_level_setup().await;
        let engine = web::Data::new(engine);
        let app = test::init_service(app(engine.clone())).await;

        let req = test::TestRequest::post()
            .uri("/api/leave")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(serde_json::json!({
                "start_date": "2026-05-04",
                "end_date": "2026-05-06",
                "leave_type": "annual"
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["status"], "pending");
        let id = resp["id"].as_u64().unwrap();

        for approver in [M0, M1] {
            engine
                .approve(RequestKind::Leave, id, &actor_for(approver), None)
                .await
                .unwrap();
        }
        assert_eq!(store.taken(EMPLOYEE, LeaveType::Annual, 2026).await, 3.0);

        let req = test::TestRequest::get()
            .uri("/api/leave/balance?year=2026")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["year"], 2026);
        assert_eq!(resp["balances"][0]["leave_type"], "annual");
        assert_eq!(resp["balances"][0]["taken"], 3.0);
    }

    #[actix_web::test]
    async fn inverted_dates_are_a_validation_error() {
        let (_store, engine) = two_level_setup().await;
        let app = test::init_service(app(web::Data::new(engine))).await;

        let req = test::TestRequest::post()
            .uri("/api/leave")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(serde_json::json!({
                "start_date": "2026-05-06",
                "end_date": "2026-05-04",
                "leave_type": "sick"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["kind"], "validation_error");
    }
}
