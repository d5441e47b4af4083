use crate::api::leave_request::submitted;
use crate::auth::auth::AuthUser;
use crate::model::request::{RequestKind, RequestPayload};
use crate::workflow::WorkflowEngine;
use actix_web::{Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateOvertime {
    #[schema(example = "2026-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Between 0 (exclusive) and 24
    #[schema(example = 2.5)]
    pub hours: f64,
    #[schema(example = "release night")]
    pub reason: Option<String>,
}

/// Submit an overtime request. Only the first escalation level decides it.
#[utoipa::path(
    post,
    path = "/api/overtime",
    request_body = CreateOvertime,
    responses(
        (status = 201, description = "Overtime request submitted", body = Object, example = json!({
            "message": "overtime request submitted",
            "id": 1,
            "status": "pending"
        })),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "No approval chain configured")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Overtime"
)]
pub async fn create_overtime(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    payload: web::Json<CreateOvertime>,
) -> actix_web::Result<impl Responder> {
    auth.require_approval_access(RequestKind::Overtime)?;
    auth.require_employee()?;

    let body = payload.into_inner();
    let request = engine
        .submit(
            &auth.actor(),
            RequestPayload::Overtime {
                date: body.date,
                hours: body.hours,
                reason: body.reason,
            },
        )
        .await?;

    Ok(submitted(RequestKind::Overtime, request.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{app, bearer};
    use crate::model::role::Role;
    use crate::workflow::engine::tests::{EMPLOYEE, M0, two_level_setup};
    use actix_web::test;

    #[actix_web::test]
    async fn first_level_approval_completes_overtime() {
        let (_store, engine) = two_level_setup().await;
        let app = test::init_service(app(web::Data::new(engine))).await;

        let req = test::TestRequest::post()
            .uri("/api/overtime")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(serde_json::json!({ "date": "2026-05-09", "hours": 3.0 }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = resp["id"].as_u64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/api/approvals/overtime/{}/approve", id))
            .insert_header(bearer(M0, Role::Employee))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["terminal"], true);
        assert_eq!(resp["status"], "approved");
    }

    #[actix_web::test]
    async fn hours_out_of_range_are_rejected() {
        let (_store, engine) = two_level_setup().await;
        let app = test::init_service(app(web::Data::new(engine))).await;

        let req = test::TestRequest::post()
            .uri("/api/overtime")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(serde_json::json!({ "date": "2026-05-09", "hours": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
