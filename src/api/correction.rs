use crate::api::leave_request::submitted;
use crate::auth::auth::AuthUser;
use crate::model::request::{RequestKind, RequestPayload};
use crate::workflow::WorkflowEngine;
use actix_web::{Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateCorrection {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Omit to keep the recorded check-in
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub requested_check_in: Option<NaiveTime>,
    /// Omit to keep the recorded check-out
    #[schema(example = "17:30:00", value_type = Option<String>)]
    pub requested_check_out: Option<NaiveTime>,
    #[schema(example = "badge reader was down")]
    pub reason: String,
}

/// Submit an attendance correction. Once fully approved the requested
/// times are written onto the attendance record of `date`.
#[utoipa::path(
    post,
    path = "/api/corrections",
    request_body = CreateCorrection,
    responses(
        (status = 201, description = "Correction request submitted", body = Object, example = json!({
            "message": "correction request submitted",
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
    tag = "Corrections"
)]
pub async fn create_correction(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    payload: web::Json<CreateCorrection>,
) -> actix_web::Result<impl Responder> {
    auth.require_approval_access(RequestKind::Correction)?;
    auth.require_employee()?;

    let body = payload.into_inner();
    let request = engine
        .submit(
            &auth.actor(),
            RequestPayload::Correction {
                date: body.date,
                requested_check_in: body.requested_check_in,
                requested_check_out: body.requested_check_out,
                reason: body.reason,
            },
        )
        .await?;

    Ok(submitted(RequestKind::Correction, request.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{app, bearer};
    use crate::model::role::Role;
    use crate::workflow::engine::tests::{EMPLOYEE, M0, M1, two_level_setup};
    use actix_web::test;

    #[actix_web::test]
    async fn approved_correction_shows_up_in_attendance_and_can_be_reapplied() {
        let (_store, engine) = two_level_setup().await;
        let app = test::init_service(app(web::Data::new(engine))).await;

        let req = test::TestRequest::post()
            .uri("/api/corrections")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(serde_json::json!({
                "date": "2026-05-11",
                "requested_check_in": "09:00:00",
                "reason": "badge reader down"
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = resp["id"].as_u64().unwrap();

        for approver in [M0, M1] {
            let req = test::TestRequest::put()
                .uri(&format!("/api/approvals/correction/{}/approve", id))
                .insert_header(bearer(approver, Role::Employee))
                .set_json(serde_json::json!({}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200);
        }

        let req = test::TestRequest::get()
            .uri("/api/attendance/2026-05-11")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["check_in"], "09:00:00");
        assert_eq!(resp["source"], "correction");

        // Employees cannot trigger a re-run, HR can
        let req = test::TestRequest::post()
            .uri(&format!("/api/approvals/correction/{}/reapply", id))
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::post()
            .uri(&format!("/api/approvals/correction/{}/reapply", id))
            .insert_header(bearer(M1, Role::Hr))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }

    #[actix_web::test]
    async fn blank_reason_is_rejected() {
        let (_store, engine) = two_level_setup().await;
        let app = test::init_service(app(web::Data::new(engine))).await;

        let req = test::TestRequest::post()
            .uri("/api/corrections")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(serde_json::json!({
                "date": "2026-05-11",
                "requested_check_out": "18:00:00",
                "reason": "  "
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }
}
