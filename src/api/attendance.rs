use crate::auth::auth::AuthUser;
use crate::errors::WorkflowError;
use crate::model::attendance::Attendance;
use crate::workflow::WorkflowEngine;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Another employee's record (HR/Admin only)
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
}

/// Attendance record of one day
#[utoipa::path(
    get,
    path = "/api/attendance/{date}",
    params(
        ("date" = String, Path, description = "Day in YYYY-MM-DD"),
        AttendanceQuery
    ),
    responses(
        (status = 200, description = "Attendance found", body = Attendance),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No attendance recorded that day")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<NaiveDate>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    let date = path.into_inner();

    let employee_id = match query.employee_id {
        Some(other) if auth.employee_id != Some(other) => {
            auth.require_hr_or_admin()?;
            other
        }
        _ => auth.require_employee()?,
    };

    let record = engine
        .store()
        .attendance(employee_id, date)
        .await?
        .ok_or_else(|| {
            WorkflowError::NotFound(format!(
                "No attendance for employee {} on {}",
                employee_id, date
            ))
        })?;

    Ok(HttpResponse::Ok().json(record))
}
