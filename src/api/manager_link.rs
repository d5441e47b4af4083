use crate::auth::auth::AuthUser;
use crate::errors::WorkflowError;
use crate::model::manager_link::ManagerLink;
use crate::workflow::{ApprovalChain, WorkflowEngine};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct AssignManager {
    #[schema(example = 1001)]
    pub manager_id: u64,
    /// 0 approves first; assigning an occupied rank replaces its manager
    #[schema(example = 0)]
    pub rank: u32,
}

#[derive(Serialize, ToSchema)]
pub struct ManagerLinkResponse {
    /// Approval level this link currently resolves to
    #[schema(example = 0)]
    pub level: u32,
    pub link: ManagerLink,
    #[schema(example = "John Doe")]
    pub manager_name: Option<String>,
}

/// Active escalation chain of an employee as approvals resolve it, level 0 first
#[utoipa::path(
    get,
    path = "/api/employees/{id}/managers",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Active manager links", body = Vec<ManagerLinkResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager links"
)]
pub async fn list_managers(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    let directory = engine.directory();

    if !directory.employee_exists(employee_id).await? {
        return Err(WorkflowError::NotFound(format!("Employee {} not found", employee_id)).into());
    }

    let links = directory.manager_links(employee_id).await?;
    let chain = ApprovalChain::from_links(links.iter().cloned());

    let mut body = Vec::with_capacity(chain.len());
    for (level, member) in chain.members().iter().enumerate() {
        let Some(link) = links.iter().find(|l| l.id == member.link_id) else {
            continue;
        };
        let manager_name = directory.display_name(member.manager_id).await?;
        body.push(ManagerLinkResponse {
            level: level as u32,
            link: link.clone(),
            manager_name,
        });
    }

    Ok(HttpResponse::Ok().json(body))
}

/// Put a manager at an escalation rank of an employee
#[utoipa::path(
    post,
    path = "/api/employees/{id}/managers",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    request_body = AssignManager,
    responses(
        (status = 201, description = "Manager assigned", body = ManagerLink),
        (status = 400, description = "Employee cannot manage themselves"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee or manager not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager links"
)]
pub async fn assign_manager(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<u64>,
    payload: web::Json<AssignManager>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    let directory = engine.directory();

    if payload.manager_id == employee_id {
        return Err(
            WorkflowError::Validation("An employee cannot be their own manager".into()).into(),
        );
    }
    for id in [employee_id, payload.manager_id] {
        if !directory.employee_exists(id).await? {
            return Err(WorkflowError::NotFound(format!("Employee {} not found", id)).into());
        }
    }

    let link = directory
        .assign_manager(employee_id, payload.manager_id, payload.rank)
        .await?;

    tracing::info!(
        link_id = link.id,
        employee_id,
        manager_id = link.manager_id,
        rank = link.rank,
        assigned_by = auth.user_id,
        "Manager assigned"
    );

    Ok(HttpResponse::Created().json(link))
}

/// Remove a manager link from its chain
#[utoipa::path(
    delete,
    path = "/api/manager-links/{id}",
    params(
        ("id" = u64, Path, description = "Manager link ID")
    ),
    responses(
        (status = 200, description = "Link deactivated", body = Object, example = json!({
            "message": "Manager link deactivated"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No active link with this ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager links"
)]
pub async fn deactivate_link(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let link_id = path.into_inner();

    if !engine.directory().deactivate_link(link_id).await? {
        return Err(
            WorkflowError::NotFound(format!("Active manager link {} not found", link_id)).into(),
        );
    }

    tracing::info!(link_id, deactivated_by = auth.user_id, "Manager link deactivated");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Manager link deactivated"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{app, bearer};
    use crate::model::role::Role;
    use crate::workflow::engine::tests::{EMPLOYEE, M0, M1, OUTSIDER, two_level_setup};
    use actix_web::test;

    #[actix_web::test]
    async fn hr_replaces_a_rank_and_the_chain_follows() {
        let (_store, engine) = two_level_setup().await;
        let app = test::init_service(app(web::Data::new(engine))).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/employees/{}/managers", EMPLOYEE))
            .insert_header(bearer(M1, Role::Hr))
            .set_json(serde_json::json!({ "manager_id": OUTSIDER, "rank": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        let req = test::TestRequest::get()
            .uri(&format!("/api/employees/{}/managers", EMPLOYEE))
            .insert_header(bearer(M1, Role::Hr))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let managers: Vec<u64> = resp
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["link"]["manager_id"].as_u64().unwrap())
            .collect();
        assert_eq!(managers, vec![M0, OUTSIDER]);
        assert_eq!(resp[1]["manager_name"], "Otto Outside");
        assert_eq!(resp[1]["level"], 1);

        // A sparse rank still lands on the next level
        let req = test::TestRequest::post()
            .uri(&format!("/api/employees/{}/managers", EMPLOYEE))
            .insert_header(bearer(M1, Role::Hr))
            .set_json(serde_json::json!({ "manager_id": M1, "rank": 5 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);

        let req = test::TestRequest::get()
            .uri(&format!("/api/employees/{}/managers", EMPLOYEE))
            .insert_header(bearer(M1, Role::Hr))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.as_array().unwrap().len(), 3);
        assert_eq!(resp[2]["level"], 2);
        assert_eq!(resp[2]["link"]["rank"], 5);
        assert_eq!(resp[2]["link"]["manager_id"], M1);
    }

    #[actix_web::test]
    async fn self_management_and_employees_are_refused() {
        let (_store, engine) = two_level_setup().await;
        let app = test::init_service(app(web::Data::new(engine))).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/employees/{}/managers", EMPLOYEE))
            .insert_header(bearer(M1, Role::Admin))
            .set_json(serde_json::json!({ "manager_id": EMPLOYEE, "rank": 2 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri(&format!("/api/employees/{}/managers", EMPLOYEE))
            .insert_header(bearer(M0, Role::Employee))
            .set_json(serde_json::json!({ "manager_id": OUTSIDER, "rank": 2 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::delete()
            .uri("/api/manager-links/999")
            .insert_header(bearer(M1, Role::Hr))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }
}
