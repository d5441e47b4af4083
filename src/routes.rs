use crate::{
    api::{approval, attendance, correction, leave_request, manager_link, overtime},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{Scope, web};

// Helper to build a per-scope limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    // zero period or burst makes finish() return None; both are at least 1 here
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

/// Every authenticated endpoint under `prefix`. Authentication happens per
/// handler through the `AuthUser` extractor.
pub fn api_scope(prefix: &str) -> Scope {
    web::scope(prefix)
        .service(
            web::scope("/approvals")
                // fixed segments first so they never parse as a kind
                .service(web::resource("/pending").route(web::get().to(approval::list_pending)))
                .service(web::resource("/history").route(web::get().to(approval::list_history)))
                // /approvals/{kind}
                .service(web::resource("/{kind}").route(web::get().to(approval::list_requests)))
                // /approvals/{kind}/{id}
                .service(
                    web::resource("/{kind}/{id}").route(web::get().to(approval::get_request)),
                )
                .service(
                    web::resource("/{kind}/{id}/approve").route(web::put().to(approval::approve)),
                )
                .service(
                    web::resource("/{kind}/{id}/reject").route(web::put().to(approval::reject)),
                )
                .service(
                    web::resource("/{kind}/{id}/reapply")
                        .route(web::post().to(approval::reapply)),
                ),
        )
        .service(
            web::scope("/leave")
                // /leave
                .service(web::resource("").route(web::post().to(leave_request::create_leave)))
                // /leave/balance
                .service(
                    web::resource("/balance").route(web::get().to(leave_request::leave_balance)),
                ),
        )
        .service(web::resource("/overtime").route(web::post().to(overtime::create_overtime)))
        .service(
            web::resource("/corrections").route(web::post().to(correction::create_correction)),
        )
        .service(
            web::resource("/attendance/{date}").route(web::get().to(attendance::get_attendance)),
        )
        .service(
            web::resource("/employees/{id}/managers")
                .route(web::get().to(manager_link::list_managers))
                .route(web::post().to(manager_link::assign_manager)),
        )
        .service(
            web::resource("/manager-links/{id}")
                .route(web::delete().to(manager_link::deactivate_link)),
        )
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    cfg.service(api_scope(&config.api_prefix).wrap(protected_limiter)); // rate limiting
}
