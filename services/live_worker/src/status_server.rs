use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use log::info;
use serde_json::json;
use sqlx::PgPool;

use crate::reconciler;
use crate::tracker::LiveTracker;

async fn health() -> impl Responder {
    HttpResponse::Ok()
        .content_type("application/json")
        .body(r#"{"status": "Ok"}"#)
}

#[get("/tracker/status")]
async fn tracker_status() -> impl Responder {
    match LiveTracker::global() {
        Some(tracker) => HttpResponse::Ok().json(tracker.status().await),
        None => HttpResponse::ServiceUnavailable().json(json!({
            "status": "error",
            "message": "live tracker not initialized"
        })),
    }
}

#[get("/reconciler/health")]
async fn reconciler_health(db_pool: web::Data<PgPool>) -> impl Responder {
    match reconciler::reconciler_health(db_pool.get_ref()).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "status": "error",
            "message": format!("failed to read reconciler health: {}", e)
        })),
    }
}

/// Read-only operator surface. The CRUD/admin API lives elsewhere; this
/// app only exposes the two health reads and never mutates anything.
pub async fn run_status_server(pool: PgPool, port: u16) -> std::io::Result<()> {
    info!("status server listening on 127.0.0.1:{}", port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .service(tracker_status)
            .service(reconciler_health)
            .route("/health", web::get().to(health))
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}
