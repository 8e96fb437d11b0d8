use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};

use shift_assigner::api;
use shift_assigner::config::EngineConfig;
use shift_assigner::db;
use shift_assigner::services::engine::AssignmentEngine;

#[get("/")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "Shift Assigner",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = EngineConfig::from_env();

    // DB Pool initialization
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::init_pool(&database_url).map_err(std::io::Error::other)?;

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    // Schema probe runs once here, blocking is fine before the server starts
    let engine = web::Data::new(AssignmentEngine::new(pool, config));

    log::info!("Starting Shift Assigner at http://{}", bind_addr);
    log::info!(
        "Traces go to {}, timezone {}",
        engine.config().trace_dir.display(),
        engine.config().timezone
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(engine.clone())
            .service(health_check)
            .configure(api::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}
