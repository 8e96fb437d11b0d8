use crate::{error::AssignError, services::engine::AssignmentEngine};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Deserialize, Default)]
pub struct BatchRequest {
    #[serde(default)]
    pub days_ahead: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

// ============================================================================
// Endpoints
// ============================================================================

/// Fill the open seats of one shift
#[post("/shifts/{id}")]
pub async fn assign_shift(
    engine: web::Data<AssignmentEngine>,
    path: web::Path<i32>,
) -> impl Responder {
    let shift_id = path.into_inner();
    let engine = engine.into_inner();

    let result = match web::block(move || engine.assign_shift(shift_id)).await {
        Ok(r) => r,
        Err(_) => return HttpResponse::InternalServerError().body("Assignment worker failed"),
    };

    if result.ok {
        HttpResponse::Ok().json(result)
    } else if result.not_found {
        HttpResponse::NotFound().json(result)
    } else {
        HttpResponse::InternalServerError().json(result)
    }
}

/// Run the batch over the configured horizon (overridable in the body)
#[post("/batch")]
pub async fn run_batch(
    engine: web::Data<AssignmentEngine>,
    body: Option<web::Json<BatchRequest>>,
) -> impl Responder {
    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    let engine = engine.into_inner();

    let result =
        match web::block(move || engine.run_batch(request.days_ahead, request.limit)).await {
            Ok(r) => r,
            Err(_) => return HttpResponse::InternalServerError().body("Batch worker failed"),
        };

    if result.ok {
        HttpResponse::Ok().json(result)
    } else {
        HttpResponse::InternalServerError().json(result)
    }
}

/// Pre-publication checks for a shift
#[get("/shifts/{id}/issues")]
pub async fn shift_issues(
    engine: web::Data<AssignmentEngine>,
    path: web::Path<i32>,
) -> impl Responder {
    let shift_id = path.into_inner();
    let engine = engine.into_inner();

    match web::block(move || engine.validate_shift(shift_id)).await {
        Ok(Ok(issues)) => HttpResponse::Ok().json(serde_json::json!({
            "shift_id": shift_id,
            "valid": issues.is_empty(),
            "issues": issues.iter().map(|i| {
                serde_json::json!({
                    "key": i.kind.key(),
                    "description": i.description
                })
            }).collect::<Vec<_>>()
        })),
        Ok(Err(AssignError::ShiftNotFound(id))) => {
            HttpResponse::NotFound().body(format!("Shift {} not found", id))
        }
        Ok(Err(e)) => {
            log::error!("Validation of shift {} failed: {}", shift_id, e);
            HttpResponse::InternalServerError().body("Database error")
        }
        Err(_) => HttpResponse::InternalServerError().body("Validation worker failed"),
    }
}

/// Effective engine configuration
#[get("/config")]
pub async fn get_config(engine: web::Data<AssignmentEngine>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "config": engine.config(),
        "capabilities": engine.capabilities()
    }))
}
