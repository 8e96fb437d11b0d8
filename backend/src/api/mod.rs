use actix_web::web;

pub mod assignments;

pub fn config(cfg: &mut web::ServiceConfig) {
    // Assignment engine routes
    cfg.service(
        web::scope("/api/assignments")
            .service(assignments::assign_shift)
            .service(assignments::run_batch)
            .service(assignments::shift_issues)
            .service(assignments::get_config),
    );
}
