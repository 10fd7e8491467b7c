use actix_web::web;

use super::controllers::results;

pub fn routers(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(results::page)).service(
        web::scope("/api")
            .route("/results", web::get().to(results::list))
            .route("/summary", web::get().to(results::summary)),
    );
}
