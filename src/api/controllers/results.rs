use std::sync::Arc;

use actix_web::{http::header::ContentType, web::Data, HttpResponse, Responder};

use crate::report::LiveReport;

pub async fn page(report: Data<Arc<LiveReport>>) -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(report.render_html())
}

pub async fn list(report: Data<Arc<LiveReport>>) -> impl Responder {
    HttpResponse::Ok().json(report.rows())
}

pub async fn summary(report: Data<Arc<LiveReport>>) -> impl Responder {
    HttpResponse::Ok().json(report.summary())
}
