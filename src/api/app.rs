use std::{net::SocketAddr, sync::Arc};

use actix_cors::Cors;
use actix_web::{dev::Server, web, App, HttpServer};
use tracing::info;

use crate::report::LiveReport;

use super::routers::routers;

/// Binds the report server. The returned server must be awaited (or
/// spawned) to start serving.
pub fn app(report: Arc<LiveReport>, addr: SocketAddr) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(report.clone()))
            .configure(routers)
    })
    .workers(1)
    .disable_signals()
    .bind(addr)?;

    info!("report server running at http://{}", addr);
    Ok(server.run())
}
