use std::net::TcpListener;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use crate::configuration::Settings;
use crate::env_store::EnvStore;
use crate::routes;

/// Route table of the management plane. Shared between the production
/// server and the integration tests.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health_check").route(web::get().to(routes::health_check)))
        .service(web::resource("/api/stacks").route(web::get().to(routes::stack::list)))
        .service(
            web::resource("/api/stacks/{name}")
                .route(web::get().to(routes::stack::get))
                .route(web::put().to(routes::stack::put))
                .route(web::delete().to(routes::stack::delete)),
        )
        .service(
            web::resource("/api/stacks/{name}/up")
                .route(web::put().to(routes::stack::up))
                .route(web::post().to(routes::stack::up)),
        )
        .service(
            web::resource("/api/stacks/{name}/down")
                .route(web::put().to(routes::stack::down))
                .route(web::post().to(routes::stack::down)),
        )
        .service(
            web::resource("/api/stacks/{name}/start")
                .route(web::put().to(routes::stack::start))
                .route(web::post().to(routes::stack::start)),
        )
        .service(
            web::resource("/api/stacks/{name}/stop")
                .route(web::put().to(routes::stack::stop))
                .route(web::post().to(routes::stack::stop)),
        )
        .service(web::resource("/api/stacks/{name}/logs").route(web::get().to(routes::stack::logs)))
        .service(
            web::resource("/api/stacks/{name}/enrich")
                .route(web::post().to(routes::stack::enrich)),
        );
}

/// Assemble the HTTP surface. Session authentication wraps this app in
/// the external middleware; everything here assumes an authenticated
/// caller.
pub fn run(
    listener: TcpListener,
    settings: Settings,
    store: EnvStore,
) -> Result<Server, std::io::Error> {
    let settings = web::Data::new(settings);
    let store = web::Data::new(Mutex::new(store));
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(configure_app)
            .app_data(settings.clone())
            .app_data(store.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
