use actix_web::http::Method;
use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::Config;
use crate::routes::{get_languages_handler, json_error_handler, preflight_handler, run_handler};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_BIND_PORT: u16 = 5000;

/// Registers every route; shared by the server and the tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(
            web::resource("/run")
                .route(web::post().to(run_handler))
                .route(web::method(Method::OPTIONS).to(preflight_handler))
                .wrap(middleware::DefaultHeaders::new().add(("Access-Control-Allow-Origin", "*"))),
        )
        .service(get_languages_handler);
}

pub fn build_server(config: Config) -> std::io::Result<Server> {
    let bind_address = config
        .server
        .bind_address
        .clone()
        .unwrap_or(DEFAULT_BIND_ADDRESS.to_string());
    let bind_port = config.server.bind_port.unwrap_or(DEFAULT_BIND_PORT);
    let config = web::Data::new(config);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((bind_address.as_str(), bind_port))?
    .run();

    log::info!("Listening on {bind_address}:{bind_port}");
    Ok(server)
}
