use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::ServerConfig;
use crate::routes::{get_languages_handler, json_error_handler, post_run_handler};
use crate::workspace::WorkspaceRegistry;

pub fn build_server(
    server_config: ServerConfig,
    registry: WorkspaceRegistry,
) -> std::io::Result<Server> {
    let registry = web::Data::new(registry);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .service(post_run_handler)
            .service(get_languages_handler)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(12345),
    ))?
    .run();

    Ok(server)
}
