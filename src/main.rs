use actix_web::{middleware, web, App, HttpServer};

mod config;
mod db;
mod errors;
mod forms;
mod models;
mod query;
mod routes;
mod schema;
mod views;

use crate::config::Config;
use crate::db::Storage;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(std::io::Error::other)?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // set up database connection pool and bring the schema up to date
    let storage = Storage::connect(&config).map_err(std::io::Error::other)?;

    log::info!("starting HTTP server at http://{}:{}", config.host, config.port);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            // storage handle used with the web::Data<Storage> extractor
            .app_data(web::Data::new(storage.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
