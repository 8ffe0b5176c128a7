#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod config;
mod db;
mod env;
mod error;
mod models;
mod response;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use auth::{bad_request, default_catcher, forbidden, not_found, unauthorized, unprocessable};
use config::AuthConfig;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_tracing};
use tracing::{error, info};

#[launch]
async fn rocket() -> _ {
    let loaded_files = match env::load_environment() {
        Ok(files) => files,
        Err(e) => panic!("Failed to load environment files: {:#}", e),
    };

    init_tracing();
    info!("Environment loaded from {:?}", loaded_files);

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid auth configuration: {:#}", e);
            panic!("Invalid auth configuration: {:#}", e);
        }
    };

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://coach_tracker.db?mode=rwc".into());

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    init_rocket(pool, config).await
}

pub async fn init_rocket(pool: SqlitePool, config: AuthConfig) -> Rocket<Build> {
    info!("Starting coach tracker");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount("/api", api::routes())
        .register(
            "/",
            catchers![
                unauthorized,
                forbidden,
                bad_request,
                unprocessable,
                not_found,
                default_catcher
            ],
        )
        .attach(TelemetryFairing)
}
