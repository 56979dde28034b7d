mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod seed;
mod services;
mod storage;
mod tracing_config;
mod utils;

use axum::http::{
    HeaderValue, Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use config::Config;
use db::DBClient;
use dotenv::dotenv;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use storage::MediaStorage;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: db::DBClient,
    pub storage: MediaStorage,
}

#[tokio::main]
async fn main() {
    // Dropping the guard flushes the file log, keep it for the whole run.
    let _guard = tracing_config::init_tracing();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);

    if let Err(err) = sqlx::migrate!("./migrations").run(db_client.pool()).await {
        tracing::error!("Failed to run migrations: {:?}", err);
        std::process::exit(1);
    }

    if std::env::args().nth(1).as_deref() == Some("seed") {
        let tags = seed::UniqueTagGenerator::new();
        let usernames = seed::UsernameGenerator::new();
        let seeder = seed::Seeder::new(&db_client, &tags, &usernames, seed::SeedCounts::default());

        match seeder.run(&mut StdRng::from_entropy()).await {
            Ok(summary) => {
                tracing::info!("Seeding finished: {:?}", summary);
                return;
            }
            Err(err) => {
                tracing::error!("Seeding failed: {}", err);
                std::process::exit(1);
            }
        }
    }

    let _scheduler = match db_client.start_expiry_task().await {
        Ok(sched) => Some(sched),
        Err(err) => {
            tracing::error!("Failed to start expiry scheduler: {:?}", err);
            None
        }
    };

    let origin = match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::error!("Invalid FRONTEND_URL {}: {}", config.frontend_url, err);
            std::process::exit(1);
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let storage = MediaStorage::new(&config.upload_dir, &config.public_url);

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db_client,
        storage,
    };

    let app = routes::create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await
    {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", err);
    }
}
