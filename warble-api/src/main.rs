use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue},
};
use serde::Deserialize;
use server::{CookieConfig, ServerState};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warble_common::model::auth::TokenService;
use warble_db::client::{DbClient, DbError};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid CORS origin: {0}")]
    CorsOrigin(#[from] InvalidHeaderValue),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_max_connections")]
    database_max_connections: u32,
    access_token_secret: String,
    refresh_token_secret: String,
    #[serde(default = "default_cors_origin")]
    cors_origin: String,
    #[serde(default)]
    secure_cookies: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_owned()
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "warble_api=debug,\
                warble_db=debug,\
                warble_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

fn cors(origin: &str) -> Result<CorsLayer, InitError> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Could not listen for shutdown signal");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let db_client = DbClient::connect(&env.database_url, env.database_max_connections).await?;
    db_client.migrate().await?;

    let state = ServerState {
        db_client: Arc::new(db_client),
        tokens: Arc::new(TokenService::new(
            &env.access_token_secret,
            &env.refresh_token_secret,
        )),
        cookies: CookieConfig {
            secure: env.secure_cookies,
        },
    };

    let app = server::routes()
        .layer(cors(&env.cors_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
