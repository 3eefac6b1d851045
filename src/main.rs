use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use dotenv::dotenv;
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod assistant;
mod config;
mod db;
mod models;
#[cfg(test)]
mod test_support;
mod web;

use assistant::{AssistantError, AssistantService, OpenAiAssistantClient};
use config::AssistantConfig;
use db::{setup_db, DBConnection, DBError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Resource not found")]
    NotFound,

    #[error("Internal server error")]
    InternalServerError,

    #[error("The AI assistant is not properly configured, please contact support")]
    AssistantNotConfigured,

    #[error("The AI assistant is taking longer than expected, please try again")]
    AssistantTimeout,

    #[error("The AI assistant is currently unavailable, please try again later")]
    AssistantUnavailable,

    #[error("The AI assistant is currently unavailable: {0}")]
    AssistantRunFailed(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AssistantNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AssistantTimeout => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AssistantUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AssistantRunFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<DBError> for ApiError {
    fn from(err: DBError) -> Self {
        error!("Database error: {:?}", err);
        ApiError::InternalServerError
    }
}

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::Configuration(_) => ApiError::AssistantNotConfigured,
            AssistantError::RunTimeout => ApiError::AssistantTimeout,
            AssistantError::RunFailed(detail) => ApiError::AssistantRunFailed(detail),
            AssistantError::RunEnded(status) => ApiError::AssistantRunFailed(status),
            AssistantError::ThreadCreation(_)
            | AssistantError::MalformedResponse
            | AssistantError::Api { .. }
            | AssistantError::Http(_) => ApiError::AssistantUnavailable,
            AssistantError::Database(e) => ApiError::from(e),
        }
    }
}

pub struct AppState {
    pub assistant: Arc<AssistantService>,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            error!("DATABASE_URL must be set");
            std::process::exit(1);
        }
    };

    let db = match setup_db(&database_url) {
        Ok(db) => Arc::new(db) as Arc<dyn DBConnection + Send + Sync>,
        Err(e) => {
            error!("Failed to set up database pool: {}", e);
            std::process::exit(1);
        }
    };

    let assistant_config = match AssistantConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Assistant configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let client = match OpenAiAssistantClient::new(&assistant_config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build assistant client: {}", e);
            std::process::exit(1);
        }
    };

    let service = AssistantService::new(db, client, &assistant_config);
    let app_state = Arc::new(AppState {
        assistant: Arc::new(service),
    });

    let app = web::router(app_state).layer(CorsLayer::permissive());

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
