use std::{env, path::PathBuf, sync::Arc};

use anyhow::Result;
use axum::Router;
use axum::routing::{delete, get, post};
use dotenv::dotenv;
use lembrete_bot::llm::Provider;
use lembrete_bot::llm::openai::OpenAiHttpClient;
use lembrete_bot::store::ReminderStore;
use lembrete_bot::{AppState, STUB_USER_ID, routes};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Error)]
enum MissingEnvironmentVariable {
    #[error("OPENAI_API_TOKEN environment variable must be set")]
    OpenAiApiToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let api_token =
        env::var("OPENAI_API_TOKEN").map_err(|_| MissingEnvironmentVariable::OpenAiApiToken)?;
    let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let client = match env::var("OPENAI_API_ENDPOINT") {
        Ok(endpoint) => OpenAiHttpClient::with_base_url(&api_token, &model, &endpoint),
        Err(_) => OpenAiHttpClient::new(&api_token, &model),
    };
    let provider: Arc<Provider> = Arc::new(client);
    info!("Using model {}", model);

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "lembretes.db".to_string());
    let store = Arc::new(ReminderStore::open(&PathBuf::from(db_path))?);
    store.ensure_user(STUB_USER_ID).await?;

    let state = AppState { provider, store };

    let app = Router::new()
        .route("/_health", get(routes::health))
        .route("/parse", post(routes::parse_preview))
        .route(
            "/reminders",
            post(routes::create_reminder).get(routes::list_reminders),
        )
        .route("/reminders/{id}", delete(routes::delete_reminder))
        .with_state(state);

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
