use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::parser::{self, ParsedReminder};
use crate::store::StoreError;
use crate::store::models::{NewReminder, Reminder};
use crate::{AppState, STUB_USER_ID, local_now};

pub async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub parsed: Option<ParsedReminder>,
}

/// Live preview while the user types: the full resolve chain, null when
/// nothing can be extracted. The client skips requests under 3 characters;
/// the handler itself accepts anything.
#[axum::debug_handler]
pub async fn parse_preview(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> Json<ParseResponse> {
    debug!("Parsing preview text: {}", request.text);
    let parsed = parser::resolve(state.provider.as_ref(), &request.text, local_now()).await;
    Json(ParseResponse { parsed })
}

/// Creates a reminder from the caller-confirmed payload. The plan gate is
/// reported in-band (the UI turns it into the upgrade modal), other store
/// failures are a plain 500.
#[axum::debug_handler]
pub async fn create_reminder(
    State(state): State<AppState>,
    Json(new): Json<NewReminder>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    match state.store.create_reminder(STUB_USER_ID, new).await {
        Ok(reminder) => Ok((
            StatusCode::CREATED,
            Json(json!({ "success": true, "reminder": reminder })),
        )),
        Err(StoreError::FreePlanLimit) => Ok((
            StatusCode::OK,
            Json(json!({
                "success": false,
                "error": "FREE_PLAN_LIMIT",
                "message": "Você atingiu o limite de 10 lembretes no plano gratuito. \
                            Faça upgrade para o plano PRO!",
            })),
        )),
        Err(err) => {
            error!("Failed to create reminder: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[axum::debug_handler]
pub async fn list_reminders(
    State(state): State<AppState>,
) -> Result<Json<Vec<Reminder>>, StatusCode> {
    state
        .store
        .pending_reminders(STUB_USER_ID)
        .await
        .map(Json)
        .map_err(|err| {
            error!("Failed to list reminders: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[axum::debug_handler]
pub async fn delete_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    match state.store.delete_reminder(STUB_USER_ID, &id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            error!("Failed to delete reminder: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
