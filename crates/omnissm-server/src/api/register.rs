//! Registration endpoint: `POST /register` and `PATCH /register`.

use axum::{extract::State, Json};
use omnissm_identity::Document;
use omnissm_registry::RegistrationEntry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{error::ApiError, state::AppState};

/// Common request body for both methods. The `identity` and
/// `managed-id` spellings are accepted for compatibility with older
/// agents.
#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub provider: String,
    #[serde(default, alias = "identity")]
    pub document: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default, rename = "managedId", alias = "managed-id")]
    pub managed_id: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    #[serde(flatten)]
    pub entry: RegistrationEntry,
    #[serde(rename = "region", skip_serializing_if = "String::is_empty")]
    pub region: String,
}

fn parse_request(body: &str) -> Result<RegistrationRequest, ApiError> {
    serde_json::from_str(body)
        .map_err(omnissm_identity::IdentityError::MalformedJson)
        .map_err(ApiError::from)
}

fn verify_identity(state: &AppState, request: &RegistrationRequest) -> Result<Document, ApiError> {
    let document =
        state
            .verifier
            .verify(&request.document, &request.signature, &request.provider)?;
    if !state.whitelist.contains(&document.account_id) {
        return Err(ApiError::UnauthorizedAccount);
    }
    Ok(document)
}

/// POST /register: create-or-return.
///
/// Posting the same identity twice returns the original entry with the
/// original activation credentials.
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let request = parse_request(&body)?;
    let identity = verify_identity(&state, &request)?;

    let id = identity.registration_id();
    let entry = match state.manager.get(&id).await? {
        Some(entry) => {
            info!(id, name = %identity.name(), "existing registration entry found");
            entry
        }
        None => state.manager.register(&identity).await?,
    };

    Ok(Json(RegistrationResponse {
        entry,
        region: identity.region,
    }))
}

/// PATCH /register: bind the fleet-assigned managed id.
pub async fn update(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let request = parse_request(&body)?;
    let identity = verify_identity(&state, &request)?;

    let id = identity.registration_id();
    let entry = state.manager.get(&id).await?.ok_or(ApiError::NotFound)?;

    let entry = if request.managed_id.is_empty() {
        entry
    } else {
        state.manager.bind_managed_id(&id, &request.managed_id).await?
    };

    Ok(Json(RegistrationResponse {
        entry,
        region: String::new(),
    }))
}
