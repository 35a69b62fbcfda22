//! Configuration-change event ingestion: `POST /events`.
//!
//! The stream delivery (bus rule, queue subscription, or forwarding
//! shim) posts each notification envelope here. Filtered events are
//! acknowledged with a `skipped` status so the deliverer does not
//! retry them.

use axum::{extract::State, Json};
use omnissm_manager::{ConfigurationEvent, ManagerError, Outcome};
use serde::Serialize;
use std::sync::Arc;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub status: &'static str,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<EventResponse>, ApiError> {
    let event: ConfigurationEvent =
        serde_json::from_str(&body).map_err(|_| ApiError::InvalidRequest("malformed json"))?;

    let outcome = state.processor.process(&event).await.map_err(|err| match err {
        ManagerError::UnknownMessageType(_) => ApiError::InvalidRequest("unknown message type"),
        other => ApiError::Internal(other.into()),
    })?;

    let status = match outcome {
        Outcome::Updated => "updated",
        Outcome::Deleted => "deleted",
        Outcome::Skipped(_) => "skipped",
    };
    Ok(Json(EventResponse { status }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_entry, test_state, TEST_ACCOUNT};
    use axum::http::StatusCode;

    fn change_event_body(status: &str, tags: serde_json::Value) -> String {
        serde_json::json!({
            "source": "aws.config",
            "account": TEST_ACCOUNT,
            "region": "us-east-1",
            "detail": {
                "messageType": "ConfigurationItemChangeNotification",
                "configurationItem": {
                    "resourceType": "AWS::EC2::Instance",
                    "resourceId": "i-1234",
                    "configurationItemStatus": status,
                    "configurationItemCaptureTime": "2018-05-02T16:20:55Z",
                    "awsAccountId": TEST_ACCOUNT,
                    "awsRegion": "us-east-1",
                    "configuration": {
                        "imageId": "ami-12345678",
                        "instanceType": "t2.small",
                        "state": {"code": 16, "name": "running"}
                    },
                    "tags": tags
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_discovered_event_updates_instance() {
        let (state, registry) = test_state(TEST_ACCOUNT);
        let entry = seed_entry(&registry, "i-1234", "mi-1234").await;

        let body = change_event_body(
            "ResourceDiscovered",
            serde_json::json!({"App": "x", "Secret": "y"}),
        );
        let response = ingest(State(state.clone()), body).await.unwrap().0;
        assert_eq!(response.status, "updated");

        let stored = state.manager.get(&entry.id).await.unwrap().unwrap();
        assert!(stored.is_tagged && stored.is_inventoried && stored.enriched);
    }

    #[tokio::test]
    async fn test_foreign_source_is_skipped() {
        let (state, _registry) = test_state(TEST_ACCOUNT);
        let body = change_event_body("ResourceDiscovered", serde_json::json!({}))
            .replace("aws.config", "aws.ec2");
        let response = ingest(State(state), body).await.unwrap().0;
        assert_eq!(response.status, "skipped");
    }

    #[tokio::test]
    async fn test_deleted_event_tears_down_instance() {
        let (state, registry) = test_state(TEST_ACCOUNT);
        let entry = seed_entry(&registry, "i-1234", "mi-1234").await;

        let body = change_event_body("ResourceDeleted", serde_json::json!({}));
        let response = ingest(State(state.clone()), body).await.unwrap().0;
        assert_eq!(response.status, "deleted");
        assert!(state.manager.get(&entry.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_message_type_is_rejected() {
        let (state, _registry) = test_state(TEST_ACCOUNT);
        let body = change_event_body("ResourceDiscovered", serde_json::json!({}))
            .replace("ConfigurationItemChangeNotification", "ScheduledNotification");
        let err = ingest(State(state), body).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "unknown message type");
    }

    #[tokio::test]
    async fn test_malformed_event_is_rejected() {
        let (state, _registry) = test_state(TEST_ACCOUNT);
        let err = ingest(State(state), "not json".to_string()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "malformed json");
    }
}
