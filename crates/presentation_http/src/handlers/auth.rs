//! Session handlers
//!
//! Served under `/api/v1/auth/`, which the default configuration rate limits
//! with the strict quota.

use axum::Json;
use serde::{Deserialize, Serialize};

/// Session request body
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    pub username: String,
}

/// Session response body
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub status: &'static str,
    pub username: String,
}

/// Open a session
pub async fn create_session(Json(request): Json<SessionRequest>) -> Json<SessionResponse> {
    Json(SessionResponse {
        status: "accepted",
        username: request.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_username() {
        let Json(resp) = create_session(Json(SessionRequest {
            username: "adjuster".to_string(),
        }))
        .await;
        assert_eq!(resp.status, "accepted");
        assert_eq!(resp.username, "adjuster");
    }
}
