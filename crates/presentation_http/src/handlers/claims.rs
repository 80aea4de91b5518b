//! Claim intake handlers
//!
//! Payloads reach these handlers only after the security layer accepted them,
//! so they acknowledge what they received without further checks.

use axum::{Json, extract::Path, http::StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Acknowledgement returned for claim submissions and updates
#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub claim: Value,
}

/// Current status of a claim
#[derive(Debug, Clone, Serialize)]
pub struct ClaimStatus {
    pub id: String,
    pub status: &'static str,
}

/// Accept a new claim
pub async fn submit_claim(Json(claim): Json<Value>) -> (StatusCode, Json<ClaimReceipt>) {
    (
        StatusCode::ACCEPTED,
        Json(ClaimReceipt {
            status: "received",
            id: None,
            claim,
        }),
    )
}

/// Look up a claim
pub async fn get_claim(Path(id): Path<String>) -> Json<ClaimStatus> {
    Json(ClaimStatus {
        id,
        status: "pending",
    })
}

/// Replace a claim's contents
pub async fn update_claim(Path(id): Path<String>, Json(claim): Json<Value>) -> Json<ClaimReceipt> {
    Json(ClaimReceipt {
        status: "updated",
        id: Some(id),
        claim,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn submit_echoes_claim() {
        let (status, Json(receipt)) = submit_claim(Json(json!({"policy": "P-1"}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(receipt.status, "received");
        assert_eq!(receipt.claim["policy"], "P-1");
    }

    #[test]
    fn receipt_omits_missing_id() {
        let receipt = ClaimReceipt {
            status: "received",
            id: None,
            claim: json!({}),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert!(json.get("id").is_none());
    }

    #[tokio::test]
    async fn update_keeps_id() {
        let Json(receipt) = update_claim(Path("C-9".to_string()), Json(json!({"amount": 10}))).await;
        assert_eq!(receipt.id.as_deref(), Some("C-9"));
        assert_eq!(receipt.status, "updated");
    }
}
