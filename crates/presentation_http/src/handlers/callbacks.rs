//! Partner callback handler
//!
//! Mounted behind signature verification; an unsigned request never gets here.

use axum::{Json, extract::Path};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Callback acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    pub status: &'static str,
    pub source: String,
}

/// Accept a signed callback from `source`
pub async fn receive_callback(
    Path(source): Path<String>,
    Json(payload): Json<Value>,
) -> Json<CallbackAck> {
    info!(source = %source, fields = payload.as_object().map_or(0, serde_json::Map::len), "Signed callback accepted");
    Json(CallbackAck {
        status: "accepted",
        source,
    })
}
