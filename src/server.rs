//! HTTP scan service
//!
//! `GET /health` for liveness and `POST /scan` taking
//! `{subject, from_addr, raw_headers, body}`. Missing or null fields are
//! read as empty text and URLs are extracted from the body.

use crate::analyzer::{AnalysisResult, Analyzer};
use crate::message::{extract_urls, ParsedMessage};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from_addr: Option<String>,
    #[serde(default)]
    pub raw_headers: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl ScanRequest {
    pub fn into_message(self) -> ParsedMessage {
        let body = self.body.unwrap_or_default();
        ParsedMessage {
            subject: self.subject.unwrap_or_default(),
            from_address: self.from_addr.unwrap_or_default(),
            raw_headers: self.raw_headers.unwrap_or_default(),
            urls: extract_urls(&body),
            body,
        }
    }
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer>,
}

pub fn router(analyzer: Arc<Analyzer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scan", post(scan))
        .with_state(AppState { analyzer })
}

/// Bind and serve until the process is stopped
pub async fn serve(analyzer: Arc<Analyzer>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Scan service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(analyzer)).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn scan(State(state): State<AppState>, Json(request): Json<ScanRequest>) -> Json<AnalysisResult> {
    let message = request.into_message();
    log::debug!(
        "Scan request: subject {:?}, {} URL(s)",
        message.subject,
        message.urls.len()
    );
    Json(state.analyzer.analyze(&message).await)
}
