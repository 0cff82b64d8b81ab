//! Read-only catalog endpoints.
//!
//! `/tools` serves the legacy document exactly as it was loaded; modern
//! definitions are summarized separately and never expose their arguments.

use super::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DefinitionSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scans: Vec<ScanSummary>,
}

/// GET /tools: legacy catalog, byte-for-byte
pub async fn handle_tools(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.catalog.snapshot();
    (
        [(header::CONTENT_TYPE, "application/json")],
        snapshot.legacy.raw().to_owned(),
    )
}

/// GET /tools/definitions: modern definitions, ids and scan names only
pub async fn handle_tool_definitions(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.catalog.snapshot();
    let tools: Vec<DefinitionSummary> = snapshot
        .definitions
        .iter()
        .map(|definition| DefinitionSummary {
            id: definition.id.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            scans: definition
                .scans
                .iter()
                .map(|(name, scan)| ScanSummary {
                    name: name.clone(),
                    description: scan.description.clone(),
                })
                .collect(),
        })
        .collect();

    Json(serde_json::json!({ "tools": tools }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{test_state, LEGACY_FIXTURE};
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn tools_returns_raw_legacy_document_unchanged() {
        let state = test_state("http://127.0.0.1:9");
        let response = handle_tools(State(state)).await.into_response();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(std::str::from_utf8(&body).unwrap(), LEGACY_FIXTURE);
    }

    #[tokio::test]
    async fn definitions_listing_hides_arguments_and_profile() {
        let state = test_state("http://127.0.0.1:9");
        let response = handle_tool_definitions(State(state)).await.into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();

        let tools = parsed["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["id"], "nmap");
        let scan_names: Vec<&str> = tools[0]["scans"]
            .as_array()
            .unwrap()
            .iter()
            .map(|scan| scan["name"].as_str().unwrap())
            .collect();
        assert_eq!(scan_names, vec!["quick", "service"]);

        let text = String::from_utf8_lossy(&body);
        assert!(!text.contains("-T4"));
        assert!(!text.contains("profile"));
    }
}
