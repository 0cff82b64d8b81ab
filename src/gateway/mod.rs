//! Axum-based HTTP gateway for tool invocation.
//!
//! - `GET /stream` resolves a tool request and relays executor output as SSE
//! - `GET /tools` and `GET /tools/definitions` expose the catalog read-only
//! - Request body size limits (64KB max)
//! - Request timeouts (30s) on handlers; streamed response bodies are not cut off

pub mod api;
pub mod sse;

use crate::catalog::{CatalogSnapshot, CatalogStore};
use crate::config::{Config, GatewayConfig};
use crate::executor::Forwarder;
use crate::security::is_public_bind;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB). Every route is a GET; anything larger is abuse.
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) until response headers are produced
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
    pub forwarder: Forwarder,
}

/// Run the HTTP gateway using axum.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    // ── Security: refuse public bind without explicit opt-in ──
    if is_public_bind(host) && !config.gateway.allow_public_bind {
        anyhow::bail!(
            "🛑 Refusing to bind to {host} — the gateway dispatches commands to the sandbox \
             executor and has no client authentication.\n\
             Fix: use --host 127.0.0.1 (default), or set\n\
             [gateway] allow_public_bind = true in toolgate.toml (NOT recommended)."
        );
    }

    let catalog = Arc::new(CatalogStore::open(&config.catalog)?);
    let forwarder = Forwarder::new(&config.executor)?;

    let bind_host = host.trim_start_matches('[').trim_end_matches(']');
    let listener = tokio::net::TcpListener::bind((bind_host, port))
        .await
        .with_context(|| format!("Failed to bind gateway to {host}:{port}"))?;
    let actual_port = listener.local_addr()?.port();
    let display_addr = format!("{host}:{actual_port}");

    spawn_reload_on_hangup(Arc::clone(&catalog));

    let snapshot = catalog.snapshot();
    println!("🛠️  toolgate listening on http://{display_addr}");
    println!("  Executor: {}", forwarder.base_url());
    println!(
        "  Catalog:  {} legacy tools, {} definitions",
        snapshot.legacy.len(),
        snapshot.definitions.len()
    );
    println!("  GET  /stream?tool=<id>&target=<t>[&scan=<s>] — run a tool (SSE)");
    println!("  GET  /tools             — legacy tool catalog");
    println!("  GET  /tools/definitions — tool definitions and scans");
    println!("  GET  /health            — health check");
    if !snapshot.problems.is_empty() {
        println!(
            "  ⚠️  {} catalog problem(s); run `toolgate tools check` for details",
            snapshot.problems.len()
        );
    }
    #[cfg(unix)]
    println!("  Send SIGHUP to reload the catalog.");
    println!("  Press Ctrl+C to stop.\n");

    let state = AppState { catalog, forwarder };
    let app = router(state, &config.gateway);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the gateway router with its middleware stack.
pub fn router(state: AppState, gateway: &GatewayConfig) -> Router {
    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/stream", get(sse::handle_stream))
        .route("/tools", get(api::handle_tools))
        .route("/tools/definitions", get(api::handle_tool_definitions))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    if gateway.cors_allow_any {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

#[cfg(unix)]
fn spawn_reload_on_hangup(catalog: Arc<CatalogStore>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Catalog reload on SIGHUP unavailable: {e}");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match reload_catalog(&catalog).await {
                Ok(snapshot) => tracing::info!(
                    legacy_tools = snapshot.legacy.len(),
                    definitions = snapshot.definitions.len(),
                    "Catalog reloaded"
                ),
                Err(e) => {
                    tracing::error!("Catalog reload failed, keeping previous catalog: {e:#}");
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_catalog: Arc<CatalogStore>) {}

/// Re-read the catalog files on the blocking pool so request handling is
/// never stalled behind filesystem reads.
pub async fn reload_catalog(catalog: &Arc<CatalogStore>) -> Result<Arc<CatalogSnapshot>> {
    let catalog = Arc::clone(catalog);
    tokio::task::spawn_blocking(move || catalog.reload())
        .await
        .context("Catalog reload task failed")?
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health: always public
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.catalog.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "legacy_tools": snapshot.legacy.len(),
        "definitions": snapshot.definitions.len(),
        "loaded_at": snapshot.loaded_at.to_rfc3339(),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{CatalogSnapshot, LegacyCatalog, ScanDef, ToolDefinition};
    use crate::config::{CatalogConfig, ExecutorConfig};
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    pub(crate) const LEGACY_FIXTURE: &str = r#"{
  "Network": [
    {"id": "ping", "name": "Ping", "type": "system", "cmd": "ping -c 4 {TARGET}"},
    {"id": "nmap", "name": "Nmap (legacy)", "type": "system", "cmd": "nmap {TARGET}"}
  ],
  "Recon": [
    {"id": "dns", "name": "DNS lookup", "type": "wasm", "module": "dns.wasm"},
    {"id": "ghost", "type": "plugin"}
  ]
}"#;

    pub(crate) fn nmap_definition() -> ToolDefinition {
        let mut scans = BTreeMap::new();
        scans.insert(
            "quick".to_string(),
            ScanDef {
                args: vec!["-T4".into(), "-F".into()],
                description: Some("Top 100 ports".into()),
            },
        );
        scans.insert(
            "service".to_string(),
            ScanDef {
                args: vec!["-sV".into()],
                description: None,
            },
        );
        ToolDefinition {
            id: "nmap".into(),
            name: Some("Nmap".into()),
            description: None,
            binary: "nmap".into(),
            profile: "nmap.profile".into(),
            scans,
        }
    }

    pub(crate) fn test_state(executor_url: &str) -> AppState {
        let snapshot = CatalogSnapshot::new(
            LegacyCatalog::parse(LEGACY_FIXTURE).unwrap(),
            std::iter::once(nmap_definition()).collect(),
        );
        let forwarder = Forwarder::new(&ExecutorConfig {
            base_url: executor_url.into(),
            ..ExecutorConfig::default()
        })
        .unwrap();
        AppState {
            catalog: Arc::new(CatalogStore::with_snapshot(
                CatalogConfig::default(),
                snapshot,
            )),
            forwarder,
        }
    }

    #[test]
    fn security_body_limit_is_64kb() {
        assert_eq!(MAX_BODY_SIZE, 65_536);
    }

    #[test]
    fn security_timeout_is_30_seconds() {
        assert_eq!(REQUEST_TIMEOUT_SECS, 30);
    }

    #[tokio::test]
    async fn health_reports_catalog_counts() {
        let response = handle_health(State(test_state("http://127.0.0.1:9")))
            .await
            .into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["legacy_tools"], 4);
        assert_eq!(parsed["definitions"], 1);
        assert!(parsed["loaded_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn router_serves_catalog_routes() {
        let app = router(test_state("http://127.0.0.1:9"), &GatewayConfig::default());
        let response = app
            .oneshot(Request::get("/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(std::str::from_utf8(&body).unwrap(), LEGACY_FIXTURE);
    }

    #[tokio::test]
    async fn router_answers_cors_preflight_when_enabled() {
        let app = router(test_state("http://127.0.0.1:9"), &GatewayConfig::default());
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/stream")
                    .header(header::ORIGIN, "null")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn router_omits_cors_headers_when_disabled() {
        let gateway = GatewayConfig {
            cors_allow_any: false,
            ..GatewayConfig::default()
        };
        let app = router(test_state("http://127.0.0.1:9"), &gateway);
        let response = app
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn reload_runs_off_the_runtime_and_swaps_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig {
            legacy_path: dir.path().join("tools.json"),
            definitions_dir: dir.path().join("tool_definitions"),
        };
        std::fs::write(&config.legacy_path, LEGACY_FIXTURE).unwrap();
        let catalog = Arc::new(CatalogStore::open(&config).unwrap());
        assert_eq!(catalog.snapshot().legacy.len(), 4);

        std::fs::write(
            &config.legacy_path,
            r#"{"Net": [{"id": "ping", "type": "system", "cmd": "ping {TARGET}"}]}"#,
        )
        .unwrap();
        let snapshot = reload_catalog(&catalog).await.unwrap();
        assert_eq!(snapshot.legacy.len(), 1);
        assert_eq!(catalog.snapshot().legacy.len(), 1);

        std::fs::write(&config.legacy_path, "{ broken").unwrap();
        assert!(reload_catalog(&catalog).await.is_err());
        assert_eq!(catalog.snapshot().legacy.len(), 1);
    }

    #[tokio::test]
    async fn public_bind_is_refused_without_opt_in() {
        let err = run_gateway("0.0.0.0", 0, Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Refusing to bind"));
    }
}
