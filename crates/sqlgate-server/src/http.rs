//! Plain HTTP transport
//!
//! `POST /mcp/tools/{tool}` takes a JSON object and always answers 200 with a
//! JSON body; failures are reported in the body, not the status line.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::tools::{ToolDispatcher, ToolResponse};

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<ToolDispatcher>,
}

pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: impl Into<String>, dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            addr: addr.into(),
            state: AppState { dispatcher },
        }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state.dispatcher))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr.as_str()).await?;
        info!(addr = %self.addr, "sqlgate HTTP transport listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

pub fn router(dispatcher: Arc<ToolDispatcher>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/mcp/tools/:tool", post(call_tool))
        .with_state(AppState { dispatcher })
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "sqlgate running" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.dispatcher.telemetry().render(),
    )
}

async fn call_tool(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    body: Bytes,
) -> Json<ToolResponse> {
    let payload = parse_payload(&body);
    Json(state.dispatcher.call(&tool, payload).await)
}

/// Anything other than a JSON object becomes `{}`
fn parse_payload(body: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => Value::Object(Map::new()),
        Err(e) => {
            if !body.is_empty() {
                debug!(error = %e, "request body is not JSON; using empty payload");
            }
            Value::Object(Map::new())
        }
    }
}
