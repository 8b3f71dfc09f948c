use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fruitstore_core::{AgentError, ErrorStatus};
use serde::Serialize;
use std::collections::BTreeMap;

pub const SERVICE_TITLE: &str = "Simple Fruit Store Agentic API with MCP";
pub const SERVICE_VERSION: &str = "2.0.0";
pub const SERVICE_NAME: &str = "simple-fruit-store-agentic-api";

// GET /
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

impl ServiceInfo {
    pub fn current() -> Self {
        let endpoints = BTreeMap::from([
            ("/api/fruits", "POST - Simple fruit price query demonstration"),
            ("/health", "GET - Health check"),
        ]);
        Self {
            message: SERVICE_TITLE,
            version: SERVICE_VERSION,
            endpoints,
        }
    }
}

// GET /health
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
}

impl Health {
    pub fn healthy() -> Self {
        Self {
            status: "healthy",
            service: SERVICE_NAME,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A failed fruit query, rendered according to the configured status mode.
#[derive(Debug)]
pub struct QueryError {
    pub source: AgentError,
    pub mode: ErrorStatus,
}

impl QueryError {
    pub fn status(&self) -> StatusCode {
        match self.mode {
            ErrorStatus::Legacy => StatusCode::OK,
            // Every failure kind is an upstream (tool server or model) failure.
            ErrorStatus::Strict => match self.source {
                AgentError::Discovery(_) | AgentError::Tool(_) | AgentError::Model(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: format!("Failed to process fruit query: {}", self.source),
        };
        (self.status(), Json(body)).into_response()
    }
}
