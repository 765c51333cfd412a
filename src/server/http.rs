use crate::csv_processor::{validate_file, RawFile, SchemaFieldSet};
use crate::server::Backends;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub object_api_name: String,
    pub file_name: String,
    pub content: String,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "csv-import-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn info() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "csv-import-mcp",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "MCP Server for validating and importing CSV files - HTTP Mode",
        "endpoints": {
            "GET /health": "Health check",
            "GET /info": "Server info",
            "POST /validate": "Validate CSV headers against an object's fields"
        }
    }))
}

async fn validate_handler(
    State(backends): State<Backends>,
    Json(payload): Json<ValidateRequest>,
) -> impl IntoResponse {
    let fields = match backends
        .schema_source
        .field_names(&payload.object_api_name)
        .await
    {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(entity = %payload.object_api_name, error = %e, "Schema fetch failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": e.to_string()})),
            );
        }
    };

    let file = RawFile::from_text(payload.file_name, payload.content);
    let result = validate_file(&file, &SchemaFieldSet::new(fields));

    match serde_json::to_value(&result) {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

pub fn http_router(backends: Backends) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/validate", post(validate_handler))
        .with_state(backends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::StaticSchemaSource;
    use crate::state::ImportStore;
    use std::sync::Arc;

    async fn serve(dir: &tempfile::TempDir) -> String {
        let backends = Backends::local(
            Arc::new(StaticSchemaSource::default().with_entity("Contact", &["Name", "Email"])),
            ImportStore::new(&dir.path().join("imports.redb")).unwrap(),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, http_router(backends)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn validate_endpoint_reports_invalid_headers() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve(&dir).await;

        let body: serde_json::Value = reqwest::Client::new()
            .post(format!("{}/validate", base))
            .json(&serde_json::json!({
                "object_api_name": "Contact",
                "file_name": "c.csv",
                "content": "Name,Phone\nJohn,555"
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["valid"], false);
        assert_eq!(body["invalid_headers"], serde_json::json!(["phone"]));
    }

    #[tokio::test]
    async fn unknown_object_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve(&dir).await;

        let response = reqwest::Client::new()
            .post(format!("{}/validate", base))
            .json(&serde_json::json!({
                "object_api_name": "Account",
                "file_name": "a.csv",
                "content": "Name"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    }
}
