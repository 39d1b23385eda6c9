//! HTTP surface for docpipe.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /ingest` – Load a PDF or DOCX from disk, split it into token
//!   windows, embed the chunks, and upsert them into Qdrant. Returns
//!   ingestion counters (`pages`, `ocr_pages`, `chunks_indexed`,
//!   `points_upserted`).
//! - `GET /collections` – List Qdrant collections visible to this server.
//! - `POST /collections` – Create a collection with its payload indexes (idempotent).
//! - `GET /metrics` – Observe ingestion counters.
//! - `GET /health` – Probe the vector store; `503` when it is unreachable.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! The HTTP surface shares the pipeline with the batch CLI, so behavior is
//! identical across interfaces.

use crate::ingest::{IngestApi, IngestError, LoadError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: IngestApi + 'static,
{
    Router::new()
        .route("/ingest", post(ingest_document::<S>))
        .route(
            "/collections",
            get(list_collections::<S>).post(create_collection::<S>),
        )
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(get_health::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Request body for the `POST /ingest` endpoint.
#[derive(Deserialize)]
struct IngestRequest {
    /// Path of the document to ingest.
    path: String,
    /// Optional collection override (defaults to `QDRANT_COLLECTION`).
    #[serde(default)]
    collection: Option<String>,
    /// Optional language tag stored with each chunk (defaults to the
    /// configured `LANGUAGE_HINTS`).
    #[serde(default)]
    language: Option<String>,
}

/// Success response for the `POST /ingest` endpoint.
#[derive(Serialize)]
struct IngestResponse {
    /// Page units loaded from the document.
    pages: usize,
    /// Pages whose text came from the OCR fallback.
    ocr_pages: usize,
    /// Number of chunks produced and embedded.
    chunks_indexed: usize,
    /// Number of points written to the vector store.
    points_upserted: usize,
}

/// Ingest a document from disk into the target collection.
///
/// The handler hands the path straight to the pipeline, which loads pages
/// (running OCR where the text layer is too thin), splits them into
/// overlapping token windows, embeds the windows, and upserts the vectors
/// under deterministic identifiers.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError>
where
    S: IngestApi,
{
    let IngestRequest {
        path,
        collection,
        language,
    } = request;
    let outcome = service.ingest_file(&path, collection, language).await?;
    tracing::info!(
        path,
        pages = outcome.pages,
        ocr_pages = outcome.ocr_pages,
        chunks = outcome.chunks,
        points = outcome.points_upserted,
        "Ingest request completed"
    );
    Ok(Json(IngestResponse {
        pages: outcome.pages,
        ocr_pages: outcome.ocr_pages,
        chunks_indexed: outcome.chunks,
        points_upserted: outcome.points_upserted,
    }))
}

/// Response body for `GET /collections`.
#[derive(Serialize)]
struct CollectionsResponse {
    collections: Vec<String>,
}

/// List Qdrant collections available to this server.
async fn list_collections<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<CollectionsResponse>, AppError>
where
    S: IngestApi,
{
    let collections = service.list_collections().await?;
    Ok(Json(CollectionsResponse { collections }))
}

/// Request body for `POST /collections`.
#[derive(Deserialize)]
struct CreateCollectionRequest {
    /// Name of the collection to create.
    name: String,
    /// Optional vector size override (defaults to `EMBEDDING_DIMENSION`).
    #[serde(default)]
    vector_size: Option<u64>,
}

/// Create a collection together with its payload indexes.
async fn create_collection<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<(), AppError>
where
    S: IngestApi,
{
    service
        .create_collection(&request.name, request.vector_size)
        .await?;
    Ok(())
}

/// Return a concise metrics snapshot with document, page, and chunk counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Result<Json<MetricsResponse>, AppError>
where
    S: IngestApi,
{
    let snapshot = service.metrics_snapshot();
    Ok(Json(MetricsResponse {
        documents_indexed: snapshot.documents_indexed,
        pages_loaded: snapshot.pages_loaded,
        ocr_pages: snapshot.ocr_pages,
        chunks_indexed: snapshot.chunks_indexed,
    }))
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    documents_indexed: u64,
    pages_loaded: u64,
    ocr_pages: u64,
    chunks_indexed: u64,
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    reachable: bool,
    collection_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Probe the vector store; answers `503` when it cannot be reached.
async fn get_health<S>(State(service): State<Arc<S>>) -> Response
where
    S: IngestApi,
{
    let health = service.health().await;
    let status = if health.reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            reachable: health.reachable,
            collection_present: health.collection_present,
            error: health.error,
        }),
    )
        .into_response()
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/ingest",
                description: "Load a PDF or DOCX from disk, split it into token windows, embed the chunks, and upsert them into Qdrant. Response returns { \"pages\": number, \"ocr_pages\": number, \"chunks_indexed\": number, \"points_upserted\": number }.",
                request_example: Some(json!({
                    "path": "./data/report.pdf",
                    "collection": "optional-collection",
                    "language": "en"
                })),
            },
            CommandDescriptor {
                name: "list_collections",
                method: "GET",
                path: "/collections",
                description: "Return the names of Qdrant collections visible to this server.",
                request_example: None,
            },
            CommandDescriptor {
                name: "create_collection",
                method: "POST",
                path: "/collections",
                description: "Create a Qdrant collection with its payload indexes (non-destructive if it already exists).",
                request_example: Some(json!({
                    "name": "my-collection",
                    "vector_size": 1024
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion counters useful for observability dashboards.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Probe the vector store and report reachability.",
                request_example: None,
            },
        ],
    })
}

struct AppError(IngestError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IngestError::Load(LoadError::FileNotFound { .. }) => StatusCode::NOT_FOUND,
            IngestError::Load(LoadError::UnsupportedType { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            IngestError::Qdrant(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::ingest::{IngestApi, IngestError, IngestOutcome, LoadError, StoreHealth};
    use crate::metrics::MetricsSnapshot;
    use crate::qdrant::QdrantError;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn commands_catalog_exposes_ingest_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let ingest = commands
            .iter()
            .find(|cmd| cmd.name == "ingest")
            .expect("ingest command present");

        assert_eq!(ingest.method, "POST");
        assert_eq!(ingest.path, "/ingest");
        assert!(ingest.description.to_lowercase().contains("token windows"));

        // ensure catalog exposes multiple commands for host discovery
        assert!(commands.len() >= 4);
    }

    #[tokio::test]
    async fn ingest_route_passes_overrides_and_returns_counters() {
        let outcome = IngestOutcome {
            pages: 3,
            ocr_pages: 1,
            chunks: 7,
            points_upserted: 7,
        };
        let service = Arc::new(StubIngestService::new(StubBehavior::Succeed(outcome)));
        let app = create_router(service.clone());

        let payload = json!({
            "path": "./data/report.pdf",
            "collection": "custom-collection",
            "language": "pl"
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["pages"], 3);
        assert_eq!(json["ocr_pages"], 1);
        assert_eq!(json["chunks_indexed"], 7);
        assert_eq!(json["points_upserted"], 7);

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.path, "./data/report.pdf");
        assert_eq!(call.collection.as_deref(), Some("custom-collection"));
        assert_eq!(call.language.as_deref(), Some("pl"));
    }

    #[tokio::test]
    async fn ingest_route_defaults_are_left_to_the_service() {
        let service = Arc::new(StubIngestService::new(StubBehavior::Succeed(
            IngestOutcome::default(),
        )));
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "path": "memo.docx" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let call = &service.recorded_calls().await[0];
        assert_eq!(call.collection, None);
        assert_eq!(call.language, None);
    }

    #[tokio::test]
    async fn missing_document_maps_to_not_found() {
        let service = Arc::new(StubIngestService::new(StubBehavior::MissingFile));
        let response = ingest_request(service).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_extension_maps_to_unsupported_media_type() {
        let service = Arc::new(StubIngestService::new(StubBehavior::UnsupportedType));
        let response = ingest_request(service).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn store_failures_map_to_bad_gateway() {
        let service = Arc::new(StubIngestService::new(StubBehavior::StoreDown));
        let response = ingest_request(service).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn health_route_reports_unreachable_store() {
        let mut service = StubIngestService::new(StubBehavior::Succeed(IngestOutcome::default()));
        service.health = StoreHealth {
            reachable: false,
            collection_present: false,
            error: Some("connection refused".into()),
        };
        let app = create_router(Arc::new(service));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["reachable"], false);
        assert_eq!(json["error"], "connection refused");
    }

    #[tokio::test]
    async fn metrics_route_serializes_counters() {
        let service = Arc::new(StubIngestService::new(StubBehavior::Succeed(
            IngestOutcome::default(),
        )));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["documents_indexed"], 4);
        assert_eq!(json["pages_loaded"], 9);
        assert_eq!(json["ocr_pages"], 2);
        assert_eq!(json["chunks_indexed"], 31);
    }

    async fn ingest_request(service: Arc<StubIngestService>) -> axum::response::Response {
        create_router(service)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "path": "whatever.pdf" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response")
    }

    #[derive(Clone, Debug)]
    struct IngestCall {
        path: String,
        collection: Option<String>,
        language: Option<String>,
    }

    #[derive(Clone, Copy)]
    enum StubBehavior {
        Succeed(IngestOutcome),
        MissingFile,
        UnsupportedType,
        StoreDown,
    }

    #[derive(Clone)]
    struct StubIngestService {
        calls: Arc<Mutex<Vec<IngestCall>>>,
        behavior: StubBehavior,
        health: StoreHealth,
    }

    impl StubIngestService {
        fn new(behavior: StubBehavior) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                behavior,
                health: StoreHealth {
                    reachable: true,
                    collection_present: true,
                    error: None,
                },
            }
        }

        async fn recorded_calls(&self) -> Vec<IngestCall> {
            self.calls.lock().await.clone()
        }

        fn failure(&self) -> IngestError {
            match self.behavior {
                StubBehavior::MissingFile => IngestError::Load(LoadError::FileNotFound {
                    path: "/missing/report.pdf".into(),
                }),
                StubBehavior::UnsupportedType => IngestError::Load(LoadError::UnsupportedType {
                    path: "/data/slides.pptx".into(),
                    ext: ".pptx".into(),
                }),
                StubBehavior::StoreDown => IngestError::Qdrant(QdrantError::UnexpectedStatus {
                    status: StatusCode::BAD_GATEWAY,
                    body: "connection refused".into(),
                }),
                StubBehavior::Succeed(_) => unreachable!("no failure configured"),
            }
        }
    }

    #[async_trait]
    impl IngestApi for StubIngestService {
        async fn ingest_file(
            &self,
            path: &str,
            collection: Option<String>,
            language: Option<String>,
        ) -> Result<IngestOutcome, IngestError> {
            self.calls.lock().await.push(IngestCall {
                path: path.to_string(),
                collection,
                language,
            });
            match self.behavior {
                StubBehavior::Succeed(outcome) => Ok(outcome),
                _ => Err(self.failure()),
            }
        }

        async fn create_collection(
            &self,
            _collection: &str,
            _vector_size: Option<u64>,
        ) -> Result<(), IngestError> {
            Ok(())
        }

        async fn list_collections(&self) -> Result<Vec<String>, IngestError> {
            Ok(vec!["docchat".into()])
        }

        async fn health(&self) -> StoreHealth {
            self.health.clone()
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_indexed: 4,
                pages_loaded: 9,
                ocr_pages: 2,
                chunks_indexed: 31,
            }
        }
    }
}
