//! HTTP client wrapper for interacting with Qdrant.

use crate::qdrant::types::{
    CollectionInfoResponse, ListCollectionsResponse, PointInsert, QdrantError,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};

/// Payload fields that carry a keyword index for filtered retrieval.
pub const INDEXED_PAYLOAD_FIELDS: [&str; 4] = ["doc_id", "source_name", "ext", "language"];

/// Lightweight HTTP client for Qdrant collection provisioning and upserts.
pub struct QdrantStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantStore {
    /// Construct a new client for the store at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("docpipe/0.2").build()?;

        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create the collection when it is missing; an existing collection is
    /// left untouched whatever its settings.
    ///
    /// Safe to call at the start of every ingestion run and from concurrent
    /// workers: losing the create race to another worker still counts as
    /// success, because the collection is there.
    pub async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
        on_disk: bool,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            tracing::debug!(collection = collection_name, "Collection already present");
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            on_disk,
            "Creating collection"
        );
        match self
            .create_collection(collection_name, vector_size, on_disk)
            .await
        {
            Err(QdrantError::UnexpectedStatus { status, .. }) if status == StatusCode::CONFLICT => {
                tracing::debug!(collection = collection_name, "Collection created concurrently");
                Ok(())
            }
            other => other,
        }
    }

    /// Create or update a collection with the specified vector size.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
        on_disk: bool,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine",
                "on_disk": on_disk
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                vector_size,
                "Collection ensured/created"
            );
        })
        .await
    }

    /// Retrieve the names of all collections present in Qdrant.
    pub async fn list_collections(&self) -> Result<Vec<String>, QdrantError> {
        let response = self.request(Method::GET, "collections")?.send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            let names = payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect();
            Ok(names)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Failed to list collections");
            Err(error)
        }
    }

    /// Write prepared points to the given collection, waiting for the store
    /// to acknowledge persistence. Returns the number of points written.
    ///
    /// Points reusing an existing identifier overwrite it in place, which is
    /// what keeps re-ingestion of an unchanged document from duplicating.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<PointInsert>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let serialized: Vec<_> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": point.id,
                    "vector": point.vector,
                    "payload": point.payload,
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Ensure a keyword index exists for every payload field retrieval
    /// filters on. Fields already indexed are skipped; a missing collection
    /// is a diagnosed no-op so provisioning order never matters.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), QdrantError> {
        let Some(schema) = self.payload_schema(collection_name).await? else {
            tracing::warn!(
                collection = collection_name,
                "Collection missing; skipping payload index setup"
            );
            return Ok(());
        };

        for field in INDEXED_PAYLOAD_FIELDS {
            if schema.contains_key(field) {
                tracing::debug!(collection = collection_name, field, "Payload index present");
                continue;
            }

            let body = json!({
                "field_name": field,
                "field_schema": "keyword",
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))?
                .json(&body)
                .send()
                .await?;

            match response.status() {
                status if status.is_success() => {
                    tracing::debug!(collection = collection_name, field, "Payload index created");
                }
                StatusCode::CONFLICT => {
                    tracing::debug!(
                        collection = collection_name,
                        field,
                        "Payload index created concurrently"
                    );
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    let error = QdrantError::UnexpectedStatus { status, body };
                    tracing::warn!(collection = collection_name, field, error = %error, "Failed to ensure payload index");
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    /// Check whether the named collection exists in the store.
    pub async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    /// Payload index schema of a collection, or `None` when it does not exist.
    async fn payload_schema(
        &self,
        collection_name: &str,
    ) -> Result<Option<Map<String, Value>>, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let info: CollectionInfoResponse = response.json().await?;
                Ok(Some(info.result.payload_schema))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection info request failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, PUT},
        MockServer,
    };

    fn store_for(server: &MockServer) -> QdrantStore {
        QdrantStore {
            client: Client::builder()
                .user_agent("docpipe-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        }
    }

    fn ok_result() -> Value {
        json!({ "result": true, "status": "ok", "time": 0.0 })
    }

    fn collection_info(indexed: &[&str]) -> Value {
        let mut schema = Map::new();
        for field in indexed {
            schema.insert(
                (*field).to_string(),
                json!({ "data_type": "keyword", "points": 0 }),
            );
        }
        json!({
            "result": { "status": "green", "payload_schema": schema },
            "status": "ok",
            "time": 0.0
        })
    }

    #[tokio::test]
    async fn ensure_collection_creates_missing_collection() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs").json_body(json!({
                    "vectors": { "size": 1024, "distance": "Cosine", "on_disk": false }
                }));
                then.status(200).json_body(ok_result());
            })
            .await;

        store_for(&server)
            .ensure_collection("docs", 1024, false)
            .await
            .expect("ensure");

        exists.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn ensure_collection_skips_existing_collection() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(collection_info(&[]));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(200).json_body(ok_result());
            })
            .await;

        let store = store_for(&server);
        store
            .ensure_collection("docs", 1024, false)
            .await
            .expect("first");
        store
            .ensure_collection("docs", 1024, false)
            .await
            .expect("second");

        assert_eq!(exists.hits_async().await, 2);
        assert_eq!(create.hits_async().await, 0);
    }

    #[tokio::test]
    async fn ensure_collection_converges_across_runs() {
        let server = MockServer::start_async().await;
        let mut missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(200).json_body(ok_result());
            })
            .await;

        let store = store_for(&server);
        store
            .ensure_collection("docs", 512, true)
            .await
            .expect("first run");
        assert_eq!(create.hits_async().await, 1);

        // The collection now exists; the next run must detect it and not
        // issue a second create.
        missing.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(collection_info(&[]));
            })
            .await;

        store
            .ensure_collection("docs", 512, true)
            .await
            .expect("second run");
        assert_eq!(create.hits_async().await, 1);
    }

    #[tokio::test]
    async fn ensure_collection_tolerates_lost_create_race() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(409).body("collection `docs` already exists");
            })
            .await;

        store_for(&server)
            .ensure_collection("docs", 256, false)
            .await
            .expect("lost race still converges");
    }

    #[tokio::test]
    async fn payload_indexes_created_only_for_missing_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200)
                    .json_body(collection_info(&["doc_id", "ext"]));
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/index")
                    .json_body_partial(r#"{ "field_schema": "keyword" }"#);
                then.status(200).json_body(ok_result());
            })
            .await;

        store_for(&server)
            .ensure_payload_indexes("docs")
            .await
            .expect("index setup");

        // doc_id and ext are already indexed; source_name and language are not.
        assert_eq!(index.hits_async().await, 2);
    }

    #[tokio::test]
    async fn payload_indexes_noop_when_collection_is_missing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/ghost");
                then.status(404);
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/ghost/index");
                then.status(200).json_body(ok_result());
            })
            .await;

        store_for(&server)
            .ensure_payload_indexes("ghost")
            .await
            .expect("missing collection is a no-op");
        assert_eq!(index.hits_async().await, 0);
    }

    #[tokio::test]
    async fn payload_index_conflict_counts_as_indexed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(collection_info(&[]));
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/index");
                then.status(409).body("index already exists");
            })
            .await;

        store_for(&server)
            .ensure_payload_indexes("docs")
            .await
            .expect("conflicts converge");
        assert_eq!(index.hits_async().await, INDEXED_PAYLOAD_FIELDS.len());
    }

    #[tokio::test]
    async fn upsert_sends_points_and_waits() {
        let server = MockServer::start_async().await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .query_param("wait", "true")
                    .json_body_partial(
                        json!({
                            "points": [
                                { "id": "11111111-2222-3333-4444-555555555555" }
                            ]
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "result": { "operation_id": 0, "status": "acknowledged" },
                    "status": "ok",
                    "time": 0.0
                }));
            })
            .await;

        let point = PointInsert {
            id: "11111111-2222-3333-4444-555555555555".into(),
            vector: vec![0.5, 0.5],
            payload: Map::new(),
        };
        let written = store_for(&server)
            .upsert_points("docs", vec![point])
            .await
            .expect("upsert");

        upsert.assert_async().await;
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn empty_upsert_skips_the_request() {
        let server = MockServer::start_async().await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(200).json_body(ok_result());
            })
            .await;

        let written = store_for(&server)
            .upsert_points("docs", Vec::new())
            .await
            .expect("empty upsert");
        assert_eq!(written, 0);
        assert_eq!(upsert.hits_async().await, 0);
    }

    #[tokio::test]
    async fn list_collections_returns_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(200).json_body(json!({
                    "result": { "collections": [ { "name": "docs" }, { "name": "scratch" } ] },
                    "status": "ok",
                    "time": 0.0
                }));
            })
            .await;

        let names = store_for(&server).list_collections().await.expect("list");
        assert_eq!(names, vec!["docs".to_string(), "scratch".to_string()]);
    }

    #[tokio::test]
    async fn server_errors_surface_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(500).body("internal");
            })
            .await;

        let error = store_for(&server).list_collections().await.unwrap_err();
        match error {
            QdrantError::UnexpectedStatus { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "internal");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn base_url_normalization_trims_trailing_slash() {
        let base = normalize_base_url("http://localhost:6333/").expect("parse");
        assert_eq!(format_endpoint(&base, "collections"), "http://localhost:6333/collections");
        assert!(normalize_base_url("not a url").is_err());
    }
}
