//! HTTP client wrapper for interacting with Qdrant.

use crate::qdrant::types::{
    CollectionInfoResponse, CollectionStatus, CountResponse, PointInsert, QdrantError,
    QueryResponse, QueryResponseResult, ScoredPoint,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

const UPSERT_BATCH_SIZE: usize = 128;

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("docqa/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Report the optimizer status of a collection, or `None` when it does not exist.
    pub async fn collection_status(
        &self,
        collection_name: &str,
    ) -> Result<Option<CollectionStatus>, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let info: CollectionInfoResponse = response.json().await?;
                Ok(Some(info.result.status))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection status check failed");
                Err(error)
            }
        }
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_status(collection_name).await?.is_some() {
            return Ok(());
        }

        tracing::info!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        self.create_collection(collection_name, vector_size).await
    }

    /// Create a cosine-distance collection with the specified vector size.
    ///
    /// A concurrent creator winning the race (HTTP 409) counts as success.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(collection = collection_name, "Collection created concurrently");
            return Ok(());
        }

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection created");
        })
        .await
    }

    /// Ensure the payload indexes used for partition filtering exist.
    ///
    /// An existing index (409) counts as success; any other failure aborts with that error.
    pub async fn ensure_payload_indexes(
        &self,
        collection_name: &str,
        fields: &[(&str, &str)],
    ) -> Result<(), QdrantError> {
        for (field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))
                .query(&[("wait", true)])
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = collection_name,
                    field,
                    schema,
                    "Payload index ensured"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, field, schema, error = %error, "Failed to ensure payload index");
                return Err(error);
            }
        }

        Ok(())
    }

    /// Count points matching `filter` exactly.
    pub async fn count_points(
        &self,
        collection_name: &str,
        filter: Value,
    ) -> Result<u64, QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/count"),
            )
            .json(&json!({ "filter": filter, "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant count failed");
            return Err(error);
        }

        let CountResponse { result } = response.json().await?;
        Ok(result.count)
    }

    /// Upsert points in batches, waiting for each batch to be applied.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<PointInsert>,
    ) -> Result<usize, QdrantError> {
        let total = points.len();
        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let serialized: Vec<Value> = batch
                .iter()
                .map(|point| {
                    json!({
                        "id": point.id,
                        "vector": point.vector,
                        "payload": point.payload,
                    })
                })
                .collect();
            let batch_len = serialized.len();

            let response = self
                .request(
                    Method::PUT,
                    &format!("collections/{collection_name}/points"),
                )
                .query(&[("wait", true)])
                .json(&json!({ "points": serialized }))
                .send()
                .await?;

            self.ensure_success(response, || {
                tracing::debug!(
                    collection = collection_name,
                    points = batch_len,
                    "Points upserted"
                );
            })
            .await?;
        }
        Ok(total)
    }

    /// Similarity search restricted by `filter`, optionally returning stored vectors.
    pub async fn query_points(
        &self,
        collection_name: &str,
        vector: &[f32],
        filter: Value,
        limit: usize,
        with_vector: bool,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "filter": filter,
            "limit": limit,
            "with_payload": true,
            "with_vector": with_vector,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
                vector: point.vector.and_then(vector_from_value),
            })
            .collect())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
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

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accepts the unnamed dense form (`[..]`) or a single-entry named map (`{"": [..]}`).
fn vector_from_value(value: Value) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| item.as_f64().map(|number| number as f32))
            .collect(),
        Value::Object(map) => map.into_iter().next().and_then(|(_, v)| vector_from_value(v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qdrant::filters::partition_filter;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn service(server: &MockServer) -> QdrantService {
        QdrantService::new(&server.base_url(), Some("key".into())).expect("client")
    }

    #[tokio::test]
    async fn collection_status_distinguishes_missing_and_ready() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/present");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "status": "yellow", "points_count": 4 }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/absent");
                then.status(404).json_body(json!({ "status": { "error": "Not found" } }));
            })
            .await;

        let service = service(&server);
        let present = service.collection_status("present").await.expect("status");
        assert_eq!(present, Some(CollectionStatus::Yellow));
        assert!(present.is_some_and(CollectionStatus::is_ready));
        assert_eq!(service.collection_status("absent").await.expect("status"), None);
    }

    #[tokio::test]
    async fn create_collection_tolerates_conflict() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/shared")
                    .header("api-key", "key")
                    .json_body(json!({ "vectors": { "size": 384, "distance": "Cosine" } }));
                then.status(409).body("already exists");
            })
            .await;

        service(&server)
            .create_collection("shared", 384)
            .await
            .expect("conflict is success");
        mock.assert();
    }

    #[tokio::test]
    async fn payload_index_rejection_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/shared/index");
                then.status(400).body("wrong field schema");
            })
            .await;

        let error = service(&server)
            .ensure_payload_indexes("shared", &[("partition", "keyword")])
            .await
            .expect_err("index rejected");
        assert!(matches!(
            error,
            QdrantError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn existing_payload_index_is_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/shared/index");
                then.status(409).body("index exists");
            })
            .await;

        service(&server)
            .ensure_payload_indexes("shared", &[("partition", "keyword"), ("page", "integer")])
            .await
            .expect("conflict is success");
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn count_points_sends_exact_partition_filter() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/shared/points/count")
                    .json_body(json!({
                        "filter": partition_filter("doc-1"),
                        "exact": true
                    }));
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "count": 17 } }));
            })
            .await;

        let count = service(&server)
            .count_points("shared", partition_filter("doc-1"))
            .await
            .expect("count");
        mock.assert();
        assert_eq!(count, 17);
    }

    #[tokio::test]
    async fn upsert_points_waits_and_batches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/shared/points")
                    .query_param("wait", "true");
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "status": "completed" } }));
            })
            .await;

        let points: Vec<PointInsert> = (0..(UPSERT_BATCH_SIZE + 5))
            .map(|n| PointInsert {
                id: format!("00000000-0000-0000-0000-{n:012}"),
                vector: vec![0.1, 0.2],
                payload: json!({ "partition": "doc-1" }),
            })
            .collect();

        let written = service(&server)
            .upsert_points("shared", points)
            .await
            .expect("upsert");
        mock.assert_hits(2);
        assert_eq!(written, UPSERT_BATCH_SIZE + 5);
    }

    #[tokio::test]
    async fn query_points_returns_vectors_and_payloads() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/shared/points/query")
                    .json_body_partial(r#"{ "limit": 20, "with_vector": true }"#);
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "7f1c0d2a-0000-5000-8000-000000000000",
                                "score": 0.42,
                                "payload": { "text": "Example", "partition": "doc-1" },
                                "vector": [0.5, 0.5]
                            }
                        ]
                    }
                }));
            })
            .await;

        let results = service(&server)
            .query_points("shared", &[0.1, 0.2], partition_filter("doc-1"), 20, true)
            .await
            .expect("search request");

        mock.assert();
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert!((hit.score - 0.42).abs() < f32::EPSILON);
        assert_eq!(hit.vector.as_deref(), Some(&[0.5_f32, 0.5][..]));
        let payload = hit.payload.as_ref().expect("payload");
        assert_eq!(payload["text"], Value::String("Example".into()));
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(
            normalize_base_url("http://localhost:6333/").expect("url"),
            "http://localhost:6333/"
        );
        assert_eq!(
            format_endpoint("http://localhost:6333/", "/collections/a"),
            "http://localhost:6333/collections/a"
        );
        assert!(normalize_base_url("not a url").is_err());
    }
}
