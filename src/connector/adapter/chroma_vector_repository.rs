use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::application::{CollectionHandle, VectorDocument, VectorMatch, VectorRepository};
use crate::domain::{DomainError, WhereFilter};

pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";
const DEFAULT_TENANT: &str = "default_tenant";
const DEFAULT_DATABASE: &str = "default_database";

static MINOR_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0\.(\d+)").unwrap());

/// Which collections endpoint layout the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiLayout {
    Legacy,
    MultiTenant,
}

impl ApiLayout {
    /// 0.5 and later expose collections under a tenant/database path.
    fn from_version(version: &str) -> Option<Self> {
        let minor: u32 = MINOR_VERSION.captures(version)?.get(1)?.as_str().parse().ok()?;
        Some(if minor >= 5 { Self::MultiTenant } else { Self::Legacy })
    }

    fn collections_path(self) -> String {
        match self {
            Self::Legacy => "api/v1/collections".to_string(),
            Self::MultiTenant => format!(
                "api/v1/tenants/{}/databases/{}/collections",
                DEFAULT_TENANT, DEFAULT_DATABASE
            ),
        }
    }
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    get_or_create: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a Map<String, Value>>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: &'a [Vec<f32>],
    n_results: usize,
    include: [&'static str; 3],
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
}

#[derive(Deserialize, Default)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Map<String, Value>>>>,
}

/// HTTP client for a ChromaDB server.
///
/// Queries always carry precomputed embeddings; the server never embeds
/// text. Collection ids are cached by name after the first lookup.
pub struct ChromaVectorRepository {
    client: reqwest::Client,
    base_url: String,
    layout: OnceCell<ApiLayout>,
    collection_ids: Arc<Mutex<HashMap<String, String>>>,
}

impl ChromaVectorRepository {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: url.trim_end_matches('/').to_string(),
            layout: OnceCell::new(),
            collection_ids: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_env() -> Self {
        let url = std::env::var("CHROMA_URL").unwrap_or_else(|_| DEFAULT_CHROMA_URL.to_string());
        Self::new(&url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Server version string, or "unknown" when it cannot be read.
    pub async fn version(&self) -> String {
        let response = match self.client.get(self.url("api/v1/version")).send().await {
            Ok(response) if response.status().is_success() => response,
            _ => return "unknown".to_string(),
        };
        match response.json::<Value>().await {
            Ok(Value::String(version)) => version,
            Ok(Value::Object(map)) => map
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            _ => "unknown".to_string(),
        }
    }

    async fn layout(&self) -> ApiLayout {
        *self
            .layout
            .get_or_init(|| async {
                let version = self.version().await;
                if let Some(layout) = ApiLayout::from_version(&version) {
                    debug!("Detected ChromaDB {} ({:?} API)", version, layout);
                    return layout;
                }
                let probe = self
                    .client
                    .get(self.url(&format!("api/v1/tenants/{}", DEFAULT_TENANT)))
                    .send()
                    .await;
                match probe {
                    Ok(response) if response.status().is_success() => ApiLayout::MultiTenant,
                    _ => ApiLayout::Legacy,
                }
            })
            .await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, DomainError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::vector_store(format!("Request to {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("ChromaDB returned {status} for {path}: {body}");
            return Err(DomainError::vector_store(format!(
                "ChromaDB returned {status} for {path}"
            )));
        }
        Ok(response)
    }

    async fn fetch_collection(&self, name: &str) -> Result<CollectionResponse, DomainError> {
        let path = format!("{}/{}", self.layout().await.collections_path(), name);
        let response = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to get collection: {}", e)))?;
        if !response.status().is_success() {
            return Err(DomainError::vector_store(format!("Collection not found: {}", name)));
        }
        response
            .json()
            .await
            .map_err(|e| DomainError::vector_store(format!("Invalid collection payload: {}", e)))
    }

    async fn try_query(
        &self,
        collection: &CollectionHandle,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<Vec<VectorMatch>>, DomainError> {
        let request = QueryRequest {
            query_embeddings,
            n_results,
            include: ["documents", "metadatas", "distances"],
            filter: filter.map(WhereFilter::to_json),
        };
        let response: QueryResponse = self
            .post_json(&format!("api/v1/collections/{}/query", collection.id), &request)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::vector_store(format!("Invalid query payload: {}", e)))?;
        Ok(response.into_matches())
    }
}

impl QueryResponse {
    fn into_matches(self) -> Vec<Vec<VectorMatch>> {
        let mut distances = self.distances.unwrap_or_default().into_iter();
        let mut metadatas = self.metadatas.unwrap_or_default().into_iter();

        self.ids
            .into_iter()
            .map(|ids| {
                let row_distances = distances.next().unwrap_or_default();
                let row_metadatas = metadatas.next().unwrap_or_default();
                ids.into_iter()
                    .enumerate()
                    .map(|(i, id)| VectorMatch {
                        id,
                        distance: row_distances.get(i).copied().flatten(),
                        metadata: row_metadatas.get(i).cloned().flatten().unwrap_or_default(),
                    })
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl VectorRepository for ChromaVectorRepository {
    async fn get_or_create_collection(
        &self,
        name: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<CollectionHandle, DomainError> {
        if let Some(id) = self.collection_ids.lock().await.get(name) {
            return Ok(CollectionHandle {
                id: id.clone(),
                name: name.to_string(),
            });
        }

        let path = self.layout().await.collections_path();
        let request = CreateCollectionRequest {
            name,
            get_or_create: true,
            metadata: metadata.filter(|m| !m.is_empty()),
        };

        let collection = match self.post_json(&path, &request).await {
            Ok(response) => response.json::<CollectionResponse>().await.map_err(|e| {
                DomainError::vector_store(format!("Invalid collection payload: {}", e))
            })?,
            Err(e) => {
                warn!("Get-or-create for {} failed, trying plain get: {}", name, e);
                self.fetch_collection(name).await?
            }
        };

        self.collection_ids
            .lock()
            .await
            .insert(collection.name.clone(), collection.id.clone());
        Ok(CollectionHandle {
            id: collection.id,
            name: collection.name,
        })
    }

    async fn upsert(
        &self,
        collection: &CollectionHandle,
        documents: &[VectorDocument],
    ) -> Result<(), DomainError> {
        if documents.is_empty() {
            return Ok(());
        }
        let request = UpsertRequest {
            ids: documents.iter().map(|d| d.id.as_str()).collect(),
            embeddings: documents.iter().map(|d| d.embedding.as_slice()).collect(),
            documents: documents.iter().map(|d| d.document.as_str()).collect(),
            metadatas: documents.iter().map(|d| &d.metadata).collect(),
        };
        self.post_json(&format!("api/v1/collections/{}/upsert", collection.id), &request)
            .await?;
        debug!("Upserted {} documents into {}", documents.len(), collection.name);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionHandle, ids: &[String]) -> Result<(), DomainError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post_json(
            &format!("api/v1/collections/{}/delete", collection.id),
            &json!({ "ids": ids }),
        )
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Vec<Vec<VectorMatch>> {
        if query_embeddings.is_empty() {
            return Vec::new();
        }
        match self
            .try_query(collection, query_embeddings, n_results, filter)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Vector query failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn get(&self, collection: &CollectionHandle, ids: &[String]) -> Vec<VectorMatch> {
        let body = json!({ "ids": ids, "include": ["documents", "metadatas"] });
        let response = match self
            .post_json(&format!("api/v1/collections/{}/get", collection.id), &body)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Vector get failed: {}", e);
                return Vec::new();
            }
        };
        let parsed: GetResponse = response.json().await.unwrap_or_default();
        let metadatas = parsed.metadatas.unwrap_or_default();
        parsed
            .ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| VectorMatch {
                id,
                distance: None,
                metadata: metadatas.get(i).cloned().flatten().unwrap_or_default(),
            })
            .collect()
    }

    async fn count(&self, collection: &CollectionHandle) -> usize {
        let path = format!("api/v1/collections/{}/count", collection.id);
        match self.client.get(self.url(&path)).send().await {
            Ok(response) if response.status().is_success() => {
                response.json::<usize>().await.unwrap_or(0)
            }
            Ok(response) => {
                warn!("Count returned {}", response.status());
                0
            }
            Err(e) => {
                warn!("Count failed: {}", e);
                0
            }
        }
    }

    async fn heartbeat(&self) -> Result<(), DomainError> {
        let mut last_error = String::new();
        for path in ["api/v1/heartbeat", "api/v1"] {
            match self.client.get(self.url(path)).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => last_error = format!("{} returned {}", path, response.status()),
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(DomainError::vector_store(format!(
            "ChromaDB heartbeat failed at {}: {}",
            self.base_url, last_error
        )))
    }
}
