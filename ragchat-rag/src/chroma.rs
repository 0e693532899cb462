//! Chroma chunk store backend.
//!
//! Provides [`ChromaChunkStore`] which implements [`ChunkStore`] against the
//! Chroma v2 REST API over `reqwest`. One store handle maps to one Chroma
//! collection, addressed by tenant, database and name, using cosine distance;
//! scores are reported as `1 - distance`.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragchat_rag::chroma::{ChromaChunkStore, ChromaConfig};
//!
//! let config = ChromaConfig::new("http://localhost:8000", "documents");
//! let store = ChromaChunkStore::connect(config).await?;
//! store.add(&chunks).await?;
//! let results = store.query(&[query_embedding], 5).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::store::{ChunkStore, MetadataFilter};

const BACKEND: &str = "chroma";

/// Tenant every Chroma server creates on startup.
pub const DEFAULT_TENANT: &str = "default_tenant";

/// Database every Chroma server creates on startup.
pub const DEFAULT_DATABASE: &str = "default_database";

/// Where a Chroma collection lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromaConfig {
    /// Server URL including scheme and port, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Tenant owning the database.
    pub tenant: String,
    /// Database holding the collection.
    pub database: String,
    /// Collection name.
    pub collection: String,
}

impl ChromaConfig {
    /// `collection` on the server at `base_url`, in the default tenant and database.
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            tenant: DEFAULT_TENANT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: collection.into(),
        }
    }

    /// Use `tenant` instead of [`DEFAULT_TENANT`].
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Use `database` instead of [`DEFAULT_DATABASE`].
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// URL of the collections resource of the configured database.
    pub fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url.trim_end_matches('/'),
            self.tenant,
            self.database
        )
    }
}

/// A [`ChunkStore`] backed by a [Chroma](https://www.trychroma.com/) collection.
///
/// Chunk metadata is stored as Chroma metadata, with the parent document id
/// under the reserved `document_id` key so removal by document works through
/// a `where` filter.
pub struct ChromaChunkStore {
    client: Client,
    collections_url: String,
    collection: String,
    collection_id: String,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<HashMap<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<Option<Vec<f32>>>>>,
}

impl ChromaChunkStore {
    /// Connect to the Chroma server described by `config`, creating the
    /// collection if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the server is unreachable or
    /// refuses the collection.
    pub async fn connect(config: ChromaConfig) -> Result<Self> {
        Self::connect_with_client(Client::new(), config).await
    }

    /// Like [`connect`](Self::connect) with a preconfigured HTTP client.
    pub async fn connect_with_client(client: Client, config: ChromaConfig) -> Result<Self> {
        let collections_url = config.collections_url();
        let body = json!({
            "name": config.collection,
            "get_or_create": true,
            "metadata": { "hnsw:space": "cosine" },
        });
        let response =
            client.post(&collections_url).json(&body).send().await.map_err(Self::map_err)?;
        let created: CollectionResponse =
            Self::check(response).await?.json().await.map_err(Self::map_err)?;

        debug!(
            collection = %config.collection,
            tenant = %config.tenant,
            database = %config.database,
            collection.id = %created.id,
            "connected to chroma collection"
        );
        Ok(Self {
            client,
            collections_url,
            collection: config.collection,
            collection_id: created.id,
        })
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn map_err(e: reqwest::Error) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/{}/{operation}", self.collections_url, self.collection_id)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("chroma returned {status}: {body}"),
        })
    }

    async fn post(&self, operation: &str, body: &Value) -> Result<reqwest::Response> {
        let response =
            self.client.post(self.url(operation)).json(body).send().await.map_err(Self::map_err)?;
        Self::check(response).await
    }
}

/// Chroma `where` clause for an equality filter.
fn where_clause(filter: &MetadataFilter) -> Value {
    let mut conditions: Vec<Value> =
        filter.conditions().iter().map(|(key, value)| json!({ key: value })).collect();
    if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        json!({ "$and": conditions })
    }
}

/// Chroma metadata for a chunk, including its parent document id.
fn chunk_metadata(chunk: &Chunk) -> HashMap<&str, &str> {
    let mut metadata: HashMap<&str, &str> =
        chunk.metadata.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    metadata.insert(MetadataFilter::DOCUMENT_ID, chunk.document_id.as_str());
    metadata
}

fn metadata_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Convert a query response into one ranked list per query.
fn parse_query_response(response: QueryResponse) -> Vec<Vec<SearchResult>> {
    let QueryResponse { ids, documents, metadatas, distances, embeddings } = response;
    ids.into_iter()
        .enumerate()
        .map(|(q, ids)| {
            ids.into_iter()
                .enumerate()
                .map(|(i, id)| {
                    let text = documents
                        .as_ref()
                        .and_then(|d| d.get(q)?.get(i)?.clone())
                        .unwrap_or_default();
                    let mut metadata: HashMap<String, String> = metadatas
                        .as_ref()
                        .and_then(|m| m.get(q)?.get(i)?.clone())
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(k, v)| (k, metadata_value(v)))
                        .collect();
                    let document_id =
                        metadata.remove(MetadataFilter::DOCUMENT_ID).unwrap_or_default();
                    let distance = distances
                        .as_ref()
                        .and_then(|d| d.get(q)?.get(i).copied())
                        .unwrap_or(1.0);
                    let embedding = embeddings.as_ref().and_then(|e| e.get(q)?.get(i)?.clone());

                    SearchResult {
                        chunk: Chunk { id, text, embedding, metadata, document_id },
                        score: 1.0 - distance,
                    }
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl ChunkStore for ChromaChunkStore {
    async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = chunk.embedding.as_ref().ok_or_else(|| RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("chunk '{}' has no embedding", chunk.id),
            })?;
            embeddings.push(embedding);
        }

        let body = json!({
            "ids": chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "embeddings": embeddings,
            "documents": chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            "metadatas": chunks.iter().map(chunk_metadata).collect::<Vec<_>>(),
        });
        self.post("upsert", &body).await?;

        debug!(collection = %self.collection, count = chunks.len(), "upserted chunks into chroma");
        Ok(())
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<()> {
        if filter.is_empty() {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: "refusing to delete with an empty filter".to_string(),
            });
        }

        self.post("delete", &json!({ "where": where_clause(filter) })).await?;
        debug!(collection = %self.collection, "deleted chunks from chroma");
        Ok(())
    }

    async fn query(
        &self,
        embeddings: &[Vec<f32>],
        top_k: usize,
    ) -> Result<Vec<Vec<SearchResult>>> {
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }
        if top_k == 0 {
            return Ok(vec![Vec::new(); embeddings.len()]);
        }

        let body = json!({
            "query_embeddings": embeddings,
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances", "embeddings"],
        });
        let response: QueryResponse =
            self.post("query", &body).await?.json().await.map_err(Self::map_err)?;
        Ok(parse_query_response(response))
    }

    async fn count(&self) -> Result<usize> {
        let response =
            self.client.get(self.url("count")).send().await.map_err(Self::map_err)?;
        Self::check(response).await?.json().await.map_err(Self::map_err)
    }
}
