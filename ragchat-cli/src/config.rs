//! Service locations and model names, resolved from flags and environment.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ragchat_model::{OllamaConfig, OllamaModel};
use ragchat_rag::chroma::{DEFAULT_DATABASE, DEFAULT_TENANT};
use ragchat_rag::{
    ChromaChunkStore, ChromaConfig, ChunkStore, Document, InMemoryChunkStore,
    OllamaEmbeddingProvider, RagConfig, RagPipeline,
};
use tracing::info;

/// Where the language model and the vector store live.
#[derive(Debug, Clone, Args)]
pub struct ServiceArgs {
    /// Ollama host, with or without scheme
    #[arg(long, env = "LLM_HOST", default_value = "localhost")]
    pub llm_host: String,

    /// Ollama port
    #[arg(long, env = "LLM_PORT", default_value_t = 11434)]
    pub llm_port: u16,

    /// Model used for rewriting and answering
    #[arg(long, env = "LLM_MODEL", default_value = "llama3.2")]
    pub model: String,

    /// Model used for embeddings
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "llama3.2")]
    pub embedding_model: String,

    /// Chroma host; documents are kept in memory when unset
    #[arg(long, env = "CHROMA_HOST")]
    pub chroma_host: Option<String>,

    /// Chroma port
    #[arg(long, env = "CHROMA_PORT", default_value_t = 8000)]
    pub chroma_port: u16,

    /// Chroma collection holding the chunks
    #[arg(long, env = "CHROMA_COLLECTION", default_value = "documents")]
    pub collection: String,

    /// Chroma tenant owning the database
    #[arg(long, env = "CHROMA_TENANT", default_value = DEFAULT_TENANT)]
    pub chroma_tenant: String,

    /// Chroma database holding the collection
    #[arg(long, env = "CHROMA_DATABASE", default_value = DEFAULT_DATABASE)]
    pub chroma_database: String,
}

impl ServiceArgs {
    /// Connection settings for Ollama.
    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig::new(self.llm_host.clone(), self.llm_port)
    }

    /// Base URL of the Chroma server, if one is configured.
    pub fn chroma_url(&self) -> Option<String> {
        let host = self.chroma_host.as_deref().map(str::trim).filter(|h| !h.is_empty())?;
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            Some(format!("{host}:{}", self.chroma_port))
        } else {
            Some(format!("http://{host}:{}", self.chroma_port))
        }
    }

    /// Chroma settings, if a Chroma server is configured.
    pub fn chroma(&self) -> Option<ChromaConfig> {
        let config = ChromaConfig::new(self.chroma_url()?, self.collection.clone())
            .with_tenant(self.chroma_tenant.clone())
            .with_database(self.chroma_database.clone());
        Some(config)
    }

    async fn chunk_store(&self) -> Result<Arc<dyn ChunkStore>> {
        match self.chroma() {
            Some(config) => {
                let url = config.base_url.clone();
                let store = ChromaChunkStore::connect(config)
                    .await
                    .with_context(|| format!("failed to connect to Chroma at {url}"))?;
                info!(url = %url, collection = %self.collection, "using Chroma chunk store");
                Ok(Arc::new(store))
            }
            None => {
                info!("using in-memory chunk store");
                Ok(Arc::new(InMemoryChunkStore::new()))
            }
        }
    }

    /// Build the pipeline these settings describe.
    pub async fn build_pipeline(&self) -> Result<RagPipeline> {
        let ollama = self.ollama();
        let model = OllamaModel::new(ollama.clone()).context("invalid Ollama settings")?;
        let embedder = OllamaEmbeddingProvider::new(&ollama, self.embedding_model.clone());
        let config = RagConfig::builder().model(self.model.clone()).build()?;

        let pipeline = RagPipeline::builder()
            .config(config)
            .model(Arc::new(model))
            .embedding_provider(Arc::new(embedder))
            .chunk_store(self.chunk_store().await?)
            .build()?;

        info!(endpoint = %ollama.endpoint(), model = %self.model, "pipeline ready");
        Ok(pipeline)
    }
}

/// Read a text file as a document identified by its file name.
pub fn load_document(path: &Path) -> Result<Document> {
    let id = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("'{}' has no usable file name", path.display()))?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    let mut document = Document::new(id, text);
    document.source_uri = Some(path.display().to_string());
    Ok(document)
}

/// Ingest every file in `paths`, stopping at the first failure.
///
/// Returns the ids of the ingested documents.
pub async fn ingest_files(
    pipeline: &RagPipeline,
    paths: &[impl AsRef<Path>],
) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    for path in paths {
        let document = load_document(path.as_ref())?;
        let chunks = pipeline.ingest(&document).await?.len();
        info!(document = %document.id, chunks, "document ingested");
        ids.insert(document.id);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        services: ServiceArgs,
    }

    fn parse(args: &[&str]) -> ServiceArgs {
        TestCli::parse_from(std::iter::once("ragchat").chain(args.iter().copied())).services
    }

    #[test]
    fn chroma_is_optional() {
        let services = parse(&["--chroma-host", ""]);
        assert_eq!(services.chroma_url(), None);
    }

    #[test]
    fn chroma_url_gets_a_scheme() {
        let services = parse(&["--chroma-host", "chroma", "--chroma-port", "9000"]);
        assert_eq!(services.chroma_url().as_deref(), Some("http://chroma:9000"));
    }

    #[test]
    fn chroma_defaults_to_the_default_tenant_and_database() {
        let config = parse(&["--chroma-host", "chroma"]).chroma().unwrap();
        assert_eq!(config.tenant, "default_tenant");
        assert_eq!(config.database, "default_database");
        assert_eq!(config.collection, "documents");
    }

    #[test]
    fn chroma_tenant_and_database_come_from_flags() {
        let config = parse(&[
            "--chroma-host",
            "chroma",
            "--chroma-tenant",
            "acme",
            "--chroma-database",
            "kb",
        ])
        .chroma()
        .unwrap();
        assert_eq!(
            config.collections_url(),
            "http://chroma:8000/api/v2/tenants/acme/databases/kb/collections"
        );
    }

    #[test]
    fn ollama_settings_come_from_flags() {
        let services = parse(&["--llm-host", "gpu-box", "--llm-port", "1234"]);
        assert_eq!(services.ollama().endpoint(), "http://gpu-box:1234");
    }

    #[test]
    fn documents_are_named_after_their_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::File::create(&path).unwrap().write_all(b"Tides follow the moon.").unwrap();

        let document = load_document(&path).unwrap();

        assert_eq!(document.id, "notes.txt");
        assert_eq!(document.text, "Tides follow the moon.");
        assert!(document.source_uri.unwrap().ends_with("notes.txt"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_document(Path::new("/definitely/not/here.txt")).is_err());
    }
}
